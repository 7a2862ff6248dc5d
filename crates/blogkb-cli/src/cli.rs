//! # CLI Structure and Argument Parsing
//!
//! Every subcommand maps onto exactly one knowledge-base operation:
//!
//! ```bash
//! # Ranked search
//! blogkb search "kubernetes shutdown" --limit 5
//! blogkb docs "git convention"
//! blogkb experience "kafka lag"
//!
//! # Browsing
//! blogkb category infrastructure
//! blogkb recent --days 90 --category backend
//! blogkb summary experience
//! blogkb show "pod shutdown"
//! blogkb raw
//!
//! # Maintenance
//! blogkb refresh
//! blogkb health --format json
//! ```
//!
//! ## Output Formats
//!
//! - **text**: Markdown-like output for reading (default)
//! - **json**: Machine-readable JSON for scripting

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::output::OutputFormat;
use blogkb_core::SectionKind;

/// Main CLI structure for the `blogkb` command.
#[derive(Parser, Clone, Debug)]
#[command(name = "blogkb")]
#[command(version)]
#[command(about = "blogkb - Search a blog's llms.txt knowledge base", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Suppress informational messages (only show errors)
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Path to configuration file (overrides the platform default). Also via `BLOGKB_CONFIG`.
    #[arg(long, global = true, value_name = "FILE", env = "BLOGKB_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Search all sections with BM25 ranking
    Search(SearchArgs),

    /// Search documentation sections only
    Docs(SearchArgs),

    /// Search experience sections (tech blog, reflections, trends) only
    Experience(SearchArgs),

    /// List sections in a category
    Category {
        /// Category name, matched case-insensitively
        name: String,
    },

    /// List dated sections published within the last N days
    Recent {
        /// Number of days to look back
        #[arg(short, long, default_value_t = 30, allow_negative_numbers = true)]
        days: i64,

        /// Restrict to a category or to a kind (`documentation`, `experience`)
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Force a refresh of the cached document
    Refresh,

    /// Report circuit breaker, cache and section status
    Health,

    /// Show the full content of the first section whose title matches
    Show {
        /// Title or part of a title, matched case-insensitively
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
    },

    /// List every section of one kind with a short preview
    Summary {
        #[arg(value_enum)]
        kind: KindArg,
    },

    /// Print the raw source document
    Raw,
}

/// Arguments shared by the search commands.
#[derive(clap::Args, Clone, Debug)]
pub struct SearchArgs {
    /// Search query
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,

    /// Maximum number of results (zero or negative means the default)
    #[arg(short = 'n', long, allow_negative_numbers = true)]
    pub limit: Option<i64>,
}

impl SearchArgs {
    pub fn query(&self) -> String {
        self.query.join(" ")
    }
}

/// Section kind accepted on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Guidelines and conventions
    #[value(alias = "docs")]
    Documentation,
    /// Tech blog posts, reflections and trends
    #[value(alias = "blog")]
    Experience,
}

impl From<KindArg> for SectionKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Documentation => Self::Documentation,
            KindArg::Experience => Self::Experience,
        }
    }
}
