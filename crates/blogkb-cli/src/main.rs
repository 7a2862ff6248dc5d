//! blogkb CLI - search a blog's llms.txt knowledge base
//!
//! Loads configuration, builds the knowledge base over HTTP and dispatches one
//! subcommand through the operation table in [`commands`].

use std::process::ExitCode;

use anyhow::{Context, Result};
use blogkb_core::{Config, KnowledgeBase};
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod cli;
mod commands;
mod error;
mod output;

use cli::Cli;
use error::ErrorCategory;
use output::Output;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = initialize_logging(&cli) {
        eprintln!("Failed to initialize logging: {e}");
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            let category = ErrorCategory::of(&e);
            eprintln!("Error ({category}): {e:#}");
            category.into()
        },
    }
}

fn initialize_logging(cli: &Cli) -> Result<()> {
    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Config::load().context("loading config"),
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli)?;
    tracing::debug!("Using source document {}", config.document_url());

    let kb = KnowledgeBase::from_config(&config)?;
    let output = commands::execute(&kb, &cli.command).await?;

    let code: ExitCode = if matches!(output, Output::NotFound { .. }) {
        ErrorCategory::NotFound.into()
    } else {
        ExitCode::SUCCESS
    };
    println!("{}", output::render(&output, cli.format)?.trim_end());
    Ok(code)
}
