//! Rendering of operation results.
//!
//! Text output is markdown-like so it reads well in a terminal and pastes cleanly into
//! notes. JSON output serializes the same [`Output`] value with a `type` tag.

use std::fmt::Write;

use anyhow::Result;
use blogkb_core::{
    HealthReport, HealthStatus, SearchHit, Section, SectionCounts, SectionKind, SectionSummary,
};
use serde::Serialize;

/// Output format selected with `--format`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown-like text (default)
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Which search produced a set of hits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    All,
    Documentation,
    Experience,
}

impl SearchScope {
    const fn label(self) -> &'static str {
        match self {
            Self::All => "Global",
            Self::Documentation => "Documentation",
            Self::Experience => "Experience",
        }
    }
}

/// The result of one operation, ready to be rendered.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Output {
    Hits {
        scope: SearchScope,
        query: String,
        hits: Vec<SearchHit>,
    },
    Sections {
        heading: String,
        sections: Vec<Section>,
    },
    Summary {
        kind: SectionKind,
        items: Vec<SectionSummary>,
    },
    Refreshed {
        counts: SectionCounts,
    },
    Health {
        report: HealthReport,
    },
    Content {
        title: String,
        content: String,
    },
    Raw {
        content: String,
    },
    NotFound {
        message: String,
    },
}

/// Render `output` in the requested format.
pub fn render(output: &Output, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(output)?),
        OutputFormat::Text => Ok(render_text(output)?),
    }
}

fn render_text(output: &Output) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    match output {
        Output::Hits { scope, query, hits } => {
            if hits.is_empty() {
                writeln!(out, "No results found for query: '{query}'")?;
            } else {
                writeln!(
                    out,
                    "# {} Search Results for '{query}' (Top {})",
                    scope.label(),
                    hits.len()
                )?;
                for (idx, hit) in hits.iter().enumerate() {
                    write_hit(&mut out, idx + 1, hit, *scope == SearchScope::All)?;
                }
            }
        },
        Output::Sections { heading, sections } => {
            if sections.is_empty() {
                writeln!(out, "No posts found: {heading}")?;
            } else {
                writeln!(out, "# {heading} ({} posts)", sections.len())?;
                for (idx, section) in sections.iter().enumerate() {
                    writeln!(out, "\n## {}. {}\n", idx + 1, section.title)?;
                    write_metadata(&mut out, section)?;
                    writeln!(out, "{}\n\n---", section.body)?;
                }
            }
        },
        Output::Summary { kind, items } => write_summary(&mut out, *kind, items)?,
        Output::Refreshed { counts } => {
            writeln!(
                out,
                "Content refreshed: {} sections ({} documentation, {} experience)",
                counts.total, counts.documentation, counts.experience
            )?;
        },
        Output::Health { report } => write_health(&mut out, report)?,
        Output::Content { content, .. } | Output::Raw { content } => {
            writeln!(out, "{}", content.trim_end())?;
        },
        Output::NotFound { message } => writeln!(out, "{message}")?,
    }
    Ok(out)
}

fn write_hit(out: &mut String, rank: usize, hit: &SearchHit, show_score: bool) -> std::fmt::Result {
    let section = &hit.section;
    if show_score {
        writeln!(out, "\n## {rank}. {} [Score: {:.2}]\n", section.title, hit.score)?;
        match &section.category {
            Some(category) => writeln!(out, "Category: {} > {category}", section.kind)?,
            None => writeln!(out, "Category: {}", section.kind)?,
        }
    } else {
        writeln!(out, "\n## {rank}. {}\n", section.title)?;
    }
    write_metadata(out, section)?;
    if show_score && !hit.matched_terms.is_empty() {
        writeln!(out, "Matched terms: {}", hit.matched_terms.join(", "))?;
    }
    writeln!(out, "\n{}\n\n---", section.body)
}

fn write_metadata(out: &mut String, section: &Section) -> std::fmt::Result {
    if let Some(url) = &section.url {
        writeln!(out, "URL: {url}")?;
    }
    if let Some(date) = section.published_at {
        writeln!(out, "Published: {}", date.format("%Y-%m-%d"))?;
    }
    if !section.tags.is_empty() {
        let tags: Vec<&str> = section.tags.iter().map(String::as_str).collect();
        writeln!(out, "Tags: {}", tags.join(", "))?;
    }
    Ok(())
}

fn write_summary(
    out: &mut String,
    kind: SectionKind,
    items: &[SectionSummary],
) -> std::fmt::Result {
    let label = match kind {
        SectionKind::Documentation => "Documentation",
        SectionKind::Experience => "Experience",
    };
    if items.is_empty() {
        return writeln!(out, "No {kind} sections found.");
    }

    writeln!(out, "# {label} Summary")?;
    for item in items {
        writeln!(out, "\n## {}", item.title)?;
        let mut meta = Vec::new();
        if let Some(date) = item.published_at {
            meta.push(format!("Published: {}", date.format("%Y-%m-%d")));
        }
        if let Some(category) = &item.category {
            meta.push(format!("Category: {category}"));
        }
        if let Some(url) = &item.url {
            meta.push(format!("URL: {url}"));
        }
        if !meta.is_empty() {
            writeln!(out, "{}", meta.join(" | "))?;
        }
        writeln!(out, "{}", item.preview)?;
    }
    Ok(())
}

fn write_health(out: &mut String, report: &HealthReport) -> std::fmt::Result {
    writeln!(out, "Status: {}", report.overall_status.as_str())?;
    writeln!(out, "Source: {}", report.cache.source_url)?;
    if let Some(fetched_at) = report.cache.fetched_at {
        writeln!(out, "Fetched at: {}", fetched_at.to_rfc3339())?;
    }
    writeln!(out)?;
    for check in &report.checks {
        let marker = match check.status {
            HealthStatus::Healthy => "ok",
            HealthStatus::Warning => "warn",
            HealthStatus::Error => "fail",
        };
        writeln!(out, "[{marker}] {}: {}", check.name, check.message)?;
    }
    if !report.recommendations.is_empty() {
        writeln!(out, "\nRecommendations:")?;
        for recommendation in &report.recommendations {
            writeln!(out, "- {recommendation}")?;
        }
    }
    Ok(())
}
