//! Decomposes a raw llms.txt document into typed [`Section`]s.
//!
//! The document is a sequence of top-level parts ("Documentation", "Tech Blog", ...).
//! Inside a part, every deeper heading and every link entry (`- [Title](path): summary`)
//! opens a section. Metadata sub-lines directly below the opener are lifted into typed
//! fields:
//!
//! ```text
//! # Tech Blog
//! ## K8s Pod Shutdown
//! url: /posts/k8s
//! category: infra
//! tags: kubernetes, sigterm
//! date: 2024-05-01
//! Handled SIGTERM with a preStop hook.
//! ```
//!
//! Extraction is best-effort: a malformed metadata value leaves that field empty and
//! never fails the parse.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use url::Url;

use crate::{Corpus, ParseError, Section, SectionKind};

/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.*?)(?:\s+#+)?\s*$").unwrap());

/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static LINK_ENTRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*+]\s+\[([^\]]+)\]\(([^)\s]+)\)(.*)$").unwrap());

/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static METADATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:[-*]\s+)?(url|link|category|tags|date|published)\s*:\s*(.*)$").unwrap()
});

/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static PUBLISHED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Published\s+(\d{4}-\d{2}-\d{2})").unwrap());

/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").unwrap());

/// Keyword → category table used when a section carries no explicit category.
const CATEGORY_KEYWORDS: &[(&str, &str)] = &[
    ("troubleshooting", "troubleshooting"),
    ("performance", "performance"),
    ("optimization", "performance"),
    ("backend", "backend"),
    ("infrastructure", "infrastructure"),
    ("devops", "infrastructure"),
    ("architecture", "architecture"),
    ("design", "architecture"),
    ("culture", "culture"),
    ("reflection", "reflection"),
    ("trends", "trends"),
];

/// Top-level part of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Documentation,
    TechBlog,
    Reflections,
    Trends,
}

impl Part {
    fn detect(heading: &str) -> Option<Self> {
        let lower = heading.to_lowercase();
        if lower.contains("documentation") {
            Some(Self::Documentation)
        } else if lower.contains("tech blog") || lower.contains("experience") {
            Some(Self::TechBlog)
        } else if lower.contains("reflection") || lower.contains("thoughts") {
            Some(Self::Reflections)
        } else if lower.contains("trends") {
            Some(Self::Trends)
        } else {
            None
        }
    }

    const fn kind(self) -> SectionKind {
        match self {
            Self::Documentation => SectionKind::Documentation,
            Self::TechBlog | Self::Reflections | Self::Trends => SectionKind::Experience,
        }
    }

    const fn default_category(self) -> Option<&'static str> {
        match self {
            Self::Reflections => Some("reflection"),
            Self::Trends => Some("trends"),
            Self::Documentation | Self::TechBlog => None,
        }
    }
}

enum Line<'a> {
    Fence,
    Heading { level: usize, text: &'a str },
    LinkEntry { title: &'a str, target: &'a str, summary: &'a str },
    Text,
}

fn classify(trimmed: &str) -> Line<'_> {
    if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
        return Line::Fence;
    }
    if let Some(caps) = HEADING_RE.captures(trimmed) {
        let text = caps.get(2).map_or("", |m| m.as_str());
        if !text.is_empty() {
            return Line::Heading {
                level: caps[1].len(),
                text,
            };
        }
    }
    if let Some(caps) = LINK_ENTRY_RE.captures(trimmed) {
        let rest = caps.get(3).map_or("", |m| m.as_str()).trim_start();
        return Line::LinkEntry {
            title: caps.get(1).map_or("", |m| m.as_str()).trim(),
            target: caps.get(2).map_or("", |m| m.as_str()),
            summary: rest.strip_prefix(':').unwrap_or(rest).trim(),
        };
    }
    Line::Text
}

/// Section under construction.
#[derive(Default)]
struct Pending {
    title: String,
    kind: Option<SectionKind>,
    context: String,
    part_category: Option<&'static str>,
    url: Option<String>,
    markdown_url: Option<String>,
    category: Option<String>,
    tags: BTreeSet<String>,
    published_at: Option<NaiveDate>,
    body: Vec<String>,
    in_metadata: bool,
}

/// Parser for llms.txt knowledge-base documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentParser {
    base_url: Option<Url>,
}

impl DocumentParser {
    /// Parser that keeps link targets exactly as written.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser that resolves relative link targets against `base_url`.
    ///
    /// An unparsable base is logged and ignored.
    pub fn with_base_url(base_url: &str) -> Self {
        let base_url = match Url::parse(base_url) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("Ignoring invalid base url {base_url:?}: {e}");
                None
            },
        };
        Self { base_url }
    }

    /// Parse `raw` into a corpus.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the document has no heading or link entry at all.
    /// A document whose headings produce no sections yields an empty corpus instead.
    pub fn parse(&self, raw: &str) -> Result<Corpus, ParseError> {
        let mut sections = Vec::new();
        let mut saw_delimiter = false;
        let mut in_fence = false;

        let mut part: Option<(Part, usize)> = None;
        let mut groups: Vec<(usize, String)> = Vec::new();
        let mut pending: Option<Pending> = None;

        for line in raw.lines() {
            let trimmed = line.trim();

            let classified = if in_fence {
                if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                    Line::Fence
                } else {
                    Line::Text
                }
            } else {
                classify(trimmed)
            };

            match classified {
                Line::Fence => {
                    in_fence = !in_fence;
                    if let Some(p) = pending.as_mut() {
                        p.in_metadata = false;
                        p.body.push(line.to_string());
                    }
                },
                Line::Heading { level, text } => {
                    saw_delimiter = true;
                    self.flush(pending.take(), &mut sections);

                    match part {
                        Some((current, part_level)) if level > part_level => {
                            while groups.last().is_some_and(|(l, _)| *l >= level) {
                                groups.pop();
                            }
                            groups.push((level, text.to_string()));
                            pending = Some(Pending {
                                title: text.to_string(),
                                kind: Some(current.kind()),
                                context: group_context(&groups),
                                part_category: current.default_category(),
                                in_metadata: true,
                                ..Pending::default()
                            });
                        },
                        _ => {
                            groups.clear();
                            part = Part::detect(text).map(|p| (p, level));
                            debug!("Entering part {text:?} -> {:?}", part.map(|(p, _)| p));
                        },
                    }
                },
                Line::LinkEntry {
                    title,
                    target,
                    summary,
                } => {
                    saw_delimiter = true;
                    let Some((current, _)) = part else {
                        continue;
                    };
                    self.flush(pending.take(), &mut sections);

                    let (url, markdown_url) = self.resolve_link(target);
                    let mut entry = Pending {
                        title: title.to_string(),
                        kind: Some(current.kind()),
                        context: group_context(&groups),
                        part_category: current.default_category(),
                        url: Some(url),
                        markdown_url,
                        in_metadata: true,
                        ..Pending::default()
                    };
                    if !summary.is_empty() {
                        entry.body.push(summary.to_string());
                    }
                    pending = Some(entry);
                },
                Line::Text => {
                    let Some(p) = pending.as_mut() else {
                        continue;
                    };
                    if p.in_metadata && !in_fence {
                        if trimmed.is_empty() {
                            continue;
                        }
                        if let Some(caps) = METADATA_RE.captures(trimmed) {
                            let value = caps.get(2).map_or("", |m| m.as_str()).trim();
                            self.apply_metadata(p, &caps[1], value);
                            continue;
                        }
                    }
                    p.in_metadata = false;
                    p.body.push(line.to_string());
                },
            }
        }
        self.flush(pending, &mut sections);

        if !saw_delimiter {
            return Err(ParseError::new(
                "document contains no section headings or link entries",
            ));
        }

        for (position, section) in sections.iter_mut().enumerate() {
            section.id = section_id(position, &section.title);
        }

        let corpus = Corpus::new(sections, raw);
        let counts = corpus.counts();
        info!(
            "Parsed {} documentation and {} experience sections",
            counts.documentation, counts.experience
        );
        Ok(corpus)
    }

    fn apply_metadata(&self, pending: &mut Pending, key: &str, value: &str) {
        match key.to_ascii_lowercase().as_str() {
            "url" | "link" => {
                if !value.is_empty() {
                    let (url, markdown_url) = self.resolve_link(value);
                    pending.url = Some(url);
                    if markdown_url.is_some() {
                        pending.markdown_url = markdown_url;
                    }
                }
            },
            "category" => {
                if !value.is_empty() {
                    pending.category = Some(value.to_string());
                }
            },
            "tags" => {
                pending.tags.extend(
                    value
                        .split(',')
                        .map(|tag| tag.trim().trim_start_matches('#').trim())
                        .filter(|tag| !tag.is_empty())
                        .map(str::to_string),
                );
            },
            _ => {
                pending.published_at = first_valid_date(&DATE_RE, value);
                if pending.published_at.is_none() {
                    debug!("Unrecognized date {value:?} for {:?}", pending.title);
                }
            },
        }
    }

    fn flush(&self, pending: Option<Pending>, sections: &mut Vec<Section>) {
        let Some(p) = pending else {
            return;
        };
        let body = p.body.join("\n").trim().to_string();
        let title = p.title.trim().to_string();
        let Some(kind) = p.kind else {
            return;
        };
        if body.is_empty() || title.is_empty() {
            debug!("Dropping section {title:?} without body");
            return;
        }

        let published_at = p.published_at.or_else(|| extract_date(&body));
        let category = p
            .category
            .or_else(|| infer_category(&format!("{} {title}", p.context)))
            .or_else(|| p.part_category.map(str::to_string));

        sections.push(Section {
            id: String::new(),
            kind,
            title,
            body,
            url: p.url,
            markdown_url: p.markdown_url,
            category,
            tags: p.tags,
            published_at,
        });
    }

    /// Returns `(url, markdown_url)` for a link target.
    ///
    /// `.md` targets are raw markdown; the human-readable url drops the suffix
    /// (and a trailing `/index.md`).
    fn resolve_link(&self, target: &str) -> (String, Option<String>) {
        let human = target
            .strip_suffix("/index.md")
            .or_else(|| target.strip_suffix(".md"));

        match human {
            Some(path) => (self.absolutize(path), Some(self.absolutize(target))),
            None => (self.absolutize(target), None),
        }
    }

    fn absolutize(&self, target: &str) -> String {
        match &self.base_url {
            Some(base) if Url::parse(target).is_err() => base
                .join(target)
                .map_or_else(|_| target.to_string(), String::from),
            _ => target.to_string(),
        }
    }
}

fn group_context(groups: &[(usize, String)]) -> String {
    groups
        .iter()
        .map(|(_, text)| text.as_str())
        .collect::<Vec<_>>()
        .join(" > ")
}

fn section_id(position: usize, title: &str) -> String {
    let digest = Sha256::digest(title.as_bytes());
    let short: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
    format!("{position:04}-{short}")
}

fn infer_category(context: &str) -> Option<String> {
    let lower = context.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, category)| (*category).to_string())
}

fn extract_date(text: &str) -> Option<NaiveDate> {
    first_valid_date(&PUBLISHED_RE, text).or_else(|| first_valid_date(&DATE_RE, text))
}

fn first_valid_date(pattern: &Regex, text: &str) -> Option<NaiveDate> {
    pattern
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok())
}
