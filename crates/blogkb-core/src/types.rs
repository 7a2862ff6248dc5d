use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Which top-level part of the source document a section came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    /// Guidelines and conventions ("Documentation" part).
    Documentation,
    /// Blog posts, reflections and trend notes ("Tech Blog" and related parts).
    Experience,
}

impl SectionKind {
    /// Lowercase label used in output and filters.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Documentation => "documentation",
            Self::Experience => "experience",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One titled unit of content with best-effort metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Position plus a short hash of the title, e.g. `0003-9f86d081`.
    pub id: String,
    pub kind: SectionKind,
    pub title: String,
    /// Never empty after trimming.
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Direct link to the raw markdown of the post, when the entry linked a `.md` file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<NaiveDate>,
}

impl Section {
    /// Text that is tokenized for relevance scoring.
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.title, self.body)
    }

    /// Case-insensitive exact comparison against the section category.
    pub fn has_category(&self, category: &str) -> bool {
        self.category
            .as_deref()
            .is_some_and(|c| c.to_lowercase() == category.trim().to_lowercase())
    }
}

/// Per-kind section counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SectionCounts {
    pub total: usize,
    pub documentation: usize,
    pub experience: usize,
}

/// Ordered sections produced by one successful fetch and parse.
///
/// A corpus is never mutated after construction; refreshes build a new one and swap the
/// shared reference. Equality ignores `parsed_at`.
#[derive(Debug, Clone, Serialize)]
pub struct Corpus {
    sections: Vec<Section>,
    #[serde(skip)]
    raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_url: Option<String>,
    parsed_at: DateTime<Utc>,
}

impl PartialEq for Corpus {
    fn eq(&self, other: &Self) -> bool {
        self.sections == other.sections
            && self.raw == other.raw
            && self.source_url == other.source_url
    }
}

impl Eq for Corpus {}

impl Corpus {
    pub fn new(sections: Vec<Section>, raw: impl Into<String>) -> Self {
        Self {
            sections,
            raw: raw.into(),
            source_url: None,
            parsed_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn of_kind(&self, kind: SectionKind) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(move |s| s.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// The document text this corpus was parsed from.
    pub fn raw_document(&self) -> &str {
        &self.raw
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    pub const fn parsed_at(&self) -> DateTime<Utc> {
        self.parsed_at
    }

    pub fn counts(&self) -> SectionCounts {
        let documentation = self.of_kind(SectionKind::Documentation).count();
        SectionCounts {
            total: self.sections.len(),
            documentation,
            experience: self.sections.len() - documentation,
        }
    }
}
