//! Query facade over the cached corpus.
//!
//! Every operation obtains the current corpus from the [`ContentCache`] (refreshing it
//! when stale) and, for ranked queries, reuses a BM25 index until the corpus changes.
//! When a refresh fails but an older corpus exists, the older corpus is served. Only
//! when nothing was ever loaded does an operation fail with [`Error::Unavailable`].

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::ContentCache;
use crate::fetcher::{HttpTransport, Transport};
use crate::health::HealthReport;
use crate::index::{Bm25Index, SearchHit};
use crate::{Config, Corpus, QueryError, Result, Section, SectionCounts, SectionKind};

/// Result cap used when the caller passes no positive `top_k`.
pub const DEFAULT_TOP_K: usize = 10;

/// Characters of body text shown in a summary preview.
pub const PREVIEW_CHARS: usize = 200;

/// Normalize a caller-supplied result cap: missing or non-positive means the default.
pub fn effective_top_k(top_k: Option<i64>) -> usize {
    match top_k {
        Some(k) if k > 0 => usize::try_from(k).unwrap_or(usize::MAX),
        _ => DEFAULT_TOP_K,
    }
}

/// One line of a per-kind listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionSummary {
    pub title: String,
    pub kind: SectionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<NaiveDate>,
    /// First characters of the body, with `...` appended when truncated.
    pub preview: String,
}

impl From<&Section> for SectionSummary {
    fn from(section: &Section) -> Self {
        Self {
            title: section.title.clone(),
            kind: section.kind,
            url: section.url.clone(),
            category: section.category.clone(),
            published_at: section.published_at,
            preview: preview(&section.body, PREVIEW_CHARS),
        }
    }
}

fn preview(body: &str, limit: usize) -> String {
    match body.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", body[..cut].trim_end()),
        None => body.trim().to_string(),
    }
}

/// Operations exposed to the protocol layer.
#[async_trait]
pub trait QueryFacade: Send + Sync {
    /// Rank every section against `query`.
    async fn search_all(&self, query: &str, top_k: Option<i64>) -> Result<Vec<SearchHit>>;

    /// Rank documentation sections only.
    async fn search_documentation(&self, query: &str, top_k: Option<i64>) -> Result<Vec<SearchHit>>;

    /// Rank experience sections only.
    async fn search_experience(&self, query: &str, top_k: Option<i64>) -> Result<Vec<SearchHit>>;

    /// Sections whose category equals `category`, ignoring case, in corpus order.
    async fn get_category_posts(&self, category: &str) -> Result<Vec<Section>>;

    /// Dated sections published within the last `days` days, newest first.
    ///
    /// `category` matches either the section category or the kind label.
    async fn get_recent_posts(&self, days: i64, category: Option<&str>) -> Result<Vec<Section>>;

    /// Force a refresh and report the new section counts.
    async fn refresh_content(&self) -> Result<SectionCounts>;

    /// Circuit, cache and corpus status. Never performs I/O.
    fn health_check(&self) -> HealthReport;

    /// First section whose title contains `title`, ignoring case.
    async fn find_section(&self, title: &str) -> Result<Option<Section>>;

    /// Full markdown of the matching section, falling back to its parsed body.
    async fn full_content(&self, title: &str) -> Result<Option<String>>;

    /// Per-kind listing with previews.
    async fn summary(&self, kind: SectionKind) -> Result<Vec<SectionSummary>>;

    /// The raw source document of the current corpus.
    async fn raw_document(&self) -> Result<String>;
}

/// [`QueryFacade`] backed by a [`ContentCache`] and a lazily rebuilt BM25 index.
pub struct KnowledgeBase<T> {
    cache: ContentCache<T>,
    index: Mutex<Option<Arc<Bm25Index>>>,
}

impl KnowledgeBase<HttpTransport> {
    /// HTTP-backed knowledge base for the document configured in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(ContentCache::from_config(config)?))
    }
}

impl<T: Transport + 'static> KnowledgeBase<T> {
    pub fn new(cache: ContentCache<T>) -> Self {
        Self {
            cache,
            index: Mutex::new(None),
        }
    }

    pub const fn cache(&self) -> &ContentCache<T> {
        &self.cache
    }

    /// Like [`QueryFacade::get_recent_posts`] with an explicit reference date.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidRange`] for a negative `days`.
    pub async fn recent_posts_as_of(
        &self,
        today: NaiveDate,
        days: i64,
        category: Option<&str>,
    ) -> Result<Vec<Section>> {
        let span = u64::try_from(days).map_err(|_| QueryError::InvalidRange(days))?;
        let start = today.checked_sub_days(Days::new(span)).unwrap_or(NaiveDate::MIN);
        let category = category.map(str::trim).filter(|c| !c.is_empty());

        let corpus = self.corpus().await?;
        let mut posts: Vec<Section> = corpus
            .sections()
            .iter()
            .filter(|s| s.published_at.is_some_and(|d| start <= d && d <= today))
            .filter(|s| {
                category.is_none_or(|c| {
                    s.has_category(c) || s.kind.as_str().eq_ignore_ascii_case(c.trim())
                })
            })
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(posts)
    }

    /// Current corpus, served stale when a refresh fails after an earlier success.
    async fn corpus(&self) -> Result<Arc<Corpus>> {
        match self.cache.get_or_refresh(false).await {
            Ok(corpus) => Ok(corpus),
            Err(err) => match self.cache.snapshot() {
                Some(stale) => {
                    warn!("Serving stale content after failed refresh: {err}");
                    Ok(stale)
                },
                None => Err(err.into_unavailable()),
            },
        }
    }

    fn index_for(&self, corpus: &Arc<Corpus>) -> Arc<Bm25Index> {
        {
            let slot = self.index.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(index) = slot.as_ref().filter(|i| Arc::ptr_eq(i.corpus(), corpus)) {
                return Arc::clone(index);
            }
        }

        debug!("Corpus changed, rebuilding search index");
        let index = Arc::new(Bm25Index::build(Arc::clone(corpus)));
        *self.index.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&index));
        index
    }

    async fn ranked(
        &self,
        query: &str,
        top_k: Option<i64>,
        kind: Option<SectionKind>,
    ) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(QueryError::EmptyQuery.into());
        }
        let top_k = effective_top_k(top_k);
        let corpus = self.corpus().await?;
        let index = self.index_for(&corpus);

        let hits = match kind {
            Some(kind) => index.search_filtered(query, top_k, |s| s.kind == kind),
            None => index.search(query, top_k),
        };
        debug!("Query {query:?} matched {} sections", hits.len());
        Ok(hits)
    }
}

#[async_trait]
impl<T: Transport + 'static> QueryFacade for KnowledgeBase<T> {
    async fn search_all(&self, query: &str, top_k: Option<i64>) -> Result<Vec<SearchHit>> {
        self.ranked(query, top_k, None).await
    }

    async fn search_documentation(
        &self,
        query: &str,
        top_k: Option<i64>,
    ) -> Result<Vec<SearchHit>> {
        self.ranked(query, top_k, Some(SectionKind::Documentation)).await
    }

    async fn search_experience(&self, query: &str, top_k: Option<i64>) -> Result<Vec<SearchHit>> {
        self.ranked(query, top_k, Some(SectionKind::Experience)).await
    }

    async fn get_category_posts(&self, category: &str) -> Result<Vec<Section>> {
        let corpus = self.corpus().await?;
        Ok(corpus
            .sections()
            .iter()
            .filter(|s| s.has_category(category))
            .cloned()
            .collect())
    }

    async fn get_recent_posts(&self, days: i64, category: Option<&str>) -> Result<Vec<Section>> {
        self.recent_posts_as_of(Utc::now().date_naive(), days, category)
            .await
    }

    async fn refresh_content(&self) -> Result<SectionCounts> {
        let corpus = self.cache.get_or_refresh(true).await?;
        let counts = corpus.counts();
        info!("Content refreshed: {} sections", counts.total);
        Ok(counts)
    }

    fn health_check(&self) -> HealthReport {
        let counts = self
            .cache
            .snapshot()
            .map(|corpus| corpus.counts())
            .unwrap_or_default();
        HealthReport::assemble(self.cache.fetcher().circuit(), self.cache.status(), counts)
    }

    async fn find_section(&self, title: &str) -> Result<Option<Section>> {
        let needle = title.trim().to_lowercase();
        let corpus = self.corpus().await?;
        Ok(corpus
            .sections()
            .iter()
            .find(|s| s.title.to_lowercase().contains(&needle))
            .cloned())
    }

    async fn full_content(&self, title: &str) -> Result<Option<String>> {
        let Some(section) = self.find_section(title).await? else {
            return Ok(None);
        };
        let Some(markdown_url) = section.markdown_url.as_deref() else {
            return Ok(Some(format!(
                "# {}\n\n{}\n\n(Full content URL not available)",
                section.title, section.body
            )));
        };

        info!("Fetching full content from {markdown_url}");
        match self
            .cache
            .fetcher()
            .fetch(markdown_url, self.cache.timeout())
            .await
        {
            Ok(content) => Ok(Some(content)),
            Err(err) => {
                warn!("Failed to fetch full content for {}: {err}", section.title);
                Ok(Some(format!(
                    "# {}\n\n{}\n\n(Failed to fetch full content: {err})",
                    section.title, section.body
                )))
            },
        }
    }

    async fn summary(&self, kind: SectionKind) -> Result<Vec<SectionSummary>> {
        let corpus = self.corpus().await?;
        Ok(corpus.of_kind(kind).map(SectionSummary::from).collect())
    }

    async fn raw_document(&self) -> Result<String> {
        Ok(self.corpus().await?.raw_document().to_string())
    }
}
