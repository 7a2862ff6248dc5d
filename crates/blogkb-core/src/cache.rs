//! TTL cache over the parsed corpus with refresh coalescing.
//!
//! The cache holds at most one [`Corpus`] behind an `Arc`. Readers clone the `Arc` and
//! never observe a half-built corpus; a successful refresh swaps the whole entry.
//!
//! Refreshes are coalesced: while one fetch → parse cycle is running, every other
//! caller that needs a refresh (forced or not) awaits that same cycle and receives its
//! result instead of starting another request.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::fetcher::{HttpTransport, ResilientFetcher, Transport};
use crate::{Config, Corpus, DocumentParser, Result};

type RefreshFuture = Shared<BoxFuture<'static, Result<Arc<Corpus>>>>;

/// The stored corpus plus its freshness bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub corpus: Arc<Corpus>,
    pub fetched_at: Instant,
    pub fetched_at_utc: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    /// Whether the entry is older than its TTL at `now`.
    pub fn is_stale(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) > self.ttl
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.fetched_at)
    }
}

/// Freshness report for health checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    pub source_url: String,
    pub has_content: bool,
    pub is_stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_secs: Option<u64>,
    pub ttl_secs: u64,
    pub refresh_in_flight: bool,
}

struct Inner<T> {
    fetcher: ResilientFetcher<T>,
    parser: DocumentParser,
    url: String,
    ttl: Duration,
    timeout: Duration,
    entry: RwLock<Option<CacheEntry>>,
    in_flight: Mutex<Option<RefreshFuture>>,
}

/// Shared handle to the content cache. Cloning is cheap.
pub struct ContentCache<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ContentCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ContentCache<HttpTransport> {
    /// HTTP-backed cache for the document configured in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::with_transport(HttpTransport::new()?, config))
    }
}

impl<T: Transport + 'static> ContentCache<T> {
    pub fn new(
        fetcher: ResilientFetcher<T>,
        parser: DocumentParser,
        url: impl Into<String>,
        ttl: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                parser,
                url: url.into(),
                ttl,
                timeout,
                entry: RwLock::new(None),
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Cache over an arbitrary transport, with every other setting taken from `config`.
    pub fn with_transport(transport: T, config: &Config) -> Self {
        Self::new(
            ResilientFetcher::with_transport(transport, config),
            DocumentParser::with_base_url(&config.base_url),
            config.document_url(),
            config.cache_ttl(),
            config.http_timeout(),
        )
    }

    /// Return the current corpus, refreshing it first when it is missing, stale or
    /// `force` is set.
    ///
    /// # Errors
    ///
    /// Forwards the fetch or parse error of the refresh. The previously stored corpus
    /// stays in place and is still available through [`ContentCache::snapshot`].
    pub async fn get_or_refresh(&self, force: bool) -> Result<Arc<Corpus>> {
        if !force {
            if let Some(entry) = self.entry() {
                if !entry.is_stale(Instant::now()) {
                    debug!("Cache hit for {}", self.inner.url);
                    return Ok(entry.corpus);
                }
                debug!("Cached corpus is stale, refreshing");
            }
        }
        self.join_refresh(force).await
    }

    async fn join_refresh(&self, force: bool) -> Result<Arc<Corpus>> {
        let refresh = {
            let mut slot = self.lock_in_flight();
            if let Some(existing) = slot.as_ref() {
                debug!("Joining in-flight refresh");
                existing.clone()
            } else {
                // A refresh may have completed between the freshness check and this lock.
                if !force {
                    if let Some(entry) = self.entry().filter(|e| !e.is_stale(Instant::now())) {
                        debug!("Refresh completed concurrently, serving cached corpus");
                        return Ok(entry.corpus);
                    }
                }
                let inner = Arc::clone(&self.inner);
                let refresh = async move { inner.refresh().await }.boxed().shared();
                *slot = Some(refresh.clone());
                refresh
            }
        };

        let outcome = refresh.clone().await;

        let mut slot = self.lock_in_flight();
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&refresh)) {
            *slot = None;
        }
        outcome
    }

    /// Current entry regardless of freshness. Performs no I/O.
    pub fn snapshot(&self) -> Option<Arc<Corpus>> {
        self.entry().map(|entry| entry.corpus)
    }

    /// Freshness report. Performs no I/O.
    pub fn status(&self) -> CacheStatus {
        let now = Instant::now();
        let entry = self.entry();
        CacheStatus {
            source_url: self.inner.url.clone(),
            has_content: entry.is_some(),
            is_stale: entry.as_ref().is_none_or(|e| e.is_stale(now)),
            fetched_at: entry.as_ref().map(|e| e.fetched_at_utc),
            age_secs: entry.as_ref().map(|e| e.age(now).as_secs()),
            ttl_secs: self.inner.ttl.as_secs(),
            refresh_in_flight: self.lock_in_flight().is_some(),
        }
    }

    /// The fetcher used for refreshes, shared with callers that need one-off fetches.
    pub fn fetcher(&self) -> &ResilientFetcher<T> {
        &self.inner.fetcher
    }

    /// Per-attempt timeout applied to fetches.
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    pub fn source_url(&self) -> &str {
        &self.inner.url
    }

    fn entry(&self) -> Option<CacheEntry> {
        self.inner
            .entry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, Option<RefreshFuture>> {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Transport> Inner<T> {
    async fn refresh(&self) -> Result<Arc<Corpus>> {
        info!("Refreshing content from {}", self.url);

        let raw = self
            .fetcher
            .fetch(&self.url, self.timeout)
            .await
            .inspect_err(|e| warn!("Refresh of {} failed: {e}", self.url))?;
        let corpus = self
            .parser
            .parse(&raw)
            .inspect_err(|e| warn!("Fetched document could not be parsed: {e}"))?
            .with_source_url(self.url.as_str());

        let corpus = Arc::new(corpus);
        let entry = CacheEntry {
            corpus: Arc::clone(&corpus),
            fetched_at: Instant::now(),
            fetched_at_utc: Utc::now(),
            ttl: self.ttl,
        };
        *self.entry.write().unwrap_or_else(PoisonError::into_inner) = Some(entry);

        info!("Cached {} sections from {}", corpus.len(), self.url);
        Ok(corpus)
    }
}
