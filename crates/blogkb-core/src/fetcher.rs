use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::circuit::{CircuitBreaker, CircuitSnapshot};
use crate::{Config, Error, FetchError, Result};

/// A single GET attempt against the network.
///
/// The fetcher layers retries and circuit breaking on top of this; implementations only
/// translate one request into text or a [`FetchError`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url` as text, giving up after `timeout`.
    async fn get(&self, url: &str, timeout: Duration) -> std::result::Result<String, FetchError>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport with a shared connection pool.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("blogkb/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, timeout: Duration) -> std::result::Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let content = response.text().await.map_err(map_reqwest_error)?;
        debug!("Fetched {} bytes from {}", content.len(), url);
        Ok(content)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if let Some(status) = err.status() {
        FetchError::HttpStatus(status.as_u16())
    } else {
        FetchError::ConnectionFailed(err.to_string())
    }
}

/// Retry settings for one fetch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for every attempt after that.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay after the zero-based `attempt` failed: `base_delay * 2^attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Fetcher with exponential-backoff retries wrapped in a circuit breaker.
///
/// The breaker and retry counters are owned here and nowhere else. The breaker mutex is
/// only taken for state transitions, never while a request is in flight.
pub struct ResilientFetcher<T> {
    transport: T,
    policy: RetryPolicy,
    breaker: Mutex<CircuitBreaker>,
}

impl ResilientFetcher<HttpTransport> {
    /// Build an HTTP fetcher from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::with_transport(HttpTransport::new()?, config))
    }
}

impl<T: Transport> ResilientFetcher<T> {
    pub fn new(transport: T, policy: RetryPolicy, breaker: CircuitBreaker) -> Self {
        Self {
            transport,
            policy,
            breaker: Mutex::new(breaker),
        }
    }

    /// Build a fetcher over any transport using the retry and breaker settings in `config`.
    pub fn with_transport(transport: T, config: &Config) -> Self {
        Self::new(
            transport,
            RetryPolicy {
                max_attempts: config.http_max_retries,
                base_delay: config.retry_base_delay(),
            },
            CircuitBreaker::new(
                config.circuit_failure_threshold,
                config.circuit_reset_timeout(),
            ),
        )
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch `url`, bounding every attempt by `timeout`.
    ///
    /// Transient failures are retried up to the policy's attempt budget. A non-transient
    /// failure (most 4xx statuses) ends the loop immediately. Either way the terminal
    /// outcome is reported to the circuit breaker once.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::CircuitOpen`] without touching the network while the circuit
    /// is open, otherwise the last error observed by the retry loop.
    pub async fn fetch(
        &self,
        url: &str,
        timeout: Duration,
    ) -> std::result::Result<String, FetchError> {
        self.lock_breaker().try_acquire(Instant::now())?;

        let outcome = self.fetch_with_retries(url, timeout).await;

        let mut breaker = self.lock_breaker();
        match &outcome {
            Ok(_) => breaker.record_success(),
            Err(_) => breaker.record_failure(Instant::now()),
        }
        outcome
    }

    async fn fetch_with_retries(
        &self,
        url: &str,
        timeout: Duration,
    ) -> std::result::Result<String, FetchError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last_error = FetchError::Timeout;

        for attempt in 0..attempts {
            let result = match tokio::time::timeout(timeout, self.transport.get(url, timeout)).await
            {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout),
            };

            match result {
                Ok(content) => {
                    info!("Successfully fetched {url}");
                    return Ok(content);
                },
                Err(err) if !err.is_transient() => {
                    warn!("Fetching {url} failed permanently: {err}");
                    return Err(err);
                },
                Err(err) => {
                    warn!(
                        "Fetching {url} failed: {err} (attempt {}/{attempts})",
                        attempt + 1
                    );
                    last_error = err;
                },
            }

            if attempt + 1 < attempts {
                let delay = self.policy.backoff(attempt);
                debug!("Retrying in {delay:?}");
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error)
    }

    /// Current breaker state, for health reporting. Performs no I/O.
    pub fn circuit(&self) -> CircuitSnapshot {
        self.lock_breaker().snapshot(Instant::now())
    }

    fn lock_breaker(&self) -> MutexGuard<'_, CircuitBreaker> {
        self.breaker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
