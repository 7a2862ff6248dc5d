//! # blogkb-core
//!
//! Core functionality for blogkb: a searchable knowledge base over a blog's `llms.txt`
//! document.
//!
//! ## Architecture
//!
//! The pipeline reads top to bottom:
//!
//! - **Fetching**: [`ResilientFetcher`] retries transient failures with exponential
//!   backoff and guards the remote host with a [`CircuitBreaker`]
//! - **Parsing**: [`DocumentParser`] splits the document into typed [`Section`]s
//! - **Caching**: [`ContentCache`] keeps the last good [`Corpus`] for a TTL and coalesces
//!   concurrent refreshes
//! - **Search**: [`Bm25Index`] ranks sections for free-text queries
//! - **Queries**: [`KnowledgeBase`] implements [`QueryFacade`], the operations exposed to
//!   the command line
//!
//! ## Quick Start
//!
//! ```rust
//! use blogkb_core::{DocumentParser, SectionKind};
//!
//! let raw = concat!(
//!     "# Documentation\n## Git\nUse conventional commits.\n",
//!     "# Tech Blog\n## K8s Pod Shutdown\ncategory: infra\nHandled SIGTERM.",
//! );
//! let corpus = DocumentParser::new().parse(raw)?;
//!
//! assert_eq!(corpus.len(), 2);
//! assert_eq!(corpus.sections()[1].kind, SectionKind::Experience);
//! # Ok::<(), blogkb_core::ParseError>(())
//! ```

/// TTL cache with refresh coalescing
pub mod cache;
/// Circuit breaker state machine
pub mod circuit;
/// Layered configuration (defaults, TOML file, environment)
pub mod config;
/// Error types and result aliases
pub mod error;
/// HTTP transport, retries and circuit breaking
pub mod fetcher;
/// Health reporting
pub mod health;
/// BM25 ranking
pub mod index;
/// llms.txt document parser
pub mod parser;
/// Query facade
pub mod query;
/// Core data types
pub mod types;

pub use cache::{CacheStatus, ContentCache};
pub use circuit::{CircuitBreaker, CircuitSnapshot, CircuitState};
pub use config::Config;
pub use error::{Error, FetchError, ParseError, QueryError, Result};
pub use fetcher::{HttpTransport, ResilientFetcher, RetryPolicy, Transport};
pub use health::{HealthCheck, HealthReport, HealthStatus};
pub use index::{Bm25Index, Bm25Params, SearchHit, tokenize};
pub use parser::DocumentParser;
pub use query::{DEFAULT_TOP_K, KnowledgeBase, QueryFacade, SectionSummary, effective_top_k};
pub use types::*;
