//! # threadlens-search
//!
//! Intent-aware search over a discussion forum's public API.
//!
//! A query is analysed into a [`QueryIntent`], turned into a set of
//! retrieval strategies that run concurrently, and the merged candidates
//! are deduplicated, scored, diversified and highlighted.
//!
//! ## Design
//!
//! - One [`SearchOrchestrator`] per process owns the shared services: HTTP
//!   client, [`AuthManager`], request limiter (5 in flight by default) and
//!   [`ResultCache`]
//! - Strategies fail independently; a search succeeds if any strategy does
//! - Every HTTP call and backoff sleep honours the caller's
//!   [`CancellationToken`](tokio_util::sync::CancellationToken)
//! - Retry and backoff follow a single [`RetryPolicy`] value
//!
//! ## Security
//!
//! - Client secrets and bearer tokens never appear in logs or errors
//! - Queries are logged only at trace level
//!
//! # Examples
//!
//! ```no_run
//! # async fn example() -> threadlens_search::Result<()> {
//! use threadlens_search::{SearchConfig, SearchMode, SearchOrchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! let orchestrator = SearchOrchestrator::new(SearchConfig::default())?;
//! let results = orchestrator
//!     .search("best rust books", SearchMode::Auto, 10, &CancellationToken::new())
//!     .await?;
//! for result in &results {
//!     println!("[{}] {} ({})", result.kind, result.title, result.url);
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod highlight;
pub mod http;
pub mod orchestrator;
pub mod parser;
pub mod query;
pub mod ranking;
pub mod retry;
pub mod strategy;
pub mod types;

pub use auth::AuthManager;
pub use cache::{CacheJanitor, CacheKey, CacheStats, ResultCache};
pub use config::{CacheConfig, SearchConfig};
pub use error::{Result, SearchError};
pub use orchestrator::SearchOrchestrator;
pub use query::{IntentKind, QueryAnalyzer, QueryIntent};
pub use retry::RetryPolicy;
pub use strategy::RetrievalStrategy;
pub use types::{ResultKind, SearchMode, SearchResult, SortOrder, Timeframe};
