//! The search orchestrator: cache, fan-out, aggregate, dedup, rank.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthManager;
use crate::cache::{CacheJanitor, CacheKey, ResultCache};
use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::http::{self, UpstreamClient};
use crate::query::{QueryAnalyzer, QueryIntent};
use crate::ranking;
use crate::strategy::{select_strategies, RetrievalStrategy};
use crate::types::{SearchMode, SearchResult};

use super::dedup::deduplicate;

/// Longest accepted query, in characters.
pub const MAX_QUERY_CHARS: usize = 512;

/// Largest accepted result limit.
pub const MAX_LIMIT: usize = 100;

/// Runs searches against the forum API.
///
/// Holds the shared services (HTTP client, token manager, request limiter,
/// result cache). Create one per process and share it behind an [`Arc`].
#[derive(Debug)]
pub struct SearchOrchestrator {
    config: SearchConfig,
    client: UpstreamClient,
    auth: Option<Arc<AuthManager>>,
    analyzer: QueryAnalyzer,
    cache: Option<Arc<ResultCache>>,
}

impl SearchOrchestrator {
    /// Build an orchestrator from configuration.
    ///
    /// Runs authenticated against `base_url` when client credentials are
    /// configured, anonymously against `public_base_url` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the configuration is invalid or
    /// the HTTP client cannot be built.
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        config.validate()?;
        let client = http::build_client(&config)?;
        let auth = AuthManager::from_config(client.clone(), &config).map(Arc::new);
        let limiter = Arc::new(Semaphore::new(config.max_concurrency));
        let upstream = UpstreamClient::new(
            client,
            config.effective_base_url(),
            auth.clone(),
            config.retry.clone(),
            limiter,
        );
        let cache = config
            .cache
            .enabled
            .then(|| Arc::new(ResultCache::from_config(&config.cache)));

        tracing::debug!(
            authenticated = auth.is_some(),
            base_url = config.effective_base_url(),
            max_concurrency = config.max_concurrency,
            cache = cache.is_some(),
            "search orchestrator ready"
        );

        Ok(Self {
            config,
            client: upstream,
            auth,
            analyzer: QueryAnalyzer::new()?,
            cache,
        })
    }

    /// Replace the result cache, e.g. to share one between orchestrators.
    pub fn with_cache(mut self, cache: Option<Arc<ResultCache>>) -> Self {
        self.cache = cache;
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// The result cache, if caching is enabled.
    pub fn cache(&self) -> Option<&Arc<ResultCache>> {
        self.cache.as_ref()
    }

    /// The token manager, if running with credentials.
    pub fn auth(&self) -> Option<&Arc<AuthManager>> {
        self.auth.as_ref()
    }

    /// Start the background sweep of expired cache entries.
    ///
    /// Must be called inside a Tokio runtime. Returns `None` when caching
    /// is disabled. The sweep stops when the handle is dropped.
    pub fn start_cache_janitor(&self) -> Option<CacheJanitor> {
        let every = Duration::from_secs(self.config.cache.sweep_interval_seconds);
        self.cache.as_ref().map(|cache| cache.start_janitor(every))
    }

    /// Analyse a query without searching.
    pub fn analyze(&self, query: &str) -> QueryIntent {
        self.analyzer.analyze(query)
    }

    /// Search for `query` and return at most `limit` ranked results.
    ///
    /// # Pipeline
    ///
    /// 1. Validate the query and limit
    /// 2. Return a cached result for the same (query, mode, limit) if fresh
    /// 3. Analyse the query and select retrieval strategies
    /// 4. Run every strategy concurrently under the shared request limiter
    /// 5. Merge successful branches in strategy order, deduplicate, rank
    /// 6. Cache non-empty outputs of searches where every branch succeeded
    ///
    /// The configured search deadline cancels outstanding branches; branches
    /// that finished in time still contribute, but the partial output is not
    /// cached.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Validation`] for an empty or oversized query, or a limit outside 1..=100
    /// - [`SearchError::Timeout`] when `cancel` fires
    /// - the shared category when every branch failed the same way, else
    ///   [`SearchError::Upstream`] listing each branch's failure
    pub async fn search(
        &self,
        query: &str,
        mode: SearchMode,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let query = query.trim();
        validate(query, limit)?;
        tracing::trace!(query, %mode, limit, "search requested");

        let key = CacheKey::new(query, mode, limit);
        if let Some(hit) = self.cache.as_ref().and_then(|cache| cache.get(&key)) {
            tracing::debug!(%mode, limit, count = hit.len(), "cache hit");
            return Ok(hit);
        }

        let intent = self.analyzer.analyze(query);
        let strategies = select_strategies(&intent, mode);
        let per_strategy = self.config.per_strategy_limit.max(limit).min(MAX_LIMIT);
        tracing::debug!(
            kind = %intent.kind,
            strategies = strategies.len(),
            per_strategy,
            "running retrieval strategies"
        );

        let outcomes = self.fan_out(&strategies, &intent, per_strategy, cancel).await;
        if cancel.is_cancelled() {
            return Err(SearchError::Timeout("search cancelled".into()));
        }

        let mut merged = Vec::new();
        let mut failures = Vec::new();
        let mut succeeded = 0usize;
        for (strategy, outcome) in strategies.iter().zip(outcomes) {
            match outcome {
                Ok(results) => {
                    succeeded += 1;
                    merged.extend(results);
                }
                Err(error) => {
                    tracing::warn!(strategy = %strategy, code = error.code(), error = %error, "strategy failed");
                    failures.push((strategy.describe(), error));
                }
            }
        }

        if succeeded == 0 {
            return Err(aggregate_failures(failures));
        }

        let ranked = ranking::rank(deduplicate(merged), &intent, limit);
        tracing::debug!(count = ranked.len(), failed = failures.len(), "search complete");

        // Partial outputs (failed or deadline-cut branches) are not cached.
        if !ranked.is_empty() && failures.is_empty() {
            if let Some(cache) = &self.cache {
                cache.set(key, ranked.clone());
            }
        }
        Ok(ranked)
    }

    async fn fan_out(
        &self,
        strategies: &[RetrievalStrategy],
        intent: &QueryIntent,
        per_strategy: usize,
        cancel: &CancellationToken,
    ) -> Vec<Result<Vec<SearchResult>, SearchError>> {
        let branch_cancel = cancel.child_token();
        let branches = futures::future::join_all(
            strategies
                .iter()
                .map(|strategy| strategy.execute(&self.client, intent, per_strategy, &branch_cancel)),
        );
        tokio::pin!(branches);

        let deadline = Duration::from_secs(self.config.search_timeout_seconds);
        tokio::select! {
            outcomes = &mut branches => outcomes,
            _ = tokio::time::sleep(deadline) => {
                tracing::warn!(deadline_seconds = deadline.as_secs(), "search deadline reached, cancelling outstanding strategies");
                branch_cancel.cancel();
                branches.await
            }
        }
    }
}

fn validate(query: &str, limit: usize) -> Result<(), SearchError> {
    if query.is_empty() {
        return Err(SearchError::Validation("query must not be empty".into()));
    }
    if query.chars().count() > MAX_QUERY_CHARS {
        return Err(SearchError::Validation(format!(
            "query must be at most {MAX_QUERY_CHARS} characters"
        )));
    }
    if limit == 0 || limit > MAX_LIMIT {
        return Err(SearchError::Validation(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }
    Ok(())
}

/// Fold branch failures into one error.
///
/// A category shared by every branch is kept; mixed failures become
/// [`SearchError::Upstream`]. The message lists every branch.
fn aggregate_failures(failures: Vec<(String, SearchError)>) -> SearchError {
    let message = failures
        .iter()
        .map(|(strategy, error)| format!("{strategy}: {error}"))
        .collect::<Vec<_>>()
        .join("; ");
    match failures.split_first() {
        None => SearchError::Upstream("no retrieval strategy ran".into()),
        Some(((_, first), rest)) if rest.iter().all(|(_, e)| e.same_category(first)) => {
            first.with_message(format!("all strategies failed: {message}"))
        }
        Some(_) => SearchError::Upstream(format!("all strategies failed: {message}")),
    }
}
