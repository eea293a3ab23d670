//! Search orchestrator: cache lookup, concurrent strategies, dedup, ranking.
//!
//! This module fans a query out to the selected retrieval strategies,
//! merges whatever succeeded in strategy order, deduplicates across
//! strategies, ranks, and caches the final output.

pub mod dedup;
pub mod search;
pub mod url_normalize;

pub use search::SearchOrchestrator;
