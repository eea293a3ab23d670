//! Cross-strategy result deduplication.
//!
//! Strategies overlap: a post can come back from both the post search and
//! a community's hot listing. Results are identified by `(kind, id)`, or by
//! normalised URL when the id is empty. The first occurrence wins, so the
//! input order (strategy order, then upstream order) decides which copy
//! survives.

use std::collections::HashSet;

use crate::types::{ResultKind, SearchResult};

use super::url_normalize::normalize_url;

#[derive(Debug, PartialEq, Eq, Hash)]
enum Identity {
    Id(ResultKind, String),
    Url(String),
}

fn identity(result: &SearchResult) -> Identity {
    if result.id.is_empty() {
        Identity::Url(normalize_url(&result.url))
    } else {
        Identity::Id(result.kind, result.id.clone())
    }
}

/// Remove duplicates, keeping the first occurrence and preserving order.
pub fn deduplicate(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let before = results.len();
    let mut seen = HashSet::with_capacity(before);
    let unique: Vec<SearchResult> = results
        .into_iter()
        .filter(|result| seen.insert(identity(result)))
        .collect();
    if unique.len() < before {
        tracing::debug!(removed = before - unique.len(), kept = unique.len(), "deduplicated results");
    }
    unique
}
