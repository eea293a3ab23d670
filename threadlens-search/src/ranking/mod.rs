//! Relevance ranking: score, sort, diversify, truncate, highlight.

pub mod diversify;
pub mod scoring;

use chrono::{DateTime, Utc};

use crate::highlight::extract_highlights;
use crate::query::QueryIntent;
use crate::types::SearchResult;

/// Rank `results` for `intent` and keep at most `limit`.
///
/// Uses the current time for recency; see [`rank_at`].
pub fn rank(results: Vec<SearchResult>, intent: &QueryIntent, limit: usize) -> Vec<SearchResult> {
    rank_at(results, intent, limit, Utc::now())
}

/// Rank with an explicit clock, so the output is fully deterministic.
///
/// Sorting is stable: equal scores keep retrieval order.
pub fn rank_at(
    mut results: Vec<SearchResult>,
    intent: &QueryIntent,
    limit: usize,
    now: DateTime<Utc>,
) -> Vec<SearchResult> {
    for result in &mut results {
        result.relevance = scoring::calculate_score(result, intent, now);
    }
    results.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));

    let mut ranked = diversify::diversify(results, limit);
    let keywords = intent.scoring_keywords();
    for result in &mut ranked {
        result.highlights = extract_highlights(&result.content, keywords);
    }
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryAnalyzer;
    use crate::types::ResultKind;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
    }

    fn make(id: &str, kind: ResultKind, title: &str, content: &str) -> SearchResult {
        SearchResult {
            id: id.into(),
            kind,
            title: title.into(),
            community: "rust".into(),
            author: "a".into(),
            content: content.into(),
            url: format!("https://www.reddit.com/r/rust/comments/{id}/"),
            created_at: now(),
            score: 10,
            reply_count: 2,
            highlights: vec![],
            relevance: 0.0,
        }
    }

    fn intent(query: &str) -> QueryIntent {
        QueryAnalyzer::new().expect("patterns").analyze(query)
    }

    #[test]
    fn ranks_by_score_and_attaches_highlights() {
        let results = vec![
            make("a", ResultKind::Post, "Unrelated", "Nothing to see in this body here."),
            make("b", ResultKind::Post, "Async runtimes compared", "Tokio is the most used async runtime today."),
        ];
        let ranked = rank_at(results, &intent("async runtimes"), 10, now());
        assert_eq!(ranked[0].id, "b");
        assert!(ranked[0].relevance > ranked[1].relevance);
        assert_eq!(ranked[0].highlights, vec!["Tokio is the most used async runtime today."]);
    }

    #[test]
    fn ties_keep_retrieval_order() {
        let results: Vec<_> = ["x", "y", "z"]
            .iter()
            .map(|id| make(id, ResultKind::Post, "same", "same"))
            .collect();
        let ids: Vec<_> = rank_at(results, &intent("other"), 10, now())
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
    }

    #[test]
    fn ranking_is_deterministic() {
        let results: Vec<_> = (0..12)
            .map(|i| {
                let kind = if i % 3 == 0 { ResultKind::Comment } else { ResultKind::Post };
                make(&i.to_string(), kind, &format!("title {i} rust"), "rust body text that is long enough.")
            })
            .collect();
        let i = intent("rust tips");
        let first = rank_at(results.clone(), &i, 8, now());
        let second = rank_at(results, &i, 8, now());
        assert_eq!(first, second);
    }

    #[test]
    fn truncates_to_limit() {
        let results: Vec<_> = (0..20)
            .map(|i| make(&i.to_string(), ResultKind::Post, "t", ""))
            .collect();
        assert_eq!(rank_at(results, &intent("t"), 5, now()).len(), 5);
    }
}
