//! Additive relevance scoring.
//!
//! ```text
//! score = kind bonus
//!       + Σ title hits × TITLE_KEYWORD_WEIGHT
//!       + Σ min(ln(1 + content hits) × CONTENT_KEYWORD_WEIGHT, MAX_CONTENT_KEYWORD_SCORE)
//!       + ln(1 + upvotes) × SCORE_ENGAGEMENT_WEIGHT + ln(1 + replies) × REPLY_ENGAGEMENT_WEIGHT
//!       + recency weight × exp(-age_days / window_days)
//!       + community or category bonus
//!       - EXCLUSION_PENALTY × matched exclusion terms
//! ```
//!
//! The score is a pure function of the result, the intent and `now`.

use chrono::{DateTime, Utc};

use crate::query::{IntentKind, QueryIntent};
use crate::types::{ResultKind, SearchResult, Timeframe};

/// Bonus when the result kind is what the intent asks for.
pub const KIND_MATCH_BONUS: f64 = 2.0;

/// Weight per keyword present in the title.
pub const TITLE_KEYWORD_WEIGHT: f64 = 3.0;

/// Weight of `ln(1 + hits)` per keyword in the body.
pub const CONTENT_KEYWORD_WEIGHT: f64 = 1.0;

/// Ceiling on the body term per keyword; stays below one title hit.
pub const MAX_CONTENT_KEYWORD_SCORE: f64 = 2.5;

pub const SCORE_ENGAGEMENT_WEIGHT: f64 = 0.4;
pub const REPLY_ENGAGEMENT_WEIGHT: f64 = 0.3;

/// Peak recency bonus; doubled for time-sensitive queries.
pub const RECENCY_WEIGHT: f64 = 2.0;

/// Penalty per exclusion term found in the result.
pub const EXCLUSION_PENALTY: f64 = 100.0;

/// Bonus when the result lives in a community the query names.
pub const COMMUNITY_BONUS: f64 = 3.0;

/// Bonus when the result lives in a community of the query's categories.
pub const CATEGORY_BONUS: f64 = 1.0;

/// Score one result against an intent.
pub fn calculate_score(result: &SearchResult, intent: &QueryIntent, now: DateTime<Utc>) -> f64 {
    kind_bonus(result.kind, intent)
        + keyword_score(result, intent.scoring_keywords())
        + engagement_score(result)
        + recency_score(result.created_at, now, intent.timeframe, intent.time_sensitive)
        + community_bonus(result, intent)
        - exclusion_penalty(result, &intent.excluded_terms)
}

/// Result kinds each classification favours.
fn preferred_kinds(kind: IntentKind) -> &'static [ResultKind] {
    match kind {
        IntentKind::Comment => &[ResultKind::Comment],
        IntentKind::Author => &[ResultKind::Post, ResultKind::Comment],
        IntentKind::General => &[],
        IntentKind::Community
        | IntentKind::Post
        | IntentKind::TimeBased
        | IntentKind::Trending
        | IntentKind::Ranking
        | IntentKind::Comparison => &[ResultKind::Post],
    }
}

fn kind_bonus(kind: ResultKind, intent: &QueryIntent) -> f64 {
    if preferred_kinds(intent.kind).contains(&kind) {
        KIND_MATCH_BONUS
    } else {
        0.0
    }
}

fn keyword_score(result: &SearchResult, keywords: &[String]) -> f64 {
    let title = result.title.to_lowercase();
    let content = result.content.to_lowercase();
    keywords
        .iter()
        .map(|keyword| {
            let in_title = if title.contains(keyword.as_str()) {
                TITLE_KEYWORD_WEIGHT
            } else {
                0.0
            };
            let hits = content.matches(keyword.as_str()).count() as f64;
            in_title + (CONTENT_KEYWORD_WEIGHT * hits.ln_1p()).min(MAX_CONTENT_KEYWORD_SCORE)
        })
        .sum()
}

fn engagement_score(result: &SearchResult) -> f64 {
    let upvotes = result.score.max(0) as f64;
    SCORE_ENGAGEMENT_WEIGHT * upvotes.ln_1p() + REPLY_ENGAGEMENT_WEIGHT * (result.reply_count as f64).ln_1p()
}

/// Decay window per timeframe, in days.
fn window_days(timeframe: Timeframe) -> f64 {
    match timeframe {
        Timeframe::Day => 1.0,
        Timeframe::Week => 7.0,
        Timeframe::Month => 30.0,
        Timeframe::Year => 365.0,
        Timeframe::All => 180.0,
    }
}

fn recency_score(
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    timeframe: Timeframe,
    time_sensitive: bool,
) -> f64 {
    let age_days = (now - created_at).num_seconds().max(0) as f64 / 86_400.0;
    let weight = if time_sensitive {
        2.0 * RECENCY_WEIGHT
    } else {
        RECENCY_WEIGHT
    };
    weight * (-age_days / window_days(timeframe)).exp()
}

fn community_bonus(result: &SearchResult, intent: &QueryIntent) -> f64 {
    let community = result.community.to_lowercase();
    if community.is_empty() {
        return 0.0;
    }
    if intent.communities.contains(&community) {
        COMMUNITY_BONUS
    } else if intent.category_communities().any(|c| c == community) {
        CATEGORY_BONUS
    } else {
        0.0
    }
}

fn exclusion_penalty(result: &SearchResult, excluded: &[String]) -> f64 {
    if excluded.is_empty() {
        return 0.0;
    }
    let haystack = format!("{} {} {}", result.title, result.content, result.community).to_lowercase();
    let matched = excluded
        .iter()
        .filter(|term| haystack.contains(term.as_str()))
        .count();
    EXCLUSION_PENALTY * matched as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryAnalyzer;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
    }

    fn intent(query: &str) -> QueryIntent {
        QueryAnalyzer::new().expect("patterns").analyze(query)
    }

    fn make_result(kind: ResultKind, title: &str, content: &str) -> SearchResult {
        SearchResult {
            id: "x".into(),
            kind,
            title: title.into(),
            community: "misc".into(),
            author: "a".into(),
            content: content.into(),
            url: "https://www.reddit.com/r/misc/comments/x/".into(),
            created_at: now() - Duration::days(400),
            score: 0,
            reply_count: 0,
            highlights: vec![],
            relevance: 0.0,
        }
    }

    #[test]
    fn title_match_beats_content_match() {
        let i = intent("sourdough starter");
        let in_title = make_result(ResultKind::Post, "Sourdough tips", "");
        let in_body = make_result(ResultKind::Post, "Tips", "sourdough");
        assert!(calculate_score(&in_title, &i, now()) > calculate_score(&in_body, &i, now()));
    }

    #[test]
    fn content_repeats_grow_logarithmically() {
        let i = intent("sourdough");
        let once = make_result(ResultKind::Post, "", "sourdough");
        let many = make_result(ResultKind::Post, "", &"sourdough ".repeat(8));
        let delta = calculate_score(&many, &i, now()) - calculate_score(&once, &i, now());
        assert!((delta - (9f64.ln() - 2f64.ln())).abs() < 1e-9);
    }

    #[test]
    fn repeated_body_hits_never_outweigh_a_title_hit() {
        let i = intent("sourdough");
        let in_title = make_result(ResultKind::Post, "Sourdough", "");
        let spammy = make_result(ResultKind::Post, "", &"sourdough ".repeat(50));
        assert!(calculate_score(&in_title, &i, now()) > calculate_score(&spammy, &i, now()));
    }

    #[test]
    fn exclusion_is_heavily_penalised() {
        let i = intent("laptops -apple");
        let clean = make_result(ResultKind::Post, "Great laptops", "");
        let excluded = make_result(ResultKind::Post, "Great laptops", "apple silicon");
        let gap = calculate_score(&clean, &i, now()) - calculate_score(&excluded, &i, now());
        assert!(gap > 90.0);
    }

    #[test]
    fn preferred_kind_gets_bonus() {
        let i = intent("comments about tabs versus spaces");
        let comment = make_result(ResultKind::Comment, "", "");
        let post = make_result(ResultKind::Post, "", "");
        let diff = calculate_score(&comment, &i, now()) - calculate_score(&post, &i, now());
        assert!((diff - KIND_MATCH_BONUS).abs() < 1e-9);
    }

    #[test]
    fn engagement_is_logarithmic_and_ignores_negative_scores() {
        let mut popular = make_result(ResultKind::Post, "", "");
        popular.score = 10_000;
        let mut downvoted = make_result(ResultKind::Post, "", "");
        downvoted.score = -50;
        let neutral = make_result(ResultKind::Post, "", "");
        assert!(engagement_score(&popular) > engagement_score(&neutral));
        assert_eq!(engagement_score(&downvoted), engagement_score(&neutral));
    }

    #[test]
    fn recency_decays_faster_for_day_window() {
        let created = now() - Duration::days(2);
        let day = recency_score(created, now(), Timeframe::Day, false);
        let year = recency_score(created, now(), Timeframe::Year, false);
        assert!(day < year);
        assert!(year < RECENCY_WEIGHT);
    }

    #[test]
    fn time_sensitive_doubles_recency() {
        let created = now() - Duration::hours(1);
        let plain = recency_score(created, now(), Timeframe::Week, false);
        let sensitive = recency_score(created, now(), Timeframe::Week, true);
        assert!((sensitive - 2.0 * plain).abs() < 1e-9);
    }

    #[test]
    fn future_timestamps_do_not_exceed_peak() {
        let created = now() + Duration::days(3);
        assert!((recency_score(created, now(), Timeframe::Day, false) - RECENCY_WEIGHT).abs() < 1e-9);
    }

    #[test]
    fn named_community_beats_category_community() {
        let i = intent("r/movies good films");
        let mut named = make_result(ResultKind::Post, "", "");
        named.community = "Movies".into();
        let mut category = make_result(ResultKind::Post, "", "");
        category.community = "truefilm".into();
        let other = make_result(ResultKind::Post, "", "");
        let score = |r: &SearchResult| calculate_score(r, &i, now());
        assert!(score(&named) > score(&category));
        assert!(score(&category) > score(&other));
    }

    #[test]
    fn scoring_is_deterministic() {
        let i = intent("best rust books");
        let r = make_result(ResultKind::Post, "Rust books", "The best rust book");
        assert_eq!(calculate_score(&r, &i, now()), calculate_score(&r, &i, now()));
    }
}
