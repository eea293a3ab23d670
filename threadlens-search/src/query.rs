//! Query analysis: turns a raw query into a [`QueryIntent`].
//!
//! Analysis never fails. Every query resolves to exactly one
//! [`IntentKind`], picked by a fixed priority:
//! community reference, comment/post marker, author reference, temporal
//! cue, ranking cue, trending cue, comparison cue, then general.

use regex::Regex;
use serde::Serialize;
use std::fmt;

use crate::error::SearchError;
use crate::types::{SortOrder, Timeframe};

/// Largest quantity honoured from phrases like "top 500".
pub const MAX_QUANTITY: u32 = 100;

/// Classification of what a query is after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    General,
    Community,
    Post,
    Comment,
    Author,
    TimeBased,
    Trending,
    Ranking,
    Comparison,
}

impl IntentKind {
    /// Returns the snake_case name of this classification.
    pub fn name(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Community => "community",
            Self::Post => "post",
            Self::Comment => "comment",
            Self::Author => "author",
            Self::TimeBased => "time_based",
            Self::Trending => "trending",
            Self::Ranking => "ranking",
            Self::Comparison => "comparison",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Structured reading of a query. Produced once, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryIntent {
    pub kind: IntentKind,
    /// Community names referenced as `r/name`, lowercase, in order.
    pub communities: Vec<String>,
    /// Author names referenced as `u/name`, in order.
    pub authors: Vec<String>,
    /// Terms prefixed with `-`, lowercase.
    pub excluded_terms: Vec<String>,
    pub timeframe: Timeframe,
    pub sort: SortOrder,
    /// The query cares about recency.
    pub time_sensitive: bool,
    /// The query asks for a ranking ("top", "best", ...).
    pub ranking_aspect: bool,
    /// Explicit quantity such as "top 5" or "top five".
    pub quantity: Option<u32>,
    /// Category tags from the keyword lookup.
    pub categories: Vec<String>,
    /// Non-stopword tokens longer than two characters.
    pub keywords: Vec<String>,
    /// `keywords` minus intent cue words; used for scoring and as search text.
    pub filtered_keywords: Vec<String>,
    raw: String,
}

impl QueryIntent {
    /// The original query text, trimmed.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Text to send as the upstream `q` parameter.
    ///
    /// Falls back from filtered keywords to keywords to referenced
    /// communities, and finally to the raw query.
    pub fn search_terms(&self) -> String {
        if !self.filtered_keywords.is_empty() {
            return self.filtered_keywords.join(" ");
        }
        if !self.keywords.is_empty() {
            return self.keywords.join(" ");
        }
        if !self.communities.is_empty() {
            return self.communities.join(" ");
        }
        self.raw.clone()
    }

    /// Keywords used for scoring and highlights.
    pub fn scoring_keywords(&self) -> &[String] {
        if self.filtered_keywords.is_empty() {
            &self.keywords
        } else {
            &self.filtered_keywords
        }
    }

    /// Communities associated with the query's category tags.
    pub fn category_communities(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.categories.iter().flat_map(|category| {
            CATEGORIES
                .iter()
                .filter(move |entry| entry.0 == category.as_str())
                .flat_map(|entry| entry.2.iter().copied())
        })
    }
}

/// Words dropped from every keyword list.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "has", "him", "his", "how", "its", "who", "did", "yes", "get", "got",
    "this", "that", "these", "those", "with", "from", "what", "when", "where", "which", "while",
    "about", "into", "than", "then", "them", "they", "their", "there", "have", "does", "just",
    "some", "should", "would", "could", "will", "your", "yours", "been", "being", "were", "why",
    "also", "very", "much", "many", "more", "most", "other", "such", "only", "own", "same",
    "too", "can't", "don't", "anyone", "someone", "people", "know", "think", "want", "need",
    "like", "looking", "find", "tell", "give", "show", "let", "please",
];

/// Cue words removed in the second, scoring-oriented pass.
const CUE_WORDS: &[&str] = &[
    "top", "best", "worst", "greatest", "favorite", "favourite", "popular", "rated", "ranked",
    "ranking", "recommended", "recommendations", "recommend", "trending", "hot", "viral",
    "today", "tonight", "yesterday", "week", "weekly", "month", "monthly", "year", "yearly",
    "recent", "recently", "latest", "newest", "new", "now", "currently", "past", "last",
    "comment", "comments", "reply", "replies", "post", "posts", "thread", "threads",
    "submission", "submissions", "reddit", "subreddit", "subreddits", "versus", "compare",
    "compared", "comparison", "difference", "between", "better", "two", "three", "four",
    "five", "six", "seven", "eight", "nine", "ten", "twenty", "fifty", "hundred",
];

const NUMBER_WORDS: &[(&str, u32)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
    ("fifteen", 15),
    ("twenty", 20),
    ("fifty", 50),
    ("hundred", 100),
];

/// Category tag, trigger keywords, associated communities.
const CATEGORIES: &[(&str, &[&str], &[&str])] = &[
    (
        "movies",
        &["movie", "movies", "film", "films", "cinema", "director", "actor", "actress"],
        &["movies", "truefilm", "moviesuggestions", "flicks"],
    ),
    (
        "television",
        &["show", "shows", "series", "episode", "season", "sitcom", "netflix"],
        &["television", "tvshows", "netflix"],
    ),
    (
        "gaming",
        &["game", "games", "gaming", "console", "steam", "playstation", "xbox", "nintendo"],
        &["gaming", "games", "patientgamers", "pcgaming"],
    ),
    (
        "music",
        &["music", "song", "songs", "album", "albums", "band", "bands", "artist"],
        &["music", "listentothis", "indieheads", "hiphopheads"],
    ),
    (
        "books",
        &["book", "books", "novel", "novels", "author", "reading", "fiction"],
        &["books", "suggestmeabook", "fantasy", "printsf"],
    ),
    (
        "technology",
        &["programming", "code", "coding", "software", "rust", "python", "javascript", "linux", "computer", "laptop"],
        &["programming", "technology", "rust", "python", "linux", "learnprogramming"],
    ),
    (
        "science",
        &["science", "physics", "chemistry", "biology", "space", "research"],
        &["science", "askscience", "space", "physics"],
    ),
    (
        "food",
        &["food", "recipe", "recipes", "cooking", "restaurant", "restaurants", "meal"],
        &["food", "cooking", "recipes", "askculinary"],
    ),
    (
        "fitness",
        &["fitness", "workout", "workouts", "gym", "exercise", "running", "diet"],
        &["fitness", "bodyweightfitness", "running", "loseit"],
    ),
    (
        "finance",
        &["finance", "money", "stock", "stocks", "invest", "investing", "budget", "crypto"],
        &["personalfinance", "investing", "stocks", "financialindependence"],
    ),
    (
        "travel",
        &["travel", "trip", "vacation", "hotel", "flight", "flights"],
        &["travel", "solotravel", "backpacking"],
    ),
    (
        "sports",
        &["sport", "sports", "football", "soccer", "basketball", "nba", "nfl", "baseball"],
        &["sports", "nba", "nfl", "soccer"],
    ),
];

/// Compiled patterns for query analysis.
///
/// Build once and share; [`QueryAnalyzer::analyze`] takes `&self`.
#[derive(Debug, Clone)]
pub struct QueryAnalyzer {
    community: Regex,
    author: Regex,
    exclusion: Regex,
    quantity: Regex,
    day: Regex,
    week: Regex,
    month: Regex,
    year: Regex,
    recency: Regex,
    ranking: Regex,
    comment_marker: Regex,
    post_marker: Regex,
    trending: Regex,
    comparison: Regex,
}

impl QueryAnalyzer {
    /// Compile the analysis patterns.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if a pattern fails to compile.
    pub fn new() -> Result<Self, SearchError> {
        let number_words = NUMBER_WORDS
            .iter()
            .map(|(word, _)| *word)
            .collect::<Vec<_>>()
            .join("|");
        Ok(Self {
            community: compile(r"(?i)(?:^|[\s(,])/?r/([a-z0-9_]{2,21})\b")?,
            author: compile(r"(?i)(?:^|[\s(,])/?u(?:ser)?/([a-z0-9_-]{3,20})\b")?,
            exclusion: compile(r"(?:^|\s)-([\p{L}\p{N}][\p{L}\p{N}'_-]*)")?,
            quantity: compile(&format!(
                r"(?i)\b(?:top|best|worst|greatest|first)\s+(\d{{1,4}}|{number_words})\b"
            ))?,
            day: compile(r"(?i)\b(?:today|tonight|yesterday|this morning|past (?:24 hours|day)|last (?:24 hours|day))\b")?,
            week: compile(r"(?i)\b(?:this week|past week|last week|weekly|last (?:7|seven) days)\b")?,
            month: compile(r"(?i)\b(?:this month|past month|last month|monthly|last (?:30|thirty) days)\b")?,
            year: compile(r"(?i)\b(?:this year|past year|last year|yearly|annual|of (?:19|20)\d{2}|in (?:19|20)\d{2})\b")?,
            recency: compile(r"(?i)\b(?:recent|recently|latest|newest|new|now|currently|these days)\b")?,
            ranking: compile(r"(?i)\b(?:top|best|worst|greatest|favou?rites?|most popular|highest rated|top rated|must see|ranked|ranking|recommend(?:ed|ations?)?)\b")?,
            comment_marker: compile(r"(?i)\b(?:comments?|replies|replied|what (?:do )?people (?:say|think))\b")?,
            post_marker: compile(r"(?i)\b(?:posts?|threads?|submissions?)\b")?,
            trending: compile(r"(?i)\b(?:trending|hot|viral|popular right now|going on|buzz)\b")?,
            comparison: compile(r"(?i)\b(?:vs\.?|versus|compare[sd]?|comparison|better than|difference between)(?:\s|$)")?,
        })
    }

    /// Analyse a query. Never fails; unknown input yields [`IntentKind::General`].
    pub fn analyze(&self, query: &str) -> QueryIntent {
        let raw = query.trim().to_string();

        let communities = dedup(
            self.community
                .captures_iter(&raw)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str().to_lowercase()),
        );
        let authors = dedup(
            self.author
                .captures_iter(&raw)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str().to_string()),
        );
        let excluded_terms = dedup(
            self.exclusion
                .captures_iter(&raw)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str().to_lowercase()),
        );

        let stripped = self.exclusion.replace_all(&raw, " ");
        let stripped = self.community.replace_all(&stripped, " ");
        let stripped = self.author.replace_all(&stripped, " ").into_owned();

        let (timeframe, explicit_timeframe) = self.timeframe(&stripped);
        let recency = self.recency.is_match(&stripped);
        let time_sensitive = explicit_timeframe || recency;
        let timeframe = match (explicit_timeframe, recency) {
            (true, _) => timeframe,
            (false, true) => Timeframe::Week,
            (false, false) => Timeframe::All,
        };

        let ranking_aspect = self.ranking.is_match(&stripped);
        let trending = self.trending.is_match(&stripped);
        let comparison = self.comparison.is_match(&stripped);
        let comment_marker = self.comment_marker.is_match(&stripped);
        let post_marker = self.post_marker.is_match(&stripped);
        let quantity = self.quantity(&stripped);

        let kind = if !communities.is_empty() {
            IntentKind::Community
        } else if comment_marker {
            IntentKind::Comment
        } else if post_marker {
            IntentKind::Post
        } else if !authors.is_empty() {
            IntentKind::Author
        } else if time_sensitive {
            IntentKind::TimeBased
        } else if ranking_aspect {
            IntentKind::Ranking
        } else if trending {
            IntentKind::Trending
        } else if comparison {
            IntentKind::Comparison
        } else {
            IntentKind::General
        };

        let sort = if ranking_aspect {
            SortOrder::Top
        } else if trending {
            SortOrder::Hot
        } else if recency && !explicit_timeframe {
            SortOrder::New
        } else if comment_marker {
            SortOrder::Comments
        } else {
            SortOrder::Relevance
        };

        let keywords = dedup(
            tokenize(&stripped)
                .filter(|t| t.chars().count() > 2)
                .filter(|t| !STOPWORDS.contains(&t.as_str())),
        );
        let filtered_keywords = keywords
            .iter()
            .filter(|k| !CUE_WORDS.contains(&k.as_str()))
            .filter(|k| !k.chars().all(|c| c.is_ascii_digit()))
            .cloned()
            .collect::<Vec<_>>();
        let categories = CATEGORIES
            .iter()
            .filter(|(_, triggers, community_names)| {
                keywords.iter().any(|k| triggers.contains(&k.as_str()))
                    || communities.iter().any(|c| community_names.contains(&c.as_str()))
            })
            .map(|(name, _, _)| (*name).to_string())
            .collect();

        let intent = QueryIntent {
            kind,
            communities,
            authors,
            excluded_terms,
            timeframe,
            sort,
            time_sensitive,
            ranking_aspect,
            quantity,
            categories,
            keywords,
            filtered_keywords,
            raw,
        };
        tracing::trace!(query = %intent.raw, kind = %intent.kind, "query analysed");
        intent
    }

    fn timeframe(&self, text: &str) -> (Timeframe, bool) {
        [
            (&self.day, Timeframe::Day),
            (&self.week, Timeframe::Week),
            (&self.month, Timeframe::Month),
            (&self.year, Timeframe::Year),
        ]
        .into_iter()
        .find(|(pattern, _)| pattern.is_match(text))
        .map(|(_, timeframe)| (timeframe, true))
        .unwrap_or((Timeframe::All, false))
    }

    fn quantity(&self, text: &str) -> Option<u32> {
        let captured = self.quantity.captures(text)?.get(1)?.as_str().to_lowercase();
        let value = match captured.parse::<u32>() {
            Ok(n) => n,
            Err(_) => NUMBER_WORDS
                .iter()
                .find(|(word, _)| *word == captured)
                .map(|(_, n)| *n)?,
        };
        (value > 0).then(|| value.min(MAX_QUANTITY))
    }
}

fn compile(pattern: &str) -> Result<Regex, SearchError> {
    Regex::new(pattern)
        .map_err(|e| SearchError::Config(format!("invalid query pattern '{pattern}': {e}")))
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\'').to_lowercase())
        .filter(|t| !t.is_empty())
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(query: &str) -> QueryIntent {
        QueryAnalyzer::new().expect("patterns compile").analyze(query)
    }

    #[test]
    fn top_five_movies_this_week() {
        let intent = analyze("top 5 movies this week");
        assert_eq!(intent.quantity, Some(5));
        assert_eq!(intent.timeframe, Timeframe::Week);
        assert!(intent.time_sensitive);
        assert!(intent.ranking_aspect);
        assert_eq!(intent.kind, IntentKind::TimeBased);
        assert_eq!(intent.sort, SortOrder::Top);
        assert_eq!(intent.filtered_keywords, vec!["movies"]);
        assert_eq!(intent.categories, vec!["movies"]);
    }

    #[test]
    fn quantity_in_words() {
        assert_eq!(analyze("best five sci-fi novels").quantity, Some(5));
        assert_eq!(analyze("top 1000 songs").quantity, Some(MAX_QUANTITY));
        assert_eq!(analyze("top 0 songs").quantity, None);
        assert_eq!(analyze("songs about rain").quantity, None);
    }

    #[test]
    fn community_reference_wins() {
        let intent = analyze("latest comments in r/Rust about async");
        assert_eq!(intent.kind, IntentKind::Community);
        assert_eq!(intent.communities, vec!["rust"]);
        assert!(intent.categories.contains(&"technology".to_string()));
        assert!(!intent.keywords.iter().any(|k| k.contains("rust")));
    }

    #[test]
    fn comment_marker_beats_author() {
        let intent = analyze("comments by u/spez on moderation");
        assert_eq!(intent.kind, IntentKind::Comment);
        assert_eq!(intent.authors, vec!["spez"]);
    }

    #[test]
    fn post_marker() {
        assert_eq!(analyze("threads on mechanical keyboards").kind, IntentKind::Post);
    }

    #[test]
    fn author_reference() {
        let intent = analyze("what has /u/some_user written");
        assert_eq!(intent.kind, IntentKind::Author);
        assert_eq!(intent.authors, vec!["some_user"]);
    }

    #[test]
    fn exclusions_are_extracted_and_removed() {
        let intent = analyze("budget laptops -apple -chromebook");
        assert_eq!(intent.excluded_terms, vec!["apple", "chromebook"]);
        assert!(!intent.keywords.contains(&"apple".to_string()));
        assert!(intent.keywords.contains(&"laptops".to_string()));
    }

    #[test]
    fn hyphenated_words_are_not_exclusions() {
        let intent = analyze("state-of-the-art compilers");
        assert!(intent.excluded_terms.is_empty());
    }

    #[test]
    fn ranking_without_time() {
        let intent = analyze("best hiking boots");
        assert_eq!(intent.kind, IntentKind::Ranking);
        assert!(!intent.time_sensitive);
        assert_eq!(intent.timeframe, Timeframe::All);
    }

    #[test]
    fn trending_cue() {
        let intent = analyze("what is trending in gaming");
        assert_eq!(intent.kind, IntentKind::Trending);
        assert_eq!(intent.sort, SortOrder::Hot);
    }

    #[test]
    fn comparison_cue() {
        assert_eq!(analyze("tokio vs async-std").kind, IntentKind::Comparison);
        assert_eq!(
            analyze("difference between espresso and ristretto").kind,
            IntentKind::Comparison
        );
    }

    #[test]
    fn recency_without_explicit_window() {
        let intent = analyze("latest kernel release");
        assert!(intent.time_sensitive);
        assert_eq!(intent.timeframe, Timeframe::Week);
        assert_eq!(intent.sort, SortOrder::New);
        assert_eq!(intent.kind, IntentKind::TimeBased);
    }

    #[test]
    fn bare_now_is_a_recency_cue() {
        let intent = analyze("what games are people playing now");
        assert!(intent.time_sensitive);
        assert_eq!(intent.kind, IntentKind::TimeBased);
        assert_eq!(intent.timeframe, Timeframe::Week);
        assert!(!intent.keywords.iter().any(|k| k == "now"));
    }

    #[test]
    fn now_inside_words_is_not_a_cue() {
        assert!(!analyze("nowhere to hide").time_sensitive);
        assert!(!analyze("snowboard wax").time_sensitive);
    }

    #[test]
    fn day_and_year_windows() {
        assert_eq!(analyze("news today").timeframe, Timeframe::Day);
        assert_eq!(analyze("albums of 2023").timeframe, Timeframe::Year);
        assert_eq!(analyze("this month in science").timeframe, Timeframe::Month);
    }

    #[test]
    fn general_fallback_and_keywords() {
        let intent = analyze("how do I fix a leaky faucet");
        assert_eq!(intent.kind, IntentKind::General);
        assert_eq!(intent.keywords, vec!["fix", "leaky", "faucet"]);
        assert_eq!(intent.search_terms(), "fix leaky faucet");
    }

    #[test]
    fn search_terms_fall_back_to_communities_then_raw() {
        assert_eq!(analyze("r/rust").search_terms(), "rust");
        assert_eq!(analyze("  ok  ").search_terms(), "ok");
    }

    #[test]
    fn never_panics_on_odd_input() {
        for query in ["", "   ", "-", "r/", "u/", "🦀🦀", "top", "-- --", "vs", "(r/a)", "top \u{0}"] {
            let intent = analyze(query);
            assert!(!intent.kind.name().is_empty());
        }
    }

    #[test]
    fn category_communities_lookup() {
        let intent = analyze("good movies");
        assert!(intent.category_communities().any(|c| c == "truefilm"));
    }
}
