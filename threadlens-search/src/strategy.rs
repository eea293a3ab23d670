//! Retrieval strategies: the closed set of ways a query hits the upstream.
//!
//! Each [`RetrievalStrategy`] knows its endpoint and parameters. The
//! orchestrator picks a set with [`select_strategies`] and runs them
//! concurrently; a strategy's failure is isolated to its own branch.

use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::error::SearchError;
use crate::http::UpstreamClient;
use crate::parser;
use crate::query::{IntentKind, QueryIntent};
use crate::types::{SearchMode, SearchResult, SortOrder, Timeframe};

/// Most author timelines fetched for one query.
const MAX_AUTHOR_STRATEGIES: usize = 3;

/// One way of retrieving candidates from the upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalStrategy {
    /// Full-text post search, optionally restricted to communities.
    PostSearch { community: Option<String> },
    /// Full-text comment search, optionally restricted to communities.
    CommentSearch { community: Option<String> },
    /// Search for communities by name and description.
    CommunitySearch,
    /// Recent activity of one author.
    AuthorContent { author: String },
    /// Hot or top listing of a community, or the front page when `None`.
    TrendingCommunity { community: Option<String> },
}

impl RetrievalStrategy {
    /// Short human-readable description for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::PostSearch { community: None } => "post search".into(),
            Self::PostSearch { community: Some(c) } => format!("post search in r/{c}"),
            Self::CommentSearch { community: None } => "comment search".into(),
            Self::CommentSearch { community: Some(c) } => format!("comment search in r/{c}"),
            Self::CommunitySearch => "community search".into(),
            Self::AuthorContent { author } => format!("content by u/{author}"),
            Self::TrendingCommunity { community: None } => "trending on r/popular".into(),
            Self::TrendingCommunity { community: Some(c) } => format!("trending in r/{c}"),
        }
    }

    /// Upstream path and query parameters for this strategy.
    pub fn request(&self, intent: &QueryIntent, limit: usize) -> (String, Vec<(&'static str, String)>) {
        let limit = limit.clamp(1, 100).to_string();
        match self {
            Self::PostSearch { community } | Self::CommentSearch { community } => {
                let kind = if matches!(self, Self::PostSearch { .. }) {
                    "link"
                } else {
                    "comment"
                };
                let path = match community {
                    Some(c) => format!("/r/{c}/search"),
                    None => "/search".to_string(),
                };
                let mut params = vec![
                    ("q", intent.search_terms()),
                    ("type", kind.to_string()),
                    ("sort", intent.sort.as_param().to_string()),
                    ("t", intent.timeframe.as_param().to_string()),
                    ("limit", limit),
                ];
                if kind == "link" {
                    params.push(("restrict_sr", community.is_some().to_string()));
                }
                (path, params)
            }
            Self::CommunitySearch => (
                "/subreddits/search".to_string(),
                vec![("q", intent.search_terms()), ("limit", limit)],
            ),
            Self::AuthorContent { author } => {
                let sort = match intent.sort {
                    SortOrder::Top => "top",
                    SortOrder::Hot => "hot",
                    _ => "new",
                };
                (
                    format!("/user/{author}/overview"),
                    vec![
                        ("sort", sort.to_string()),
                        ("t", intent.timeframe.as_param().to_string()),
                        ("limit", limit),
                    ],
                )
            }
            Self::TrendingCommunity { community } => {
                let community = community.as_deref().unwrap_or("popular");
                let listing = if intent.ranking_aspect || intent.timeframe != Timeframe::All {
                    "top"
                } else {
                    "hot"
                };
                (
                    format!("/r/{community}/{listing}"),
                    vec![("t", intent.timeframe.as_param().to_string()), ("limit", limit)],
                )
            }
        }
    }

    /// Run the strategy against the upstream.
    ///
    /// # Errors
    ///
    /// Propagates transport, auth, rate-limit and parse failures for this
    /// branch only.
    pub async fn execute(
        &self,
        client: &UpstreamClient,
        intent: &QueryIntent,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let (path, params) = self.request(intent, limit);
        let body = client.get(&path, &params, cancel).await?;
        let results = parser::parse_listing(&body)?;
        tracing::debug!(strategy = %self, count = results.len(), "strategy returned results");
        Ok(results)
    }
}

impl fmt::Display for RetrievalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Choose the strategies for an intent.
///
/// A forced [`SearchMode`] selects exactly one content-type strategy; in
/// [`SearchMode::Auto`] the intent decides. Order matters: on duplicate
/// results the earlier strategy's copy wins.
pub fn select_strategies(intent: &QueryIntent, mode: SearchMode) -> Vec<RetrievalStrategy> {
    let community = (!intent.communities.is_empty()).then(|| intent.communities.join("+"));

    match mode {
        SearchMode::Posts => return vec![RetrievalStrategy::PostSearch { community }],
        SearchMode::Comments => return vec![RetrievalStrategy::CommentSearch { community }],
        SearchMode::Communities => return vec![RetrievalStrategy::CommunitySearch],
        SearchMode::Auto => {}
    }

    let posts = RetrievalStrategy::PostSearch {
        community: community.clone(),
    };
    let comments = RetrievalStrategy::CommentSearch {
        community: community.clone(),
    };

    let mut strategies = match intent.kind {
        IntentKind::Community => vec![
            posts,
            RetrievalStrategy::TrendingCommunity {
                community: community.clone(),
            },
            comments,
        ],
        IntentKind::Post => vec![posts],
        IntentKind::Comment => vec![comments, posts],
        IntentKind::Author => Vec::new(),
        IntentKind::Trending => vec![
            RetrievalStrategy::TrendingCommunity {
                community: community.clone(),
            },
            posts,
        ],
        IntentKind::TimeBased | IntentKind::Ranking | IntentKind::Comparison => {
            vec![posts, comments]
        }
        IntentKind::General => vec![posts, comments, RetrievalStrategy::CommunitySearch],
    };

    for author in intent.authors.iter().take(MAX_AUTHOR_STRATEGIES) {
        strategies.push(RetrievalStrategy::AuthorContent {
            author: author.clone(),
        });
    }
    if intent.kind == IntentKind::Author && !intent.filtered_keywords.is_empty() {
        strategies.push(RetrievalStrategy::PostSearch { community });
    }
    strategies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryAnalyzer;

    fn intent(query: &str) -> QueryIntent {
        QueryAnalyzer::new().expect("patterns").analyze(query)
    }

    fn param<'a>(params: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn general_query_uses_three_strategies() {
        let strategies = select_strategies(&intent("leaky faucet repair"), SearchMode::Auto);
        assert_eq!(
            strategies,
            vec![
                RetrievalStrategy::PostSearch { community: None },
                RetrievalStrategy::CommentSearch { community: None },
                RetrievalStrategy::CommunitySearch,
            ]
        );
    }

    #[test]
    fn forced_mode_selects_one_strategy() {
        let i = intent("r/rust async traits");
        assert_eq!(
            select_strategies(&i, SearchMode::Posts),
            vec![RetrievalStrategy::PostSearch {
                community: Some("rust".into())
            }]
        );
        assert_eq!(
            select_strategies(&i, SearchMode::Communities),
            vec![RetrievalStrategy::CommunitySearch]
        );
    }

    #[test]
    fn community_intent_includes_trending_listing() {
        let strategies = select_strategies(&intent("r/movies r/truefilm picks"), SearchMode::Auto);
        assert!(strategies.contains(&RetrievalStrategy::TrendingCommunity {
            community: Some("movies+truefilm".into())
        }));
    }

    #[test]
    fn author_intent_fetches_timelines() {
        let strategies = select_strategies(&intent("u/alice u/bob"), SearchMode::Auto);
        assert_eq!(
            strategies,
            vec![
                RetrievalStrategy::AuthorContent { author: "alice".into() },
                RetrievalStrategy::AuthorContent { author: "bob".into() },
            ]
        );
        let with_topic = select_strategies(&intent("u/alice sourdough"), SearchMode::Auto);
        assert_eq!(with_topic.len(), 2);
    }

    #[test]
    fn post_search_request_shape() {
        let i = intent("top 5 movies this week");
        let (path, params) = RetrievalStrategy::PostSearch { community: None }.request(&i, 25);
        assert_eq!(path, "/search");
        assert_eq!(param(&params, "q"), Some("movies"));
        assert_eq!(param(&params, "type"), Some("link"));
        assert_eq!(param(&params, "sort"), Some("top"));
        assert_eq!(param(&params, "t"), Some("week"));
        assert_eq!(param(&params, "limit"), Some("25"));
        assert_eq!(param(&params, "restrict_sr"), Some("false"));
    }

    #[test]
    fn restricted_search_path() {
        let i = intent("r/rust borrow checker");
        let (path, params) = RetrievalStrategy::CommentSearch {
            community: Some("rust".into()),
        }
        .request(&i, 500);
        assert_eq!(path, "/r/rust/search");
        assert_eq!(param(&params, "type"), Some("comment"));
        assert_eq!(param(&params, "limit"), Some("100"));
        assert_eq!(param(&params, "restrict_sr"), None);
    }

    #[test]
    fn trending_defaults_to_popular_hot() {
        let i = intent("what is trending");
        let (path, _) = RetrievalStrategy::TrendingCommunity { community: None }.request(&i, 10);
        assert_eq!(path, "/r/popular/hot");
    }

    #[test]
    fn describe_names_target() {
        assert_eq!(
            RetrievalStrategy::AuthorContent { author: "ferris".into() }.to_string(),
            "content by u/ferris"
        );
        assert_eq!(
            RetrievalStrategy::PostSearch { community: Some("rust".into()) }.describe(),
            "post search in r/rust"
        );
    }
}
