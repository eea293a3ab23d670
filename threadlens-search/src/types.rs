//! Core types for canonical search results and search parameters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SearchError;

/// A canonical forum item after normalisation.
///
/// Created by the response parser. The ranker fills in `relevance` and
/// `highlights` and reorders the list; nothing touches it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Upstream identifier. Unique within one response set only.
    pub id: String,
    /// Post, comment or community.
    pub kind: ResultKind,
    /// Post title, parent-post title for comments, display title for communities.
    pub title: String,
    /// Community (subreddit) the item belongs to, without the `r/` prefix.
    pub community: String,
    /// Author name without the `u/` prefix. Empty for communities.
    pub author: String,
    /// Body text: self-text, comment body or community description.
    pub content: String,
    /// Canonical absolute URL.
    pub url: String,
    /// Creation time reported by the upstream.
    pub created_at: DateTime<Utc>,
    /// Engagement score: net upvotes, or subscribers for communities.
    pub score: i64,
    /// Reply count: comments on a post, active users for a community.
    pub reply_count: u64,
    /// Most relevant sentences of `content`, best first.
    #[serde(default)]
    pub highlights: Vec<String>,
    /// Relevance score assigned by the ranker (0.0 before ranking).
    #[serde(default)]
    pub relevance: f64,
}

impl SearchResult {
    /// Rough heap footprint used by the result cache's size bound.
    pub fn estimated_size(&self) -> usize {
        const FIXED_OVERHEAD: usize = 96;
        FIXED_OVERHEAD
            + self.id.len()
            + self.title.len()
            + self.community.len()
            + self.author.len()
            + self.content.len()
            + self.url.len()
            + self.highlights.iter().map(String::len).sum::<usize>()
    }
}

/// The kind of item a result represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    /// A submission (`t3`).
    Post,
    /// A comment (`t1`).
    Comment,
    /// A community (`t5`).
    Community,
}

impl ResultKind {
    /// Returns the lowercase name of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
            Self::Community => "community",
        }
    }

    /// Returns all kinds in display order.
    pub fn all() -> &'static [ResultKind] {
        &[Self::Post, Self::Comment, Self::Community]
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Time window a query is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    /// Last 24 hours.
    Day,
    /// Last 7 days.
    Week,
    /// Last 30 days.
    Month,
    /// Last 365 days.
    Year,
    /// No time restriction.
    #[default]
    All,
}

impl Timeframe {
    /// Value of the upstream `t` query parameter.
    pub fn as_param(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::All => "all",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

/// Sort order requested from the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Upstream relevance.
    #[default]
    Relevance,
    /// Currently trending.
    Hot,
    /// Highest scored within the timeframe.
    Top,
    /// Newest first.
    New,
    /// Most commented.
    Comments,
}

impl SortOrder {
    /// Value of the upstream `sort` query parameter.
    pub fn as_param(&self) -> &'static str {
        match self {
            Self::Relevance => "relevance",
            Self::Hot => "hot",
            Self::Top => "top",
            Self::New => "new",
            Self::Comments => "comments",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

/// How the caller wants the search performed.
///
/// `Auto` lets the query intent pick the retrieval strategies; the other
/// modes force a single content-type strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Strategies chosen from the query intent.
    #[default]
    Auto,
    /// Post search only.
    Posts,
    /// Comment search only.
    Comments,
    /// Community search only.
    Communities,
}

impl SearchMode {
    /// Returns the lowercase name of this mode.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Posts => "posts",
            Self::Comments => "comments",
            Self::Communities => "communities",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SearchMode {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "posts" | "post" => Ok(Self::Posts),
            "comments" | "comment" => Ok(Self::Comments),
            "communities" | "community" | "subreddits" => Ok(Self::Communities),
            other => Err(SearchError::Validation(format!(
                "unknown search mode '{other}'"
            ))),
        }
    }
}
