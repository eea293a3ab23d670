//! Decoding of upstream listing payloads into [`SearchResult`]s.
//!
//! Payloads are either one `Listing` or an array of listings. Every child is
//! a tagged item (`t3` post, `t1` comment, `t5` community) decoded on its
//! own: an item that does not match its tag's shape is skipped, it never
//! fails the payload.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::SearchError;
use crate::types::{ResultKind, SearchResult};

/// Host used to turn relative permalinks into absolute URLs.
pub const CANONICAL_HOST: &str = "https://www.reddit.com";

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", content = "data")]
enum Thing {
    #[serde(rename = "t3")]
    Post(PostData),
    #[serde(rename = "t1")]
    Comment(CommentData),
    #[serde(rename = "t5")]
    Community(CommunityData),
    #[serde(rename = "Listing")]
    Listing(ListingData),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListingData {
    children: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PostData {
    id: String,
    title: String,
    subreddit: String,
    author: Option<String>,
    selftext: Option<String>,
    permalink: Option<String>,
    created_utc: f64,
    score: i64,
    num_comments: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommentData {
    id: String,
    body: Option<String>,
    subreddit: String,
    author: Option<String>,
    link_id: Option<String>,
    link_title: Option<String>,
    permalink: Option<String>,
    created_utc: f64,
    score: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommunityData {
    id: String,
    display_name: String,
    title: Option<String>,
    public_description: Option<String>,
    description: Option<String>,
    url: Option<String>,
    created_utc: f64,
    subscribers: Option<i64>,
    accounts_active: Option<u64>,
}

/// Parse a raw response body.
///
/// # Errors
///
/// Returns [`SearchError::Parse`] if the body is not JSON or is neither a
/// listing, an array of listings, nor a single tagged item.
pub fn parse_listing(body: &str) -> Result<Vec<SearchResult>, SearchError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| SearchError::Parse(format!("response is not valid JSON: {e}")))?;
    parse_value(value)
}

/// Parse an already decoded JSON payload.
///
/// # Errors
///
/// Returns [`SearchError::Parse`] for an unrecognised payload shape.
pub fn parse_value(value: Value) -> Result<Vec<SearchResult>, SearchError> {
    let roots = match value {
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        other => {
            return Err(SearchError::Parse(format!(
                "expected a listing, got {}",
                json_type(&other)
            )));
        }
    };

    let mut results = Vec::new();
    let mut skipped = 0usize;
    let mut recognised = false;

    for root in roots {
        match serde_json::from_value::<Thing>(root) {
            Ok(Thing::Listing(listing)) => {
                recognised = true;
                for child in listing.children {
                    match serde_json::from_value::<Thing>(child) {
                        Ok(Thing::Listing(_)) | Err(_) => skipped += 1,
                        Ok(thing) => match to_result(thing) {
                            Some(result) => results.push(result),
                            None => skipped += 1,
                        },
                    }
                }
            }
            Ok(thing) => {
                recognised = true;
                match to_result(thing) {
                    Some(result) => results.push(result),
                    None => skipped += 1,
                }
            }
            Err(e) => {
                tracing::trace!(error = %e, "skipping unrecognised payload root");
            }
        }
    }

    if !recognised {
        return Err(SearchError::Parse(
            "payload contains no listing or tagged item".into(),
        ));
    }
    if skipped > 0 {
        tracing::debug!(skipped, parsed = results.len(), "skipped malformed items");
    }
    Ok(results)
}

fn to_result(thing: Thing) -> Option<SearchResult> {
    let result = match thing {
        Thing::Post(post) => from_post(post),
        Thing::Comment(comment) => from_comment(comment),
        Thing::Community(community) => from_community(community),
        Thing::Listing(_) => return None,
    };
    if result.id.is_empty() && result.title.is_empty() {
        return None;
    }
    Some(result)
}

fn from_post(post: PostData) -> SearchResult {
    let url = match non_empty(post.permalink) {
        Some(permalink) => absolute(&permalink),
        None if !post.id.is_empty() && !post.subreddit.is_empty() => {
            format!("{CANONICAL_HOST}/r/{}/comments/{}/", post.subreddit, post.id)
        }
        None => community_url(&post.subreddit),
    };
    SearchResult {
        id: post.id,
        kind: ResultKind::Post,
        title: post.title,
        community: post.subreddit,
        author: post.author.unwrap_or_default(),
        content: post.selftext.unwrap_or_default(),
        url,
        created_at: timestamp(post.created_utc),
        score: post.score,
        reply_count: post.num_comments,
        highlights: Vec::new(),
        relevance: 0.0,
    }
}

fn from_comment(comment: CommentData) -> SearchResult {
    let parent = comment
        .link_id
        .as_deref()
        .map(|id| id.trim_start_matches("t3_").to_string())
        .filter(|id| !id.is_empty());
    let url = match (non_empty(comment.permalink), parent) {
        (Some(permalink), _) => absolute(&permalink),
        (None, Some(parent)) if !comment.subreddit.is_empty() => format!(
            "{CANONICAL_HOST}/r/{}/comments/{parent}/_/{}/",
            comment.subreddit, comment.id
        ),
        _ => community_url(&comment.subreddit),
    };
    SearchResult {
        id: comment.id,
        kind: ResultKind::Comment,
        title: comment.link_title.unwrap_or_default(),
        community: comment.subreddit,
        author: comment.author.unwrap_or_default(),
        content: comment.body.unwrap_or_default(),
        url,
        created_at: timestamp(comment.created_utc),
        score: comment.score,
        reply_count: 0,
        highlights: Vec::new(),
        relevance: 0.0,
    }
}

fn from_community(community: CommunityData) -> SearchResult {
    let url = match non_empty(community.url) {
        Some(path) => absolute(&path),
        None => community_url(&community.display_name),
    };
    let content = non_empty(community.public_description)
        .or_else(|| non_empty(community.description))
        .unwrap_or_default();
    let title = non_empty(community.title).unwrap_or_else(|| community.display_name.clone());
    SearchResult {
        id: community.id,
        kind: ResultKind::Community,
        title,
        community: community.display_name,
        author: String::new(),
        content,
        url,
        created_at: timestamp(community.created_utc),
        score: community.subscribers.unwrap_or(0),
        reply_count: community.accounts_active.unwrap_or(0),
        highlights: Vec::new(),
        relevance: 0.0,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn absolute(path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        format!("{CANONICAL_HOST}/{}", path.trim_start_matches('/'))
    }
}

fn community_url(name: &str) -> String {
    if name.is_empty() {
        CANONICAL_HOST.to_string()
    } else {
        format!("{CANONICAL_HOST}/r/{name}/")
    }
}

fn timestamp(created_utc: f64) -> DateTime<Utc> {
    if !created_utc.is_finite() || created_utc < 0.0 {
        return DateTime::<Utc>::default();
    }
    DateTime::from_timestamp(created_utc.trunc() as i64, 0).unwrap_or_default()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
