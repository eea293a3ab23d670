//! URL normalisation for result deduplication.
//!
//! Canonicalises forum URLs so that the same item reached through
//! different hosts, slugs, tracking parameters or fragments compares
//! as equal.

use url::Url;

/// Query parameters stripped during normalisation (matched lowercase).
const TRACKING_PARAMS: &[&str] = &[
    "share_id", "context", "ref", "ref_source", "rdt", "sh", "si", "fbclid", "gclid", "feature",
];

/// Hosts folded onto the canonical host.
const FORUM_HOSTS: &[&str] = &[
    "reddit.com",
    "www.reddit.com",
    "old.reddit.com",
    "new.reddit.com",
    "np.reddit.com",
    "m.reddit.com",
];

const CANONICAL_FORUM_HOST: &str = "www.reddit.com";

/// Normalise a URL for deduplication comparison.
///
/// 1. Fold `old.`/`np.`/`new.`/`m.`/bare forum hosts onto `www.`, force https.
/// 2. Lowercase forum paths and replace post slugs with `_`.
/// 3. Strip `utm_*` and other tracking parameters; sort the rest.
/// 4. Drop the fragment, default port and trailing slash.
///
/// Unparseable input is returned unchanged.
///
/// ```
/// use threadlens_search::orchestrator::url_normalize::normalize_url;
///
/// let a = normalize_url("https://old.reddit.com/r/Rust/comments/abc/some_slug/?utm_source=share");
/// let b = normalize_url("https://www.reddit.com/r/rust/comments/abc/");
/// assert_eq!(a, b);
/// ```
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut parsed) = Url::parse(raw.trim()) else {
        return raw.to_string();
    };

    parsed.set_fragment(None);
    if is_default_port(&parsed) {
        let _ = parsed.set_port(None);
    }

    let forum = parsed
        .host_str()
        .is_some_and(|host| FORUM_HOSTS.contains(&host));
    if forum {
        let _ = parsed.set_host(Some(CANONICAL_FORUM_HOST));
        let _ = parsed.set_scheme("https");
        let path = canonical_forum_path(parsed.path());
        parsed.set_path(&path);
    }

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| {
            let k = key.to_lowercase();
            !k.starts_with("utm_") && !TRACKING_PARAMS.contains(&k.as_str())
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();
    if params.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(&params);
    }

    let path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(path.trim_end_matches('/'));
    }

    parsed.to_string()
}

/// `/r/{sub}/comments/{id}/{slug}/{comment}` → `/r/{sub}/comments/{id}/_/{comment}`.
fn canonical_forum_path(path: &str) -> String {
    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect();
    match segments.as_slice() {
        [r, sub, comments, id, rest @ ..] if r == "r" && comments == "comments" => {
            let mut out = format!("/r/{sub}/comments/{id}");
            if let [_, comment, ..] = rest {
                out.push_str("/_/");
                out.push_str(comment);
            }
            out
        }
        _ => format!("/{}", segments.join("/")),
    }
}

fn is_default_port(url: &Url) -> bool {
    matches!(
        (url.scheme(), url.port()),
        ("http", Some(80)) | ("https", Some(443))
    )
}
