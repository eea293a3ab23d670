//! Citation markers (`[n]`) in the answer segment.

use serde::Serialize;
use threadlens_search::highlight::truncate_at_word;
use threadlens_search::{ResultKind, SearchResult};

/// Citation excerpts are cut at a word boundary beyond this length.
pub const MAX_EXCERPT_CHARS: usize = 240;

/// A validated reference from the answer to one of the supplied results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    /// 1-based position in the supplied results.
    pub index: usize,
    /// The sentence around the first occurrence of the marker.
    pub excerpt: String,
    pub url: String,
    pub title: String,
    pub kind: ResultKind,
    pub community: String,
}

/// A marker occurrence: cited number and its byte span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Marker {
    number: usize,
    start: usize,
    end: usize,
}

/// Collect citations from `answer` against `results`.
///
/// Markers are `[n]` or `[n, m]`. Each number is kept once, at its first
/// appearance. Numbers outside `1..=results.len()` are dropped.
pub fn extract_citations(answer: &str, results: &[SearchResult]) -> Vec<Citation> {
    let mut seen = Vec::new();
    let mut citations = Vec::new();
    for marker in markers(answer) {
        if marker.number == 0 || marker.number > results.len() || seen.contains(&marker.number) {
            continue;
        }
        seen.push(marker.number);
        let result = &results[marker.number - 1];
        let (from, to) = sentence_bounds(answer, marker.start, marker.end);
        let excerpt = answer[from..to].split_whitespace().collect::<Vec<_>>().join(" ");
        citations.push(Citation {
            index: marker.number,
            excerpt: truncate_at_word(&excerpt, MAX_EXCERPT_CHARS),
            url: result.url.clone(),
            title: result.title.clone(),
            kind: result.kind,
            community: result.community.clone(),
        });
    }
    citations
}

fn markers(text: &str) -> Vec<Marker> {
    let mut found = Vec::new();
    let mut offset = 0;
    while let Some(open) = text[offset..].find('[') {
        let start = offset + open;
        let Some(close) = text[start + 1..].find(']') else {
            break;
        };
        let end = start + 1 + close + 1;
        let inner = &text[start + 1..end - 1];
        let numbers: Option<Vec<usize>> = inner
            .split(',')
            .map(|part| {
                let part = part.trim();
                if part.is_empty() || part.len() > 4 || !part.bytes().all(|b| b.is_ascii_digit()) {
                    None
                } else {
                    part.parse().ok()
                }
            })
            .collect();
        match numbers {
            Some(numbers) => {
                found.extend(numbers.into_iter().map(|number| Marker { number, start, end }));
                offset = end;
            }
            // Not a marker; a later `[` inside may still open one.
            None => offset = start + 1,
        }
    }
    found
}

// Back to the previous sentence or paragraph boundary, forward to the next
// sentence terminator or blank line.
fn sentence_bounds(text: &str, start: usize, end: usize) -> (usize, usize) {
    let bytes = text.as_bytes();

    let mut from = 0;
    let mut i = start;
    while i > 0 {
        i -= 1;
        let b = bytes[i];
        let terminator = matches!(b, b'.' | b'!' | b'?')
            && bytes.get(i + 1).is_some_and(u8::is_ascii_whitespace);
        if terminator {
            from = i + 1;
            break;
        }
        if b == b'\n' && i > 0 && bytes[i - 1] == b'\n' {
            from = i + 1;
            break;
        }
    }

    let mut to = text.len();
    let mut j = end;
    while j < bytes.len() {
        let b = bytes[j];
        let terminator = matches!(b, b'.' | b'!' | b'?')
            && bytes.get(j + 1).is_none_or(u8::is_ascii_whitespace);
        if terminator {
            to = j + 1;
            break;
        }
        if b == b'\n' && bytes.get(j + 1) == Some(&b'\n') {
            to = j;
            break;
        }
        j += 1;
    }
    (from, to)
}
