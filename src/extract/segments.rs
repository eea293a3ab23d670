//! Reasoning/answer segmentation of a model reply.

use tracing::debug;

use crate::prompt::{ANSWER_BEGIN, ANSWER_END, REASONING_BEGIN, REASONING_END};

/// How a reply was split into its two segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentSource {
    /// At least one delimiter pair was present.
    Delimited,
    /// Split at the paragraph break nearest the middle.
    ParagraphFallback,
    /// Split at the whitespace (or character) nearest the middle.
    Bisected,
}

/// The two segments of a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segments {
    /// Text the model used to work towards the answer.
    pub reasoning: String,
    /// The final answer.
    pub answer: String,
    /// Which rule produced the split.
    pub source: SegmentSource,
}

/// A delimited block located in the reply, as byte offsets.
#[derive(Debug, Clone, Copy)]
struct Block {
    open: usize,
    inner_start: usize,
    inner_end: usize,
    close: usize,
}

/// Split a model reply into reasoning and answer. Never fails.
///
/// Delimited segments come back as their trimmed inner text. A missing
/// close delimiter extends the block to the end of the reply, except that
/// an unclosed reasoning block ends where the answer block opens. When only
/// one block is delimited, the other segment is the text on the far side
/// of it. Undelimited replies are split at the paragraph break closest to
/// the middle, else at the middle itself; both halves are non-empty
/// whenever the reply has at least two non-whitespace characters.
pub fn split_segments(text: &str) -> Segments {
    let lower = text.to_ascii_lowercase();
    let reasoning = locate(text, &lower, REASONING_BEGIN, REASONING_END);
    let answer = locate(text, &lower, ANSWER_BEGIN, ANSWER_END);

    let delimited = |reasoning: &str, answer: &str| Segments {
        reasoning: strip_markers(reasoning),
        answer: strip_markers(answer),
        source: SegmentSource::Delimited,
    };

    match (reasoning, answer) {
        (Some(r), Some(a)) => {
            // An unclosed reasoning block stops where the answer opens.
            let reasoning_end = if r.close == text.len() && a.open >= r.inner_start {
                r.inner_end.min(a.open)
            } else {
                r.inner_end
            };
            delimited(
                &text[r.inner_start..reasoning_end],
                &text[a.inner_start..a.inner_end],
            )
        }
        (None, Some(a)) => delimited(&text[..a.open], &text[a.inner_start..a.inner_end]),
        (Some(r), None) => delimited(&text[r.inner_start..r.inner_end], &text[r.close..]),
        (None, None) => fallback(text),
    }
}

fn locate(text: &str, lower: &str, begin: &str, end: &str) -> Option<Block> {
    let open = lower.find(begin)?;
    let inner_start = open + begin.len();
    let (inner_end, close) = match lower[inner_start..].find(end) {
        Some(offset) => (inner_start + offset, inner_start + offset + end.len()),
        None => (text.len(), text.len()),
    };
    Some(Block {
        open,
        inner_start,
        inner_end,
        close,
    })
}

// Stray delimiters left in a segment are dropped, matched case-insensitively.
fn strip_markers(segment: &str) -> String {
    const MARKERS: [&str; 4] = [REASONING_BEGIN, REASONING_END, ANSWER_BEGIN, ANSWER_END];
    let lower = segment.to_ascii_lowercase();
    let mut out = String::with_capacity(segment.len());
    let mut i = 0;
    while i < segment.len() {
        if let Some(marker) = MARKERS.iter().find(|m| lower[i..].starts_with(*m)) {
            i += marker.len();
            continue;
        }
        let ch = segment[i..].chars().next().map_or(1, char::len_utf8);
        out.push_str(&segment[i..i + ch]);
        i += ch;
    }
    out.trim().to_string()
}

fn fallback(text: &str) -> Segments {
    let text = text.trim();
    if let Some((reasoning, answer)) = split_at_paragraph(text) {
        debug!(
            reasoning_chars = reasoning.len(),
            answer_chars = answer.len(),
            "reply had no delimiters, split at paragraph break"
        );
        return Segments {
            reasoning,
            answer,
            source: SegmentSource::ParagraphFallback,
        };
    }
    let (reasoning, answer) = bisect(text);
    debug!(
        reasoning_chars = reasoning.len(),
        answer_chars = answer.len(),
        "reply had no delimiters or paragraph breaks, bisected"
    );
    Segments {
        reasoning,
        answer,
        source: SegmentSource::Bisected,
    }
}

/// Byte ranges of blank-line separators: a newline, optional horizontal
/// whitespace, another newline, plus any whitespace after it.
pub(crate) fn paragraph_breaks(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut breaks = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\n' {
            let mut j = i + 1;
            while j < bytes.len() && matches!(bytes[j], b' ' | b'\t' | b'\r') {
                j += 1;
            }
            if j < bytes.len() && bytes[j] == b'\n' {
                let mut k = j + 1;
                while k < bytes.len() && bytes[k].is_ascii_whitespace() {
                    k += 1;
                }
                breaks.push((i, k));
                i = k;
                continue;
            }
        }
        i += 1;
    }
    breaks
}

fn split_at_paragraph(text: &str) -> Option<(String, String)> {
    let middle = text.len() / 2;
    paragraph_breaks(text)
        .into_iter()
        .filter(|&(start, end)| !text[..start].trim().is_empty() && !text[end..].trim().is_empty())
        .min_by_key(|&(start, end)| ((start + end) / 2).abs_diff(middle))
        .map(|(start, end)| (text[..start].trim().to_string(), text[end..].trim().to_string()))
}

fn bisect(text: &str) -> (String, String) {
    let chars = text.chars().count();
    if chars < 2 {
        return (String::new(), text.to_string());
    }
    let middle = text
        .char_indices()
        .nth(chars / 2)
        .map_or(text.len(), |(index, _)| index);

    let nearest_space = text
        .char_indices()
        .filter(|(_, c)| c.is_whitespace())
        .map(|(index, _)| index)
        .min_by_key(|index| index.abs_diff(middle));

    match nearest_space {
        Some(space) => (
            text[..space].trim_end().to_string(),
            text[space..].trim_start().to_string(),
        ),
        None => (text[..middle].to_string(), text[middle..].to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn squash(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn delimited_segments_return_trimmed_inner_text() {
        let reply = "<reasoning>\n  Step 1: look  \n</reasoning>\n<answer> Use tokio [1]. </answer>";
        let segments = split_segments(reply);
        assert_eq!(segments.source, SegmentSource::Delimited);
        assert_eq!(segments.reasoning, "Step 1: look");
        assert_eq!(segments.answer, "Use tokio [1].");
    }

    #[test]
    fn delimiters_match_case_insensitively() {
        let segments = split_segments("<REASONING>why</REASONING><Answer>what</Answer>");
        assert_eq!(segments.reasoning, "why");
        assert_eq!(segments.answer, "what");
    }

    #[test]
    fn answer_only_takes_preceding_text_as_reasoning() {
        let segments = split_segments("Thinking out loud.\n<answer>The answer.</answer>");
        assert_eq!(segments.source, SegmentSource::Delimited);
        assert_eq!(segments.reasoning, "Thinking out loud.");
        assert_eq!(segments.answer, "The answer.");
    }

    #[test]
    fn reasoning_only_takes_following_text_as_answer() {
        let segments = split_segments("<reasoning>Because.</reasoning>\nSo, yes.");
        assert_eq!(segments.reasoning, "Because.");
        assert_eq!(segments.answer, "So, yes.");
    }

    #[test]
    fn unclosed_reasoning_stops_at_answer() {
        let segments = split_segments("<reasoning>Thread [1] says X.\n<answer>Use X [1].</answer>");
        assert_eq!(segments.source, SegmentSource::Delimited);
        assert_eq!(segments.reasoning, "Thread [1] says X.");
        assert_eq!(segments.answer, "Use X [1].");
    }

    #[test]
    fn stray_markers_are_stripped_in_any_case() {
        let segments = split_segments("Thinking.</REASONING>\n<Answer>Done.</answer>");
        assert_eq!(segments.reasoning, "Thinking.");
        assert_eq!(segments.answer, "Done.");

        let segments = split_segments("<reasoning>why</reasoning><answer>what <ANSWER>now</answer>");
        assert_eq!(segments.answer, "what now");
    }

    #[test]
    fn unterminated_answer_runs_to_end() {
        let segments = split_segments("<reasoning>r</reasoning><answer>cut off mid");
        assert_eq!(segments.answer, "cut off mid");
    }

    #[test]
    fn paragraph_fallback_picks_break_nearest_middle() {
        let reply = "Short intro.\n\nA middle paragraph that is fairly long indeed.\n\nEnd.";
        let segments = split_segments(reply);
        assert_eq!(segments.source, SegmentSource::ParagraphFallback);
        assert_eq!(segments.reasoning, "Short intro.");
        assert_eq!(
            segments.answer,
            "A middle paragraph that is fairly long indeed.\n\nEnd."
        );
    }

    #[test]
    fn undelimited_single_paragraph_bisects_into_non_empty_halves() {
        let reply = "The community mostly recommends the official book and then rustlings.";
        let segments = split_segments(reply);
        assert_eq!(segments.source, SegmentSource::Bisected);
        assert!(!segments.reasoning.is_empty());
        assert!(!segments.answer.is_empty());
        assert_eq!(
            squash(&format!("{}{}", segments.reasoning, segments.answer)),
            squash(reply)
        );
    }

    #[test]
    fn bisect_without_whitespace_splits_characters() {
        let segments = split_segments("abcdef");
        assert_eq!(segments.reasoning, "abc");
        assert_eq!(segments.answer, "def");
    }

    #[test]
    fn empty_reply_gives_empty_segments() {
        let segments = split_segments("   ");
        assert!(segments.reasoning.is_empty());
        assert!(segments.answer.is_empty());
    }

    #[test]
    fn paragraph_breaks_tolerate_carriage_returns() {
        let breaks = paragraph_breaks("a\r\n\r\nb");
        assert_eq!(breaks.len(), 1);
    }
}
