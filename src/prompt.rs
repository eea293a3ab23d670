//! Model prompt rendering.
//!
//! The prompt numbers each ranked result so the model can cite it as
//! `[n]`, and asks for the reply to be split by the delimiters below. The
//! extractor in [`crate::extract`] understands the same delimiters.

use std::fmt::Write as _;

use threadlens_search::SearchResult;
use threadlens_search::highlight::truncate_at_word;

/// Opens the reasoning segment of a reply.
pub const REASONING_BEGIN: &str = "<reasoning>";
/// Closes the reasoning segment of a reply.
pub const REASONING_END: &str = "</reasoning>";
/// Opens the answer segment of a reply.
pub const ANSWER_BEGIN: &str = "<answer>";
/// Closes the answer segment of a reply.
pub const ANSWER_END: &str = "</answer>";

/// Renders system and user prompts for a question and its ranked results.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    max_results: usize,
    max_excerpt_chars: usize,
}

impl PromptBuilder {
    /// Create a builder rendering at most `max_results` results, each excerpt
    /// bounded to `max_excerpt_chars` characters.
    pub fn new(max_results: usize, max_excerpt_chars: usize) -> Self {
        Self {
            max_results: max_results.max(1),
            max_excerpt_chars: max_excerpt_chars.max(1),
        }
    }

    /// Number of results that will be rendered, and thus citable.
    pub fn rendered_count(&self, results: &[SearchResult]) -> usize {
        results.len().min(self.max_results)
    }

    /// Formatting instructions for the model.
    pub fn system_prompt(&self) -> String {
        format!(
            "You answer questions using forum discussions supplied by the user.\n\
             Think through the sources first, inside {REASONING_BEGIN} and {REASONING_END}, \
             as numbered steps written as \"Step 1: <title>\" lines followed by the step's text.\n\
             Then give the final answer inside {ANSWER_BEGIN} and {ANSWER_END}.\n\
             Cite sources in the answer with their bracketed numbers, for example [1] or [2][3].\n\
             Only cite numbers that appear in the source list. If the sources do not answer \
             the question, say so."
        )
    }

    /// The question followed by numbered source excerpts.
    pub fn user_prompt(&self, query: &str, results: &[SearchResult]) -> String {
        let mut out = format!("Question: {}\n\n", query.trim());
        if results.is_empty() {
            out.push_str("No sources were found.\n");
            return out;
        }
        out.push_str("Sources:\n");
        for (index, result) in results.iter().take(self.max_results).enumerate() {
            let _ = write!(out, "\n[{}] {}", index + 1, self.heading(result));
            let _ = write!(out, "\nURL: {}", result.url);
            let excerpt = self.excerpt(result);
            if !excerpt.is_empty() {
                let _ = write!(out, "\nExcerpt: {excerpt}");
            }
            out.push('\n');
        }
        out
    }

    fn heading(&self, result: &SearchResult) -> String {
        let mut heading = format!("({}", result.kind);
        if !result.community.is_empty() {
            let _ = write!(heading, " in r/{}", result.community);
        }
        if !result.author.is_empty() {
            let _ = write!(heading, " by u/{}", result.author);
        }
        let _ = write!(heading, ", score {}", result.score);
        heading.push(')');
        if !result.title.is_empty() {
            let _ = write!(heading, " {}", result.title.trim());
        }
        heading
    }

    // Highlights carry the query-relevant sentences; fall back to the body.
    fn excerpt(&self, result: &SearchResult) -> String {
        let source = if result.highlights.is_empty() {
            result.content.split_whitespace().collect::<Vec<_>>().join(" ")
        } else {
            result.highlights.join(" ")
        };
        truncate_at_word(source.trim(), self.max_excerpt_chars)
    }
}
