//! Structured extraction from a model reply.
//!
//! A reply is split into reasoning and answer ([`segments`]), the
//! reasoning is broken into titled steps ([`steps`]) and the answer's `[n]`
//! markers are resolved against the results the prompt listed
//! ([`citations`]). Extraction never fails; malformed replies degrade to
//! fallback splits and fewer steps or citations.

pub mod citations;
pub mod segments;
pub mod steps;

use std::fmt::Write as _;

use threadlens_search::SearchResult;
use tracing::debug;

pub use citations::{Citation, extract_citations};
pub use segments::{SegmentSource, Segments, split_segments};
pub use steps::{ReasoningStep, decompose_steps};

/// A model reply broken into its parts.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedAnswer {
    pub reasoning: String,
    pub steps: Vec<ReasoningStep>,
    pub answer: String,
    pub citations: Vec<Citation>,
    pub segment_source: SegmentSource,
}

impl ExtractedAnswer {
    /// An answer that did not come from a model, with no reasoning or citations.
    pub fn plain(answer: impl Into<String>) -> Self {
        Self {
            reasoning: String::new(),
            steps: Vec::new(),
            answer: answer.into(),
            citations: Vec::new(),
            segment_source: SegmentSource::Delimited,
        }
    }

    /// Render the cited results as a numbered "Sources" list.
    ///
    /// Returns an empty string when nothing was cited.
    pub fn render_sources(&self) -> String {
        if self.citations.is_empty() {
            return String::new();
        }
        let mut out = String::from("Sources:\n");
        for citation in &self.citations {
            let title = if citation.title.is_empty() {
                citation.kind.name().to_string()
            } else {
                citation.title.clone()
            };
            let _ = write!(out, "[{}] {title}", citation.index);
            if !citation.community.is_empty() {
                let _ = write!(out, " (r/{})", citation.community);
            }
            let _ = writeln!(out, "\n    {}", citation.url);
        }
        out
    }
}

/// Split `model_text` into reasoning steps, answer and citations.
///
/// `results` must be the list the prompt numbered, in the same order, so
/// that `[n]` refers to `results[n - 1]`.
pub fn extract_answer(model_text: &str, results: &[SearchResult]) -> ExtractedAnswer {
    let Segments {
        reasoning,
        answer,
        source,
    } = split_segments(model_text);
    let steps = decompose_steps(&reasoning);
    let citations = extract_citations(&answer, results);
    debug!(
        segment_source = ?source,
        steps = steps.len(),
        citations = citations.len(),
        "extracted model reply"
    );
    ExtractedAnswer {
        reasoning,
        steps,
        answer,
        citations,
        segment_source: source,
    }
}
