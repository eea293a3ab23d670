//! Question answering: search, prompt, model call, extraction.

use std::sync::Arc;

use threadlens_search::{SearchMode, SearchOrchestrator, SearchResult};
use tokio_util::sync::CancellationToken;
use tracing::{info, trace};

use crate::error::{AppError, Result};
use crate::extract::{ExtractedAnswer, extract_answer};
use crate::llm::LanguageModel;
use crate::prompt::PromptBuilder;

/// Answer given when the search came back empty; the model is not called.
pub const NO_RESULTS_ANSWER: &str = "No matching discussions were found for this question.";

/// The outcome of answering one question.
#[derive(Debug, Clone)]
pub struct Answer {
    pub query: String,
    /// Ranked results, in the order the prompt numbered them.
    pub results: Vec<SearchResult>,
    pub extracted: ExtractedAnswer,
}

/// Composes forum search with a language model.
pub struct AnswerEngine {
    search: Arc<SearchOrchestrator>,
    model: Arc<dyn LanguageModel>,
    prompt: PromptBuilder,
}

impl AnswerEngine {
    pub fn new(
        search: Arc<SearchOrchestrator>,
        model: Arc<dyn LanguageModel>,
        prompt: PromptBuilder,
    ) -> Self {
        Self {
            search,
            model,
            prompt,
        }
    }

    /// The underlying search orchestrator.
    pub fn search(&self) -> &Arc<SearchOrchestrator> {
        &self.search
    }

    /// Search for `query`, ask the model about the results and extract the reply.
    ///
    /// Only the results rendered into the prompt are citable and returned.
    ///
    /// # Errors
    ///
    /// Search errors pass through unchanged. Model failures surface as
    /// [`AppError::Model`]. Cancelling `cancel` aborts either stage; a
    /// cancelled model stage surfaces as [`AppError::Timeout`].
    pub async fn answer(
        &self,
        query: &str,
        mode: SearchMode,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Answer> {
        let mut results = self.search.search(query, mode, limit, cancel).await?;
        if results.is_empty() {
            info!("no results, skipping model call");
            return Ok(Answer {
                query: query.to_string(),
                results,
                extracted: ExtractedAnswer::plain(NO_RESULTS_ANSWER),
            });
        }
        results.truncate(self.prompt.rendered_count(&results));

        let system = self.prompt.system_prompt();
        let user = self.prompt.user_prompt(query, &results);
        trace!(prompt = %user, "rendered prompt");

        if cancel.is_cancelled() {
            return Err(AppError::Timeout("cancelled before the model call".into()));
        }
        let reply = self.model.complete(&system, &user, cancel).await?;
        let extracted = extract_answer(&reply, &results);
        info!(
            model = self.model.name(),
            results = results.len(),
            steps = extracted.steps.len(),
            citations = extracted.citations.len(),
            "answer ready"
        );
        Ok(Answer {
            query: query.to_string(),
            results,
            extracted,
        })
    }
}
