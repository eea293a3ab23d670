//! Threadlens: answers questions from forum discussions.
//!
//! Question → forum search ([`threadlens_search`]) → prompt with numbered
//! sources → language model → reasoning steps, answer and validated
//! citations.
//!
//! # Architecture
//!
//! - **Config**: TOML-backed [`AppConfig`] bundling search and model settings
//! - **Prompt**: [`PromptBuilder`] renders bounded source excerpts and the
//!   reply delimiters
//! - **LLM**: the [`LanguageModel`] seam, with an OpenAI-compatible
//!   [`ChatCompletionsModel`]
//! - **Extraction**: [`extract_answer`] splits a reply into reasoning steps,
//!   answer and citations
//! - **Pipeline**: [`AnswerEngine`] composes the stages

pub mod config;
pub mod error;
pub mod extract;
pub mod llm;
pub mod pipeline;
pub mod prompt;

pub use config::{AppConfig, LlmConfig};
pub use error::{AppError, Result};
pub use extract::{Citation, ExtractedAnswer, ReasoningStep, SegmentSource, extract_answer};
pub use llm::{ChatCompletionsModel, LanguageModel};
pub use pipeline::{Answer, AnswerEngine};
pub use prompt::PromptBuilder;
