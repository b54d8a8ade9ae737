//! Text completion services for KPI insights

use std::future::Future;

use crate::analytics::InsightPrompt;
use crate::error::Result;

pub mod openai;

pub use openai::{ChatCompletionsClient, LlmSettings, DEFAULT_LLM_ENDPOINT};

/// Something that turns a prompt into narrative text
pub trait InsightService {
    /// Send the prompt, return the reply text verbatim
    ///
    /// No retries. Failures are `ServiceUnavailable`, rejected credentials
    /// are `AuthenticationFailed`.
    fn complete(&self, prompt: &InsightPrompt) -> impl Future<Output = Result<String>> + Send;
}
