//! OpenAI-compatible chat completions client
//!
//! Posts `{model, messages, temperature, max_tokens}` to
//! `{endpoint}/chat/completions` and returns the first choice's content.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::InsightService;
use crate::analytics::InsightPrompt;
use crate::error::{CoreError, Result};

/// Public OpenAI API base URL
pub const DEFAULT_LLM_ENDPOINT: &str = "https://api.openai.com/v1";

const SERVICE: &str = "LLM";

/// Generation parameters, fixed for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_LLM_ENDPOINT.to_string(),
            model: "gpt-4".to_string(),
            temperature: 0.7,
            max_tokens: 500,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

/// Chat completions client
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    api_key: String,
    settings: LlmSettings,
}

impl ChatCompletionsClient {
    pub fn new(api_key: impl Into<String>, settings: LlmSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| CoreError::unavailable(SERVICE, format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            settings,
        })
    }

    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }

    fn url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.endpoint.trim_end_matches('/')
        )
    }
}

fn build_request<'a>(settings: &'a LlmSettings, prompt: &'a InsightPrompt) -> ChatRequest<'a> {
    ChatRequest {
        model: &settings.model,
        messages: [
            ChatMessage {
                role: "system",
                content: &prompt.system,
            },
            ChatMessage {
                role: "user",
                content: &prompt.user,
            },
        ],
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
    }
}

/// Extract the first choice's text from a chat completions body
fn parse_completion(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| CoreError::unavailable(SERVICE, format!("Malformed completion body: {}", e)))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| CoreError::unavailable(SERVICE, "Completion returned no choices"))
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .map(|b| b.error.message)
        .filter(|m| !m.is_empty())
}

impl InsightService for ChatCompletionsClient {
    async fn complete(&self, prompt: &InsightPrompt) -> Result<String> {
        tracing::debug!(
            model = %self.settings.model,
            prompt_chars = prompt.user.len(),
            "Requesting insight completion"
        );

        let response = self
            .http
            .post(self.url())
            .bearer_auth(&self.api_key)
            .json(&build_request(&self.settings, prompt))
            .send()
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e.to_string()))?;

        if !status.is_success() {
            let message = error_message(&body).unwrap_or_else(|| status.to_string());
            return Err(match status.as_u16() {
                401 | 403 => CoreError::auth_failed(SERVICE, message),
                _ => CoreError::unavailable(SERVICE, format!("HTTP {}: {}", status, message)),
            });
        }

        parse_completion(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = LlmSettings::default();
        assert_eq!(settings.model, "gpt-4");
        assert_eq!(settings.temperature, 0.7);
        assert_eq!(settings.max_tokens, 500);
    }

    #[test]
    fn test_request_body() {
        let settings = LlmSettings::default();
        let prompt = InsightPrompt {
            system: "sys".to_string(),
            user: "question".to_string(),
        };
        let json = serde_json::to_value(build_request(&settings, &prompt)).unwrap();

        assert_eq!(json["model"], "gpt-4");
        assert_eq!(json["max_tokens"], 500);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "sys");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "question");
    }

    #[test]
    fn test_parse_completion_verbatim() {
        let body = r#"{
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "  1. Yes.\n2. No.  "}, "finish_reason": "stop"}
            ]
        }"#;
        assert_eq!(parse_completion(body).unwrap(), "  1. Yes.\n2. No.  ");
    }

    #[test]
    fn test_parse_completion_empty_choices() {
        let err = parse_completion(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, CoreError::ServiceUnavailable { .. }));
    }

    #[test]
    fn test_parse_completion_malformed() {
        let err = parse_completion("upstream timeout").unwrap_err();
        assert!(err.to_string().starts_with("LLM unavailable"));
    }

    #[test]
    fn test_url_and_error_message() {
        let client = ChatCompletionsClient::new(
            "key",
            LlmSettings {
                endpoint: "http://localhost:8080/v1/".to_string(),
                ..LlmSettings::default()
            },
        )
        .unwrap();
        assert_eq!(client.url(), "http://localhost:8080/v1/chat/completions");

        let body = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#;
        assert_eq!(error_message(body).as_deref(), Some("Incorrect API key provided"));
    }
}
