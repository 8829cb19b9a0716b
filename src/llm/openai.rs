use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatProvider, ProviderError};
use crate::config::ProviderConfig;

pub const CHAT_MODEL: &str = "gpt-4";

const TEMPERATURE: f64 = 0.7;
const MAX_TOKENS: u32 = 500;
const NO_RESPONSE: &str = "No response generated";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client.
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

fn build_request<'a>(system: &'a str, user: &'a str) -> ChatCompletionRequest<'a> {
    ChatCompletionRequest {
        model: CHAT_MODEL,
        messages: [
            ChatMessage {
                role: "system",
                content: system,
            },
            ChatMessage {
                role: "user",
                content: user,
            },
        ],
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
    }
}

fn answer_from_body(body: &str) -> Result<String, ProviderError> {
    let response: ChatCompletionResponse = serde_json::from_str(body)?;
    Ok(response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_else(|| NO_RESPONSE.to_string()))
}

#[async_trait]
impl ChatProvider for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or(ProviderError::MissingApiKey)?;

        tracing::debug!(model = CHAT_MODEL, prompt_len = user.len(), "sending chat completion");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&build_request(system, user))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        answer_from_body(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn request_carries_fixed_model_and_both_turns() {
        let json = serde_json::to_value(build_request("sys", "question"))
            .expect("request should serialize");

        assert_eq!(json["model"], "gpt-4");
        assert_eq!(json["max_tokens"], 500);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "sys");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "question");
    }

    #[test]
    fn answer_is_first_choice_content() {
        let body = r#"{"id":"x","choices":[
            {"index":0,"message":{"role":"assistant","content":"Year 7 peaks."}},
            {"index":1,"message":{"role":"assistant","content":"ignored"}}
        ]}"#;

        assert_eq!(answer_from_body(body).expect("answer"), "Year 7 peaks.");
    }

    #[test]
    fn empty_choices_yield_placeholder() {
        assert_eq!(
            answer_from_body(r#"{"choices":[]}"#).expect("answer"),
            "No response generated"
        );
        assert_eq!(
            answer_from_body(r#"{"choices":[{"message":{"content":null}}]}"#).expect("answer"),
            "No response generated"
        );
    }

    #[test]
    fn undecodable_body_is_decode_error() {
        let err = answer_from_body("<html>bad gateway</html>").expect_err("must fail");
        assert!(matches!(err, ProviderError::Decode(_)));
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_request() {
        let client = OpenAiClient::new(&ProviderConfig {
            api_key: None,
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(1),
        })
        .expect("client");

        let err = client.complete("sys", "user").await.expect_err("must fail");
        assert!(matches!(err, ProviderError::MissingApiKey));
    }
}
