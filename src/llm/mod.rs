mod openai;
mod prompt;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::{FinancialMetrics, ForecastLedger};

pub use openai::{CHAT_MODEL, OpenAiClient};
pub use prompt::{SYSTEM_PROMPT, forecast_context, user_prompt};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("chat provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("chat provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid chat provider response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("OPENAI_API_KEY is not configured")]
    MissingApiKey,
}

/// A chat-completion backend: one system instruction, one user turn.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError>;
}

/// Sends the question with the forecast (and metrics) as context and returns
/// the provider's answer unmodified.
pub async fn ask(
    provider: &dyn ChatProvider,
    question: &str,
    ledger: &ForecastLedger,
    metrics: Option<&FinancialMetrics>,
) -> Result<String, ProviderError> {
    let prompt = user_prompt(question, ledger, metrics);
    provider.complete(SYSTEM_PROMPT, &prompt).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingProvider {
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ChatProvider for RecordingProvider {
        async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
            self.calls
                .lock()
                .expect("lock")
                .push((system.to_string(), user.to_string()));
            Ok("  answer with padding \n".to_string())
        }
    }

    #[tokio::test]
    async fn ask_relays_prompt_and_returns_answer_verbatim() {
        let provider = RecordingProvider::default();
        let ledger = ForecastLedger::seed();

        let answer = ask(&provider, "Which year peaks?", &ledger, None)
            .await
            .expect("answer");

        assert_eq!(answer, "  answer with padding \n");
        let calls = provider.calls.lock().expect("lock");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, SYSTEM_PROMPT);
        assert!(calls[0].1.ends_with("\n\nQuestion: Which year peaks?"));
        assert!(calls[0].1.contains("- Total Lots Sold: 537\n"));
    }
}
