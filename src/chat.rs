//! Client side of the assistant panel: conversation history and tolerant
//! decoding of the `/api/chat` reply.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{ForecastLedger, MetricsDisplay};

pub const ERROR_REPLY: &str =
    "Sorry, I encountered an error while processing your request. Please try again.";
const FAILED_REPLY: &str = "Failed to get response from AI";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// A chat reply normalised across the backend's response shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatReply {
    Answer {
        message: String,
        metrics: Option<MetricsDisplay>,
    },
    Failure {
        message: String,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireReply {
    Tagged {
        status: String,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        metrics: Option<Value>,
    },
    Bare {
        response: String,
        #[serde(default)]
        metrics: Option<Value>,
    },
    Error {
        error: String,
    },
    Detail {
        detail: String,
    },
}

fn display_metrics(value: Option<Value>) -> Option<MetricsDisplay> {
    value.and_then(|value| serde_json::from_value(value).ok())
}

impl ChatReply {
    /// Decodes a reply body. Accepts `{status, message, metrics?}`,
    /// `{response, metrics?}`, `{error}` and `{detail}`.
    pub fn from_http(status: u16, body: &str) -> ChatReply {
        let success = (200..300).contains(&status);
        let wire = match serde_json::from_str::<WireReply>(body) {
            Ok(wire) => wire,
            Err(_) if success => {
                return ChatReply::Failure {
                    message: FAILED_REPLY.to_string(),
                };
            }
            Err(_) => {
                return ChatReply::Failure {
                    message: format!("Error: {status}"),
                };
            }
        };

        match wire {
            WireReply::Tagged {
                status: tag,
                message: Some(message),
                metrics,
            } if success && tag == "success" => ChatReply::Answer {
                message,
                metrics: display_metrics(metrics),
            },
            WireReply::Bare { response, metrics } if success => ChatReply::Answer {
                message: response,
                metrics: display_metrics(metrics),
            },
            WireReply::Tagged {
                message: Some(message),
                ..
            }
            | WireReply::Error { error: message }
            | WireReply::Detail { detail: message } => ChatReply::Failure { message },
            WireReply::Tagged { message: None, .. } | WireReply::Bare { .. } => {
                ChatReply::Failure {
                    message: if success {
                        FAILED_REPLY.to_string()
                    } else {
                        format!("Error: {status}")
                    },
                }
            }
        }
    }
}

/// Conversation history. One question may be in flight at a time; failures
/// add a stock apology to the history and keep the error text aside.
#[derive(Debug, Default)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    pending: bool,
    last_error: Option<String>,
    last_metrics: Option<MetricsDisplay>,
}

impl ChatSession {
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn last_metrics(&self) -> Option<&MetricsDisplay> {
        self.last_metrics.as_ref()
    }

    /// Records the question and marks the session busy. Returns `false` for
    /// blank input or while another question is pending.
    pub fn begin(&mut self, question: &str) -> bool {
        if self.pending || question.trim().is_empty() {
            return false;
        }
        self.last_error = None;
        self.messages.push(ChatMessage {
            role: Role::User,
            content: question.to_string(),
        });
        self.pending = true;
        true
    }

    pub fn finish(&mut self, reply: ChatReply) {
        self.pending = false;
        match reply {
            ChatReply::Answer { message, metrics } => {
                self.messages.push(ChatMessage {
                    role: Role::Assistant,
                    content: message,
                });
                if metrics.is_some() {
                    self.last_metrics = metrics;
                }
            }
            ChatReply::Failure { message } => {
                self.last_error = Some(message);
                self.messages.push(ChatMessage {
                    role: Role::Assistant,
                    content: ERROR_REPLY.to_string(),
                });
            }
        }
    }
}

/// Posts one question with the ledger to a running service.
pub async fn send_question(
    client: &reqwest::Client,
    server: &str,
    question: &str,
    ledger: &ForecastLedger,
) -> ChatReply {
    let url = format!("{}/api/chat", server.trim_end_matches('/'));
    let body = serde_json::json!({ "message": question, "context": ledger });

    let response = match client.post(&url).json(&body).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, %url, "chat request failed");
            return ChatReply::Failure {
                message: e.to_string(),
            };
        }
    };

    let status = response.status().as_u16();
    match response.text().await {
        Ok(text) => ChatReply::from_http(status, &text),
        Err(e) => ChatReply::Failure {
            message: e.to_string(),
        },
    }
}
