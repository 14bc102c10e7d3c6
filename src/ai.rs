//! Chat completion client
//!
//! The AI collaborator behind the bot: prompt turns in, text out, may fail.
//! The OpenAI implementation carries a request timeout because the
//! completion call is the only unbounded external dependency; a timeout is
//! a normal failure the dispatcher logs and stays silent about.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::context::PromptTurn;
use crate::error::{BotError, Result};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Hard cap on one completion round trip.
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(30);

/// Black-box chat completion. Implemented by the OpenAI client in
/// production and by canned fakes in tests.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, turns: &[PromptTurn]) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
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

/// OpenAI chat-completion client.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(COMPLETION_TIMEOUT)
            .build()
            .map_err(|e| BotError::Ai(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, turns: &[PromptTurn]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: turns
                .iter()
                .map(|t| WireMessage {
                    role: &t.role,
                    content: &t.content,
                })
                .collect(),
        };

        debug!(
            "Chat completion: model={}, turns={}",
            self.model,
            turns.len()
        );

        let response = self
            .client
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| BotError::Ai(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Ai(format!("status {}: {}", status, body)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| BotError::Ai(format!("malformed response: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(content)
    }
}
