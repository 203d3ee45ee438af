//! Groq fallback pool (OpenAI-compatible chat completions).
//!
//! Several free-tier keys form a pool; calls rotate through it starting at a
//! shared cursor so saturation on one account spreads load to the next. A
//! 429 rotates onward; any other failure aborts the pass.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::AiCallError;

const DEFAULT_ENDPOINT: &str = "https://api.groq.com/openai/v1";

/// OpenAI-compatible chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// OpenAI-compatible chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

/// Round-robin pool of Groq API keys
pub struct GroqPool {
    client: reqwest::Client,
    endpoint: String,
    keys: Vec<String>,
    model: String,
    cursor: AtomicUsize,
}

impl GroqPool {
    pub fn new(client: reqwest::Client, keys: Vec<String>, model: &str) -> Self {
        Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            keys,
            model: model.to_string(),
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Index of the key the next pass will start at
    fn next_start(&self) -> usize {
        self.cursor.fetch_add(1, Ordering::Relaxed) % self.keys.len()
    }

    /// One pass over the pool: try each key once starting at the rotating
    /// cursor; a saturated key (429) rotates onward, anything else aborts.
    pub async fn generate(&self, prompt: &str) -> Result<String, AiCallError> {
        if self.keys.is_empty() {
            return Err(AiCallError::Failed("Groq pool is empty".to_string()));
        }

        let start = self.next_start();
        let mut last_quota = String::new();

        for offset in 0..self.keys.len() {
            let index = (start + offset) % self.keys.len();
            let cuenta = index + 1;

            match self.call_key(&self.keys[index], prompt).await {
                Ok(text) => return Ok(text),
                Err(AiCallError::Quota(msg)) => {
                    tracing::warn!("Groq account {} saturated, rotating...", cuenta);
                    last_quota = msg;
                    continue;
                }
                Err(err) => return Err(err),
            }
        }

        Err(AiCallError::Quota(if last_quota.is_empty() {
            "all Groq accounts saturated".to_string()
        } else {
            last_quota
        }))
    }

    async fn call_key(&self, key: &str, prompt: &str) -> Result<String, AiCallError> {
        let url = format!("{}/chat/completions", self.endpoint);

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AiCallError::Failed(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AiCallError::Quota(format!("Groq {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiCallError::Failed(format!("Groq {status}: {body}")));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AiCallError::Failed(format!("failed to parse response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AiCallError::Failed("empty Groq response".to_string()))
    }
}
