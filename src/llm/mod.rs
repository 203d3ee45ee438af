//! LLM provider chain: Gemini first, then a round-robin Groq pool.
//!
//! Fallback order (the only scheduling there is):
//!   Gemini -> quota error? -> Groq pool (rotating, one pass) -> give up.
//! A non-quota Gemini failure gets a fixed backoff and one retry before the
//! pool is consulted. The successful reply records which provider answered.

pub mod gemini;
pub mod groq;

use std::time::Duration;

use crate::config::ServerConfig;
use crate::errors::AppError;
use crate::metrics;

pub use gemini::GeminiClient;
pub use groq::GroqPool;

/// Which provider produced a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    Groq,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "Gemini",
            Provider::Groq => "Groq",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successful LLM reply
#[derive(Debug, Clone)]
pub struct AiReply {
    pub text: String,
    pub provider: Provider,
}

/// Error from a single provider call
#[derive(Debug)]
pub enum AiCallError {
    /// Free-tier quota exhausted (HTTP 429 / RESOURCE_EXHAUSTED)
    Quota(String),
    /// Any other transport or API failure
    Failed(String),
}

impl AiCallError {
    pub fn is_quota(&self) -> bool {
        matches!(self, AiCallError::Quota(_))
    }

    pub fn detail(&self) -> &str {
        match self {
            AiCallError::Quota(msg) | AiCallError::Failed(msg) => msg,
        }
    }
}

impl std::fmt::Display for AiCallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiCallError::Quota(msg) => write!(f, "quota exhausted: {msg}"),
            AiCallError::Failed(msg) => write!(f, "call failed: {msg}"),
        }
    }
}

/// Classify a provider response as a quota error.
///
/// Gemini reports free-tier exhaustion as HTTP 429 with RESOURCE_EXHAUSTED
/// in the body; Groq as plain 429.
pub fn is_quota_error(status: Option<u16>, body: &str) -> bool {
    if status == Some(429) {
        return true;
    }
    body.contains("RESOURCE_EXHAUSTED") || body.to_lowercase().contains("quota")
}

/// The provider-fallback chain
pub struct AiService {
    gemini: Option<GeminiClient>,
    groq: GroqPool,
    retries: u32,
    retry_backoff: Duration,
}

impl AiService {
    pub fn from_config(config: &ServerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .unwrap_or_default();

        let gemini = config
            .gemini_api_key
            .as_ref()
            .map(|key| GeminiClient::new(client.clone(), key, &config.gemini_model));

        let groq = GroqPool::new(client, config.groq_api_keys.clone(), &config.groq_model);

        if gemini.is_none() && groq.is_empty() {
            tracing::warn!("no LLM provider configured; assistant endpoints will return 503");
        }

        Self {
            gemini,
            groq,
            retries: config.ai_retries,
            retry_backoff: Duration::from_secs(config.ai_retry_backoff_secs),
        }
    }

    /// Run the chain for one prompt.
    ///
    /// Errors map directly to HTTP statuses upstream: `QuotaExceeded` when
    /// every reachable provider was saturated, `AiProviderFailed` otherwise.
    pub async fn generate(&self, prompt: &str) -> Result<AiReply, AppError> {
        let mut retries = self.retries;

        let gemini = match &self.gemini {
            Some(g) => g,
            None => return self.groq_fallback(prompt, false).await,
        };

        loop {
            match gemini.generate(prompt).await {
                Ok(text) => {
                    metrics::AI_CALLS_TOTAL
                        .with_label_values(&["gemini", "ok"])
                        .inc();
                    return Ok(AiReply {
                        text,
                        provider: Provider::Gemini,
                    });
                }
                Err(err) => {
                    let quota = err.is_quota();
                    metrics::AI_CALLS_TOTAL
                        .with_label_values(&["gemini", if quota { "quota" } else { "error" }])
                        .inc();
                    tracing::warn!("Gemini call failed: {}", err);

                    if quota || retries == 0 {
                        return self.groq_fallback(prompt, quota).await;
                    }

                    retries -= 1;
                    tracing::info!("retrying Gemini ({} attempt(s) left)", retries + 1);
                    tokio::time::sleep(self.retry_backoff).await;
                }
            }
        }
    }

    /// One rotating pass over the Groq pool. `gemini_quota` preserves the
    /// quota signal when the pool itself is empty.
    async fn groq_fallback(&self, prompt: &str, gemini_quota: bool) -> Result<AiReply, AppError> {
        if self.groq.is_empty() {
            if gemini_quota {
                return Err(AppError::QuotaExceeded(
                    "Gemini saturado y sin pool de respaldo".to_string(),
                ));
            }
            return Err(AppError::AiProviderFailed);
        }

        tracing::warn!("falling back to the Groq pool");

        match self.groq.generate(prompt).await {
            Ok(text) => {
                metrics::AI_CALLS_TOTAL
                    .with_label_values(&["groq", "ok"])
                    .inc();
                Ok(AiReply {
                    text,
                    provider: Provider::Groq,
                })
            }
            Err(err) => {
                metrics::AI_CALLS_TOTAL
                    .with_label_values(&["groq", if err.is_quota() { "quota" } else { "error" }])
                    .inc();
                tracing::error!("all LLM providers failed: {}", err);
                if err.is_quota() {
                    Err(AppError::QuotaExceeded(err.detail().to_string()))
                } else {
                    Err(AppError::AiProviderFailed)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_quota_error() {
        assert!(is_quota_error(Some(429), ""));
        assert!(is_quota_error(None, "error: RESOURCE_EXHAUSTED for model"));
        assert!(is_quota_error(Some(400), "Quota exceeded for quota metric"));
        assert!(!is_quota_error(Some(500), "internal error"));
        assert!(!is_quota_error(None, "timeout"));
    }

    #[test]
    fn test_ai_call_error_classification() {
        assert!(AiCallError::Quota("429".into()).is_quota());
        assert!(!AiCallError::Failed("timeout".into()).is_quota());
    }

    #[tokio::test]
    async fn test_empty_chain_fails_unavailable() {
        let config = ServerConfig::default();
        let service = AiService::from_config(&config);
        let result = service.generate("hola").await;
        assert!(matches!(result, Err(AppError::AiProviderFailed)));
    }
}
