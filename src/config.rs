//! Configuration management for Jornada
//!
//! All configurable parameters in one place with environment variable
//! overrides. Sensible defaults for development, explicit settings required
//! in production.

use std::env;
use std::path::PathBuf;
use tracing::info;

/// CORS configuration
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Allowed origins (empty = allow all)
    pub allowed_origins: Vec<String>,
    /// Allowed HTTP methods
    pub allowed_methods: Vec<String>,
    /// Allowed headers
    pub allowed_headers: Vec<String>,
    /// Whether to allow credentials (the frontend sends the token cookie)
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_methods: vec![
                "GET".to_string(),
                "POST".to_string(),
                "DELETE".to_string(),
                "OPTIONS".to_string(),
            ],
            allowed_headers: vec![
                "Content-Type".to_string(),
                "Authorization".to_string(),
                "Cookie".to_string(),
            ],
            allow_credentials: false,
        }
    }
}

impl CorsConfig {
    /// Load from environment variables with production safety checks
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(origins) = env::var("JORNADA_CORS_ORIGINS") {
            config.allowed_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(val) = env::var("JORNADA_CORS_CREDENTIALS") {
            config.allow_credentials = val.to_lowercase() == "true" || val == "1";
        }

        let is_production = is_production_env();
        if is_production && config.allowed_origins.is_empty() {
            tracing::warn!(
                "PRODUCTION WARNING: CORS allows all origins. Set JORNADA_CORS_ORIGINS."
            );
        }

        config
    }

    /// Check if any origin restrictions are configured
    pub fn is_restricted(&self) -> bool {
        !self.allowed_origins.is_empty()
    }

    /// Convert to tower-http CorsLayer
    pub fn to_layer(&self) -> tower_http::cors::CorsLayer {
        use tower_http::cors::{AllowOrigin, Any, CorsLayer};

        let mut layer = CorsLayer::new();

        if self.allowed_origins.is_empty() {
            layer = layer.allow_origin(Any);
        } else {
            let mut valid_origins = Vec::new();
            for origin_str in &self.allowed_origins {
                match origin_str.parse::<axum::http::HeaderValue>() {
                    Ok(origin) => valid_origins.push(origin),
                    Err(_) => tracing::warn!("CORS: invalid origin '{}' - skipping", origin_str),
                }
            }

            if valid_origins.is_empty() {
                // All configured origins failed to parse - reject all rather
                // than falling back to permissive.
                tracing::error!(
                    "CORS: all configured origins failed to parse, rejecting cross-origin requests"
                );
                layer = layer.allow_origin(AllowOrigin::list(Vec::<axum::http::HeaderValue>::new()));
            } else {
                layer = layer.allow_origin(AllowOrigin::list(valid_origins));
            }
        }

        let methods: Vec<axum::http::Method> = self
            .allowed_methods
            .iter()
            .filter_map(|m| m.parse().ok())
            .collect();
        if methods.is_empty() {
            layer = layer.allow_methods(Any);
        } else {
            layer = layer.allow_methods(methods);
        }

        let headers: Vec<axum::http::HeaderName> = self
            .allowed_headers
            .iter()
            .filter_map(|h| h.parse().ok())
            .collect();
        if headers.is_empty() {
            layer = layer.allow_headers(Any);
        } else {
            layer = layer.allow_headers(headers);
        }

        if self.allow_credentials {
            layer = layer.allow_credentials(true);
        }

        layer
    }
}

fn is_production_env() -> bool {
    env::var("JORNADA_ENV")
        .map(|v| {
            let v = v.to_lowercase();
            v == "production" || v == "prod"
        })
        .unwrap_or(false)
}

/// Server configuration loaded from environment with defaults
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host address (default: 127.0.0.1)
    pub host: String,

    /// Server port (default: 4000)
    pub port: u16,

    /// Storage path for RocksDB (default: ./jornada_data)
    pub storage_path: PathBuf,

    /// Base URL of the external task-tracker API
    pub tracker_base_url: String,

    /// Gemini API key (primary LLM provider; empty = skip straight to Groq)
    pub gemini_api_key: Option<String>,

    /// Gemini model name
    pub gemini_model: String,

    /// Groq API keys forming the fallback pool (comma-separated env var)
    pub groq_api_keys: Vec<String>,

    /// Groq model name
    pub groq_model: String,

    /// Gemini retries before falling back (default: 1)
    pub ai_retries: u32,

    /// Backoff between Gemini retries, in seconds (default: 2)
    pub ai_retry_backoff_secs: u64,

    /// Rate limit: requests per second (default: 50)
    pub rate_limit_per_second: u64,

    /// Rate limit: burst size (default: 100)
    pub rate_limit_burst: u32,

    /// Maximum concurrent requests (default: 200)
    pub max_concurrent_requests: usize,

    /// Outbound HTTP timeout in seconds (tracker + LLM, default: 30)
    pub http_timeout_secs: u64,

    /// Whether running in production mode
    pub is_production: bool,

    /// CORS configuration
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
            storage_path: PathBuf::from("./jornada_data"),
            tracker_base_url: "https://wlserver-production.up.railway.app/api".to_string(),
            gemini_api_key: None,
            gemini_model: "gemini-2.5-flash-lite".to_string(),
            groq_api_keys: Vec::new(),
            groq_model: "llama-3.1-8b-instant".to_string(),
            ai_retries: 1,
            ai_retry_backoff_secs: 2,
            rate_limit_per_second: 50,
            rate_limit_burst: 100,
            max_concurrent_requests: 200,
            http_timeout_secs: 30,
            is_production: false,
            cors: CorsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults
    #[allow(clippy::field_reassign_with_default)] // Environment overrides require mutable config
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.is_production = is_production_env();

        if let Ok(val) = env::var("JORNADA_HOST") {
            config.host = val;
        }

        if let Ok(val) = env::var("JORNADA_PORT") {
            if let Ok(port) = val.parse() {
                config.port = port;
            }
        }

        if let Ok(val) = env::var("JORNADA_DATA_PATH") {
            config.storage_path = PathBuf::from(val);
        }

        if let Ok(val) = env::var("JORNADA_TRACKER_URL") {
            config.tracker_base_url = val.trim_end_matches('/').to_string();
        }

        if let Ok(val) = env::var("GEMINI_API_KEY") {
            if !val.trim().is_empty() {
                config.gemini_api_key = Some(val);
            }
        }

        if let Ok(val) = env::var("JORNADA_GEMINI_MODEL") {
            config.gemini_model = val;
        }

        // Pool keys: GROQ_API_KEYS=key1,key2 (blank entries dropped)
        if let Ok(val) = env::var("GROQ_API_KEYS") {
            config.groq_api_keys = val
                .split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect();
        }

        if let Ok(val) = env::var("JORNADA_GROQ_MODEL") {
            config.groq_model = val;
        }

        if let Ok(val) = env::var("JORNADA_AI_RETRIES") {
            if let Ok(n) = val.parse() {
                config.ai_retries = n;
            }
        }

        if let Ok(val) = env::var("JORNADA_AI_RETRY_BACKOFF") {
            if let Ok(n) = val.parse() {
                config.ai_retry_backoff_secs = n;
            }
        }

        if let Ok(val) = env::var("JORNADA_RATE_LIMIT") {
            if let Ok(n) = val.parse() {
                config.rate_limit_per_second = n;
            }
        }

        if let Ok(val) = env::var("JORNADA_RATE_BURST") {
            if let Ok(n) = val.parse() {
                config.rate_limit_burst = n;
            }
        }

        if let Ok(val) = env::var("JORNADA_MAX_CONCURRENT") {
            if let Ok(n) = val.parse() {
                config.max_concurrent_requests = n;
            }
        }

        if let Ok(val) = env::var("JORNADA_HTTP_TIMEOUT") {
            if let Ok(n) = val.parse() {
                config.http_timeout_secs = n;
            }
        }

        config.cors = CorsConfig::from_env();

        config
    }

    /// Log the current configuration (keys are never logged)
    pub fn log(&self) {
        info!("Configuration:");
        info!(
            "   Mode: {}",
            if self.is_production {
                "PRODUCTION"
            } else {
                "Development"
            }
        );
        info!("   Listen: {}:{}", self.host, self.port);
        info!("   Storage: {:?}", self.storage_path);
        info!("   Tracker API: {}", self.tracker_base_url);
        info!(
            "   Gemini: {} ({})",
            if self.gemini_api_key.is_some() {
                "configured"
            } else {
                "not configured"
            },
            self.gemini_model
        );
        info!(
            "   Groq pool: {} key(s) ({})",
            self.groq_api_keys.len(),
            self.groq_model
        );
        info!(
            "   Rate limit: {} req/sec (burst: {})",
            self.rate_limit_per_second, self.rate_limit_burst
        );
        info!("   Max concurrent: {}", self.max_concurrent_requests);
        if self.cors.is_restricted() {
            info!("   CORS origins: {:?}", self.cors.allowed_origins);
        } else {
            info!("   CORS: permissive (all origins allowed)");
        }
    }
}

/// Environment variable documentation
#[allow(unused)] // Public API - available for CLI help output
pub fn print_env_help() {
    println!("Jornada configuration environment variables:");
    println!();
    println!("  JORNADA_ENV            - Set to 'production' or 'prod' for production mode");
    println!("  JORNADA_HOST           - Bind address (default: 127.0.0.1)");
    println!("  JORNADA_PORT           - Server port (default: 4000)");
    println!("  JORNADA_DATA_PATH      - Storage directory (default: ./jornada_data)");
    println!("  JORNADA_TRACKER_URL    - Task-tracker API base URL");
    println!("  JORNADA_TOKEN_SECRET   - HS256 secret for session token verification");
    println!("  GEMINI_API_KEY         - Primary LLM provider key");
    println!("  GROQ_API_KEYS          - Comma-separated fallback pool keys");
    println!("  JORNADA_GEMINI_MODEL   - Gemini model (default: gemini-2.5-flash-lite)");
    println!("  JORNADA_GROQ_MODEL     - Groq model (default: llama-3.1-8b-instant)");
    println!("  JORNADA_AI_RETRIES     - Gemini retries before fallback (default: 1)");
    println!("  JORNADA_RATE_LIMIT     - Requests per second (default: 50)");
    println!("  JORNADA_RATE_BURST     - Burst size (default: 100)");
    println!("  JORNADA_MAX_CONCURRENT - Max concurrent requests (default: 200)");
    println!("  JORNADA_HTTP_TIMEOUT   - Outbound HTTP timeout seconds (default: 30)");
    println!("  JORNADA_CORS_ORIGINS   - Comma-separated allowed origins (default: all)");
    println!("  RUST_LOG               - Log level (e.g., info, debug, trace)");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 4000);
        assert_eq!(config.ai_retries, 1);
        assert!(config.groq_api_keys.is_empty());
        assert!(!config.is_production);
    }

    #[test]
    fn test_env_override() {
        env::set_var("JORNADA_PORT", "8080");
        env::set_var("GROQ_API_KEYS", "k1, k2,, ");

        let config = ServerConfig::from_env();
        assert_eq!(config.port, 8080);
        assert_eq!(config.groq_api_keys, vec!["k1", "k2"]);

        env::remove_var("JORNADA_PORT");
        env::remove_var("GROQ_API_KEYS");
    }

    #[test]
    fn test_cors_default_is_permissive() {
        let cors = CorsConfig::default();
        assert!(!cors.is_restricted());
        assert!(cors.allowed_origins.is_empty());
    }

    #[test]
    fn test_cors_to_layer_restricted() {
        let cors = CorsConfig {
            allowed_origins: vec!["https://app.worklight.mx".to_string()],
            ..Default::default()
        };
        assert!(cors.is_restricted());
        let _layer = cors.to_layer(); // Should not panic
    }
}
