//! Session token authentication middleware.
//!
//! The chat frontend sends the session JWT either as a `token` cookie or as
//! an `Authorization: Bearer` header. Verification is delegated to
//! `jsonwebtoken` (HS256); on success the user id claim is inserted into the
//! request extensions as [`AuthUser`].

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use std::env;

use crate::errors::AppError;

/// Authenticated user id, extracted from the verified token claims
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
}

/// Token claims. The issuing service stores the user id under `id`, either
/// as a number or a string depending on its version.
#[derive(Debug, Deserialize)]
struct Claims {
    id: IdClaim,
    #[allow(dead_code)]
    exp: usize,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdClaim {
    Num(i64),
    Text(String),
}

impl IdClaim {
    fn into_string(self) -> String {
        match self {
            IdClaim::Num(n) => n.to_string(),
            IdClaim::Text(s) => s,
        }
    }
}

/// Resolve the HS256 secret from the environment
fn token_secret() -> Result<String, AppError> {
    match env::var("JORNADA_TOKEN_SECRET") {
        Ok(secret) if !secret.trim().is_empty() => Ok(secret),
        _ => {
            let is_production = env::var("JORNADA_ENV")
                .map(|v| v.to_lowercase() == "production" || v.to_lowercase() == "prod")
                .unwrap_or(false);

            if is_production {
                tracing::error!("JORNADA_TOKEN_SECRET not set in production mode");
                return Err(AppError::InvalidToken(
                    "token secret not configured".to_string(),
                ));
            }

            tracing::warn!(
                "JORNADA_TOKEN_SECRET not set - using development secret (not for production!)"
            );
            Ok("jornada-dev-secret-change-in-production".to_string())
        }
    }
}

/// Pull the raw token out of the `token` cookie or the bearer header
fn extract_token(request: &Request) -> Option<String> {
    if let Some(cookie_header) = request
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
    {
        for pair in cookie_header.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                if name == "token" && !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }

    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

/// Verify a raw token and return the user id claim
pub fn verify_token(token: &str) -> Result<AuthUser, AppError> {
    let secret = token_secret()?;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::InvalidToken(e.to_string()))?;

    Ok(AuthUser {
        id: data.claims.id.into_string(),
    })
}

/// Authentication middleware for protected routes
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let token = match extract_token(&request) {
        Some(token) => token,
        None => return AppError::NotAuthenticated.into_response(),
    };

    let user = match verify_token(&token) {
        Ok(user) => user,
        Err(e) => {
            tracing::debug!("token verification failed: {}", e);
            return e.into_response();
        }
    };

    request.extensions_mut().insert(user);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use std::sync::Once;

    const TEST_SECRET: &str = "unit-test-secret";
    static SECRET_INIT: Once = Once::new();

    // Tests run in parallel and share the process environment; set the
    // secret once and never remove it.
    fn init_secret() {
        SECRET_INIT.call_once(|| {
            env::set_var("JORNADA_TOKEN_SECRET", TEST_SECRET);
        });
    }

    fn make_token(secret: &str, id: serde_json::Value) -> String {
        let claims = json!({ "id": id, "exp": 4_102_444_800usize });
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_verify_token_numeric_id() {
        init_secret();
        let token = make_token(TEST_SECRET, json!(42));
        let user = verify_token(&token).unwrap();
        assert_eq!(user.id, "42");
    }

    #[test]
    fn test_verify_token_string_id() {
        init_secret();
        let token = make_token(TEST_SECRET, json!("user-7"));
        let user = verify_token(&token).unwrap();
        assert_eq!(user.id, "user-7");
    }

    #[test]
    fn test_verify_token_wrong_secret() {
        init_secret();
        let token = make_token("otro-secreto", json!(42));
        assert!(verify_token(&token).is_err());
    }

    #[test]
    fn test_extract_token_from_cookie() {
        let request = Request::builder()
            .header(header::COOKIE, "theme=dark; token=abc123; lang=es")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_token(&request).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_extract_token_from_bearer() {
        let request = Request::builder()
            .header(header::AUTHORIZATION, "Bearer xyz789")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_token(&request).as_deref(), Some("xyz789"));
    }

    #[test]
    fn test_extract_token_missing() {
        let request = Request::builder().body(Body::empty()).unwrap();
        assert!(extract_token(&request).is_none());
    }
}
