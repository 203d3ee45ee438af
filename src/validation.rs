//! Input validation for request payloads.
//!
//! Requests come from a chat frontend, but the payloads travel onward into
//! prompts and store keys, so lengths and character sets are bounded here.

use anyhow::{anyhow, Result};

/// Maximum lengths for request fields
pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MAX_QUESTION_LENGTH: usize = 2_000;
pub const MAX_EXPLANATION_LENGTH: usize = 4_000;
pub const MAX_SESSION_ID_LENGTH: usize = 64;
pub const MAX_ACTIVITY_IDS: usize = 100;

/// Validate an email address (used as the tracker-side collaborator key)
pub fn validate_email(email: &str) -> Result<()> {
    if email.trim().is_empty() {
        return Err(anyhow!("email cannot be empty"));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(anyhow!(
            "email too long: {} chars (max: {})",
            email.len(),
            MAX_EMAIL_LENGTH
        ));
    }

    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| anyhow!("email must contain '@'"))?;

    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(anyhow!("malformed email address"));
    }

    Ok(())
}

/// Validate a session id (`Act_{user}_{yyyy}_{mm}_{dd}` with optional suffix)
pub fn validate_session_id(session_id: &str) -> Result<()> {
    if session_id.is_empty() {
        return Err(anyhow!("sessionId cannot be empty"));
    }

    if session_id.len() > MAX_SESSION_ID_LENGTH {
        return Err(anyhow!(
            "sessionId too long: {} chars (max: {})",
            session_id.len(),
            MAX_SESSION_ID_LENGTH
        ));
    }

    if !session_id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return Err(anyhow!(
            "sessionId contains invalid characters (allowed: alphanumeric, _, -)"
        ));
    }

    Ok(())
}

/// Validate free text that ends up inside an LLM prompt
pub fn validate_prompt_text(text: &str, field: &str, max: usize) -> Result<()> {
    if text.trim().is_empty() {
        return Err(anyhow!("{field} cannot be empty"));
    }

    if text.len() > max {
        return Err(anyhow!(
            "{field} too long: {} chars (max: {})",
            text.len(),
            max
        ));
    }

    Ok(())
}

/// Validate pagination parameters
pub fn validate_pagination(limit: usize, skip: usize) -> Result<()> {
    if limit == 0 {
        return Err(anyhow!("limit must be greater than 0"));
    }

    if limit > 100 {
        return Err(anyhow!("limit too large: {limit} (max: 100)"));
    }

    if skip > 10_000 {
        return Err(anyhow!("skip too large: {skip} (max: 10,000)"));
    }

    Ok(())
}

/// Validate a list of tracker activity ids
pub fn validate_activity_ids(ids: &[String]) -> Result<()> {
    if ids.len() > MAX_ACTIVITY_IDS {
        return Err(anyhow!(
            "too many activity ids: {} (max: {})",
            ids.len(),
            MAX_ACTIVITY_IDS
        ));
    }

    for id in ids {
        if id.trim().is_empty() {
            return Err(anyhow!("activity id cannot be empty"));
        }
    }

    Ok(())
}
