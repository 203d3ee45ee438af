//! HTTP request tracking middleware for observability.

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use std::time::Instant;

/// Middleware to track HTTP request latency and counts
pub async fn track_metrics(req: Request, next: Next) -> Result<Response, StatusCode> {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    // Normalize path to avoid high cardinality (group dynamic IDs)
    let normalized_path = normalize_path(&path);

    crate::metrics::HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &normalized_path, &status])
        .observe(duration);

    crate::metrics::HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &normalized_path, &status])
        .inc();

    Ok(response)
}

/// Normalize path to prevent metric cardinality explosion
/// /api/history/Act_42_2026_08_06 -> /api/history/{id}
fn normalize_path(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();
    let mut normalized = Vec::new();

    for part in parts {
        if part.is_empty() {
            continue;
        }

        if is_id(part) {
            normalized.push("{id}");
        } else {
            normalized.push(part);
        }
    }

    format!("/{}", normalized.join("/"))
}

/// Check if a path segment looks like an ID (session id, numeric id, email)
fn is_id(segment: &str) -> bool {
    // Session ids: Act_{user}_{yyyy}_{mm}_{dd}[_n]
    if segment.starts_with("Act_") {
        return true;
    }

    // Emails (collaborator keys)
    if segment.contains('@') {
        return true;
    }

    // Numeric ID
    if !segment.is_empty() && segment.chars().all(|c| c.is_numeric()) {
        return true;
    }

    // Long opaque tracker ids
    if segment.len() > 20 && segment.chars().all(|c| c.is_alphanumeric() || c == '-') {
        return true;
    }

    false
}
