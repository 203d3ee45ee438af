//! Task-tracker API client.
//!
//! Thin wrapper over the three tracker endpoints the assistant consumes:
//! the day's activities for an assignee, the day's reviews, and the
//! collaborator directory. Response envelopes vary per endpoint, so each
//! call unwraps its own.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

use crate::domain::{Actividad, RevisionesDia, TrackerUser};
use crate::metrics;

/// Envelope for the activities endpoint
#[derive(Debug, Deserialize)]
struct ActividadesEnvelope {
    #[serde(default)]
    data: Vec<Actividad>,
}

/// Envelope for the reviews endpoint
#[derive(Debug, Deserialize)]
struct RevisionesEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<RevisionesDia>,
}

/// Envelope for the user directory endpoint
#[derive(Debug, Deserialize)]
struct UsersEnvelope {
    #[serde(default)]
    items: Vec<TrackerUser>,
}

/// HTTP client for the external task-tracker API
pub struct TrackerClient {
    client: reqwest::Client,
    base_url: String,
}

impl TrackerClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The day's activities assigned to a collaborator
    pub async fn fetch_daily_activities(&self, email: &str) -> Result<Vec<Actividad>> {
        let url = format!("{}/actividades/assignee/{}/del-dia", self.base_url, email);

        let result = self.get_json::<ActividadesEnvelope>(&url, &[]).await;
        self.track("actividades", &result);

        Ok(result.context("fetching daily activities")?.data)
    }

    /// The day's reviews for a collaborator. Callers degrade a failure here
    /// to an empty set; the fetch itself does not.
    pub async fn fetch_daily_reviews(
        &self,
        date: NaiveDate,
        email: &str,
    ) -> Result<RevisionesDia> {
        let url = format!("{}/reportes/revisiones-por-fecha", self.base_url);
        let date = date.format("%Y-%m-%d").to_string();
        let params = [("date", date.as_str()), ("colaborador", email)];

        let result = self.get_json::<RevisionesEnvelope>(&url, &params).await;
        self.track("revisiones", &result);

        let envelope = result.context("fetching daily reviews")?;
        if !envelope.success {
            return Ok(RevisionesDia::default());
        }
        Ok(envelope.data.unwrap_or_default())
    }

    /// The collaborator directory
    pub async fn fetch_users(&self) -> Result<Vec<TrackerUser>> {
        let url = format!("{}/users/search", self.base_url);

        let result = self.get_json::<UsersEnvelope>(&url, &[]).await;
        self.track("users", &result);

        Ok(result.context("fetching tracker users")?.items)
    }

    /// Find a collaborator by email, case-insensitively
    pub async fn find_user(&self, email: &str) -> Result<Option<TrackerUser>> {
        let users = self.fetch_users().await?;
        Ok(users
            .into_iter()
            .find(|u| u.email.eq_ignore_ascii_case(email)))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let mut request = self.client.get(url);
        if !params.is_empty() {
            request = request.query(params);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("tracker returned {status} for {url}");
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("decoding tracker response from {url}"))
    }

    fn track<T>(&self, endpoint: &str, result: &Result<T>) {
        let outcome = if result.is_ok() { "ok" } else { "error" };
        metrics::TRACKER_REQUESTS_TOTAL
            .with_label_values(&[endpoint, outcome])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activities_envelope_parsing() {
        let raw = serde_json::json!({
            "data": [{
                "id": "act-1",
                "titulo": "Migracion",
                "horaInicio": "09:30",
                "horaFin": "16:30",
                "status": "abierta"
            }]
        });
        let envelope: ActividadesEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.data.len(), 1);
        assert_eq!(envelope.data[0].hora_inicio, "09:30");
    }

    #[test]
    fn test_revisiones_envelope_parsing() {
        let raw = serde_json::json!({
            "success": true,
            "data": {
                "colaboradores": [{
                    "items": {
                        "actividades": [{
                            "id": "act-1",
                            "titulo": "Migracion",
                            "pendientes": [{
                                "id": "p-1",
                                "nombre": "rutas",
                                "duracionMin": 45,
                                "assignees": [{"name": "ana@wl.mx"}]
                            }]
                        }]
                    }
                }]
            }
        });
        let envelope: RevisionesEnvelope = serde_json::from_value(raw).unwrap();
        assert!(envelope.success);
        let dia = envelope.data.unwrap();
        assert_eq!(dia.colaboradores[0].items.actividades[0].pendientes.len(), 1);
    }

    #[test]
    fn test_revisiones_envelope_tolerates_missing_data() {
        let raw = serde_json::json!({ "success": false });
        let envelope: RevisionesEnvelope = serde_json::from_value(raw).unwrap();
        assert!(!envelope.success);
        assert!(envelope.data.is_none());
    }

    #[test]
    fn test_users_envelope_parsing() {
        let raw = serde_json::json!({
            "items": [{
                "collaboratorId": "c-1",
                "email": "Ana@WL.mx",
                "firstName": "Ana",
                "lastName": "Lopez"
            }]
        });
        let envelope: UsersEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.items[0].first_name, "Ana");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = TrackerClient::new("https://tracker.example/api/", 5);
        assert_eq!(client.base_url, "https://tracker.example/api");
    }
}
