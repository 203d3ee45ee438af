//! Session history handlers.

use axum::{extract::{Query, State}, response::Json, Extension};
use serde::{Deserialize, Serialize};

use super::state::AppState;
use crate::auth::AuthUser;
use crate::errors::{AppError, Result, ValidationErrorExt};
use crate::store::{HistoryDoc, ProyectoDoc};
use crate::validation;

/// Response for today's session history
#[derive(Debug, Serialize)]
pub struct SessionHistoryResponse {
    pub success: bool,
    pub data: HistoryDoc,
    pub proyectos: Option<ProyectoDoc>,
}

/// GET /api/history/session - today's history joined with the activity cache
pub async fn get_session_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SessionHistoryResponse>> {
    let today = state.today();
    let session_id = state.history.daily_session_id(&user.id, today)?;

    let mut doc = state
        .history
        .get(&user.id, &session_id)?
        .ok_or_else(|| AppError::HistoryNotFound(session_id.clone()))?;

    // Only activities that actually have reviews are interesting to the
    // frontend's session view.
    if let Some(snapshot) = doc.data.as_mut() {
        let con_revision: std::collections::HashSet<&str> = snapshot
            .revisiones_por_actividad
            .iter()
            .map(|r| r.actividad_id.as_str())
            .collect();
        snapshot
            .actividades
            .retain(|a| con_revision.contains(a.id.as_str()));
    }

    let proyectos = state.activities.get(&user.id)?;

    Ok(Json(SessionHistoryResponse {
        success: true,
        data: doc,
        proyectos,
    }))
}

fn default_limit() -> usize {
    10
}

/// Query parameters for the paginated history listing
#[derive(Debug, Deserialize)]
pub struct ListHistoriesQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub skip: usize,
}

/// Pagination block
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: usize,
    pub limit: usize,
    pub skip: usize,
    pub has_more: bool,
}

/// Response for the paginated history listing
#[derive(Debug, Serialize)]
pub struct ListHistoriesResponse {
    pub success: bool,
    pub data: Vec<HistoryDoc>,
    pub pagination: Pagination,
}

/// GET /api/history/user - every session of the user, newest first
pub async fn list_user_histories(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListHistoriesQuery>,
) -> Result<Json<ListHistoriesResponse>> {
    validation::validate_pagination(query.limit, query.skip).map_validation_err("limit/skip")?;

    let (data, total) = state.history.list_user(&user.id, query.limit, query.skip)?;
    let has_more = query.skip + data.len() < total;

    Ok(Json(ListHistoriesResponse {
        success: true,
        data,
        pagination: Pagination {
            total,
            limit: query.limit,
            skip: query.skip,
            has_more,
        },
    }))
}

/// Request to delete one session's history
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSessionRequest {
    pub session_id: String,
}

/// Response for the delete endpoint
#[derive(Debug, Serialize)]
pub struct DeleteSessionResponse {
    pub success: bool,
    pub message: String,
}

/// DELETE /api/history/session - drop one session's history
pub async fn delete_session_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<DeleteSessionRequest>,
) -> Result<Json<DeleteSessionResponse>> {
    validation::validate_session_id(&req.session_id).map_validation_err("sessionId")?;

    if !state.history.delete(&user.id, &req.session_id)? {
        return Err(AppError::HistoryNotFound(req.session_id));
    }

    Ok(Json(DeleteSessionResponse {
        success: true,
        message: "Historial eliminado correctamente".to_string(),
    }))
}
