//! Pendiente state handlers.
//!
//! Everything that mutates the per-user activity cache after the analysis:
//! saving pendientes, confirming completion state, validating explanations
//! through the LLM, bulk-saving explanations, and walking the next
//! unvalidated task.

use axum::{extract::State, http::StatusCode, response::Json, Extension};
use serde::{Deserialize, Serialize};

use super::state::AppState;
use crate::auth::AuthUser;
use crate::domain::Prioridad;
use crate::errors::{AppError, Result, ValidationErrorExt};
use crate::prompt;
use crate::store::{CachedPendiente, EstadoPendiente, ExplicacionEntry, Mensaje, MsgRole};
use crate::validation;

// =============================================================================
// SAVE PENDIENTES
// =============================================================================

/// Request to save a batch of pendientes for one activity
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePendientesRequest {
    pub activity_id: String,
    pub pendientes: Vec<CachedPendiente>,
}

/// Response for the save endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePendientesResponse {
    pub success: bool,
    pub session_id: String,
    pub activity_id: String,
    pub total_guardados: usize,
}

/// POST /api/assistant/pendientes - cache a batch of pendientes
pub async fn save_pendientes(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<SavePendientesRequest>,
) -> Result<(StatusCode, Json<SavePendientesResponse>)> {
    if req.activity_id.trim().is_empty() {
        return Err(AppError::InvalidInput {
            field: "activityId".to_string(),
            reason: "cannot be empty".to_string(),
        });
    }

    let today = state.today();
    let session_id = state.history.daily_session_id(&user.id, today)?;

    state.history.push_message(
        &user.id,
        &session_id,
        MsgRole::Usuario,
        &format!(
            "Guardando {} pendientes para la actividad {}",
            req.pendientes.len(),
            req.activity_id
        ),
    )?;

    let total = req.pendientes.len();
    state
        .activities
        .replace_activity_pendientes(&user.id, &req.activity_id, None, req.pendientes)?;

    state.history.push_message(
        &user.id,
        &session_id,
        MsgRole::Bot,
        &format!("Se guardaron exitosamente {total} pendientes."),
    )?;

    Ok((
        StatusCode::CREATED,
        Json(SavePendientesResponse {
            success: true,
            session_id,
            activity_id: req.activity_id,
            total_guardados: total,
        }),
    ))
}

// =============================================================================
// CONFIRM PENDIENTE STATE
// =============================================================================

/// Request to update one pendiente's completion state
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmEstadoRequest {
    pub actividad_id: String,
    pub pendiente_id: String,
    pub estado: EstadoPendiente,
    #[serde(default)]
    pub motivo_no_completado: Option<String>,
}

/// Response for the confirm endpoint
#[derive(Debug, Serialize)]
pub struct ConfirmEstadoResponse {
    pub success: bool,
    pub actualizado: bool,
    pub message: String,
}

/// POST /api/assistant/pendientes/confirm - point-update one pendiente
pub async fn confirm_estado(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ConfirmEstadoRequest>,
) -> Result<Json<ConfirmEstadoResponse>> {
    if req.actividad_id.trim().is_empty() || req.pendiente_id.trim().is_empty() {
        return Err(AppError::InvalidInput {
            field: "actividadId/pendienteId".to_string(),
            reason: "cannot be empty".to_string(),
        });
    }

    let actualizado = state.activities.confirm_estado(
        &user.id,
        &req.actividad_id,
        &req.pendiente_id,
        req.estado,
        req.motivo_no_completado.as_deref(),
    )?;

    Ok(Json(ConfirmEstadoResponse {
        success: true,
        actualizado,
        message: if actualizado {
            "Estado actualizado correctamente".to_string()
        } else {
            "No se encontró el pendiente indicado".to_string()
        },
    }))
}

// =============================================================================
// EXPLANATION VALIDATION
// =============================================================================

/// Request to validate one task explanation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateExplanationRequest {
    pub task_name: String,
    pub explanation: String,
    pub activity_title: String,
}

/// What the model is asked to answer
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExplanationVerdict {
    #[serde(default)]
    es_del_tema: bool,
    #[serde(default)]
    razon: String,
    #[serde(default)]
    sugerencia: String,
    #[serde(default)]
    categoria_motivo: Option<String>,
}

/// Response for the validation endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateExplanationResponse {
    pub valida: bool,
    pub categoria_motivo: String,
    pub razon: String,
    pub sugerencia: String,
}

/// POST /api/assistant/validate-explanation - LLM relevance check
pub async fn validate_explanation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ValidateExplanationRequest>,
) -> Result<Json<ValidateExplanationResponse>> {
    validation::validate_prompt_text(&req.task_name, "taskName", validation::MAX_QUESTION_LENGTH)
        .map_validation_err("taskName")?;
    validation::validate_prompt_text(
        &req.explanation,
        "explanation",
        validation::MAX_EXPLANATION_LENGTH,
    )
    .map_validation_err("explanation")?;
    validation::validate_prompt_text(
        &req.activity_title,
        "activityTitle",
        validation::MAX_QUESTION_LENGTH,
    )
    .map_validation_err("activityTitle")?;

    let today = state.today();
    let session_id = state.history.daily_session_id(&user.id, today)?;

    let built = prompt::build_validation_prompt(&req.activity_title, &req.task_name, &req.explanation);
    let reply = state.ai.generate(&built).await?;

    // An unparseable reply counts as a failed attempt, not a server error:
    // the user just retries.
    let verdict: ExplanationVerdict =
        serde_json::from_str(&prompt::extract_json(&reply.text)).unwrap_or_else(|e| {
            tracing::warn!("unparseable validation verdict: {} ({})", reply.text, e);
            ExplanationVerdict {
                es_del_tema: false,
                razon: "No se pudo interpretar la respuesta del asistente.".to_string(),
                sugerencia: "Intenta reformular tu comentario.".to_string(),
                categoria_motivo: None,
            }
        });

    let respuesta = ValidateExplanationResponse {
        valida: verdict.es_del_tema,
        categoria_motivo: verdict
            .categoria_motivo
            .unwrap_or_else(|| "INSUFICIENTE".to_string()),
        razon: if verdict.razon.is_empty() {
            "Revisión técnica necesaria.".to_string()
        } else {
            verdict.razon
        },
        sugerencia: verdict.sugerencia,
    };

    if respuesta.valida {
        state
            .history
            .mark_validated(&user.id, &session_id, &req.task_name, &req.explanation)?;
    } else {
        state
            .history
            .touch_attempt(&user.id, &session_id, &req.task_name)?;
        tracing::info!(
            task = %req.task_name,
            motivo = %respuesta.categoria_motivo,
            "explanation rejected"
        );
    }

    let bot_msg = if respuesta.valida {
        format!("Explicación válida: {}", respuesta.razon)
    } else if respuesta.sugerencia.is_empty() {
        format!("{}.", respuesta.razon)
    } else {
        format!("{}. {}", respuesta.razon, respuesta.sugerencia)
    };

    state.history.append_messages(
        &user.id,
        &session_id,
        vec![
            Mensaje::new(
                MsgRole::Usuario,
                format!(
                    "[Explicación para \"{}\"]: {}",
                    req.task_name, req.explanation
                ),
            )
            .with_tipo("texto"),
            Mensaje::new(MsgRole::Bot, bot_msg).with_tipo("respuesta_ia"),
        ],
    )?;

    Ok(Json(respuesta))
}

// =============================================================================
// BULK EXPLANATIONS
// =============================================================================

/// One explanation in the bulk payload; incomplete entries are skipped
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationPayload {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub task_name: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default)]
    pub activity_title: Option<String>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub priority: Option<Prioridad>,
}

impl ExplanationPayload {
    fn into_entry(self) -> Option<ExplicacionEntry> {
        Some(ExplicacionEntry {
            task_id: self.task_id.filter(|s| !s.is_empty())?,
            task_name: self.task_name.filter(|s| !s.is_empty())?,
            explanation: self.explanation.filter(|s| !s.is_empty())?,
            confirmed: self.confirmed,
            activity_title: self.activity_title.filter(|s| !s.is_empty())?,
            duration: self.duration,
            priority: self.priority,
        })
    }
}

/// Request for the bulk explanation endpoint
#[derive(Debug, Deserialize)]
pub struct SaveExplanationsRequest {
    pub explanations: Vec<ExplanationPayload>,
}

/// Response for the bulk explanation endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveExplanationsResponse {
    pub success: bool,
    pub message: String,
    pub total_guardadas: usize,
}

/// POST /api/assistant/explanations - bulk upsert of explained pendientes
pub async fn save_explanations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<SaveExplanationsRequest>,
) -> Result<Json<SaveExplanationsResponse>> {
    if req.explanations.is_empty() {
        return Err(AppError::InvalidInput {
            field: "explanations".to_string(),
            reason: "no hay explicaciones para guardar".to_string(),
        });
    }

    let mut total_guardadas = 0;
    for payload in req.explanations {
        let Some(entry) = payload.into_entry() else {
            continue;
        };
        state.activities.upsert_explicacion(&user.id, &entry)?;
        total_guardadas += 1;
    }

    Ok(Json(SaveExplanationsResponse {
        success: true,
        message: "Pendientes guardados correctamente".to_string(),
        total_guardadas,
    }))
}

// =============================================================================
// NEXT TASK
// =============================================================================

/// The next task still waiting for a validated explanation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiguienteTarea {
    pub task_id: String,
    pub task_name: String,
    pub actividad_titulo: String,
}

/// Walk-through progress
#[derive(Debug, Serialize)]
pub struct Progreso {
    pub completadas: usize,
    pub total: usize,
    pub porcentaje: u32,
}

/// Response for the next-task endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextTaskResponse {
    pub success: bool,
    pub hay_pendientes: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub todas_completadas: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mensaje: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub siguiente_tarea: Option<SiguienteTarea>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progreso: Option<Progreso>,
}

/// GET /api/assistant/next-task - first unvalidated task of today's session
pub async fn next_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<NextTaskResponse>> {
    let today = state.today();
    let session_id = state.history.daily_session_id(&user.id, today)?;

    let doc = state.history.get(&user.id, &session_id)?;
    let tareas = doc.map(|d| d.tareas_estado).unwrap_or_default();

    if tareas.is_empty() {
        return Ok(Json(NextTaskResponse {
            success: true,
            hay_pendientes: false,
            todas_completadas: None,
            mensaje: Some("No hay tareas registradas para hoy".to_string()),
            siguiente_tarea: None,
            progreso: None,
        }));
    }

    let total = tareas.len();
    let completadas = tareas.iter().filter(|t| t.validada).count();

    let Some(siguiente) = tareas.into_iter().find(|t| !t.validada) else {
        return Ok(Json(NextTaskResponse {
            success: true,
            hay_pendientes: false,
            todas_completadas: Some(true),
            mensaje: Some("¡Todas las tareas han sido explicadas!".to_string()),
            siguiente_tarea: None,
            progreso: None,
        }));
    };

    Ok(Json(NextTaskResponse {
        success: true,
        hay_pendientes: true,
        todas_completadas: None,
        mensaje: None,
        siguiente_tarea: Some(SiguienteTarea {
            task_id: siguiente.task_id,
            task_name: siguiente.task_name,
            actividad_titulo: siguiente.actividad_titulo,
        }),
        progreso: Some(Progreso {
            completadas,
            total,
            porcentaje: ((completadas as f64 / total as f64) * 100.0).round() as u32,
        }),
    }))
}
