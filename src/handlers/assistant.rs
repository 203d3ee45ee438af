//! Assistant analysis handlers.
//!
//! The day's orchestration lives here: fetch activities and reviews from the
//! tracker, apply the filter predicates, bucket pendientes by priority, cache
//! the result, build the prompt, run the LLM chain, and fold everything into
//! the session history.

use axum::{extract::State, response::Json, Extension};
use serde::{Deserialize, Serialize};

use super::state::AppState;
use crate::auth::AuthUser;
use crate::domain::{
    collect_reviews, dedup_activities, enrich_pendiente, in_working_hours, is_excluded,
    is_principal_window, proyecto_principal, Actividad, ActividadCard, ActividadRef,
    ActividadRevisiones, AnalysisMetrics, AnalysisSnapshot, Assignee, CompactActividad,
    PendienteInfo, RevisionCard, RevisionesDia,
};
use crate::errors::{AppError, Result, ValidationErrorExt};
use crate::prompt;
use crate::store::{CachedPendiente, EstadoPendiente, MsgRole, TareaEstado};
use crate::validation;

fn default_question() -> String {
    prompt::PREGUNTA_DEFAULT.to_string()
}

/// Request for the main analysis endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub email: String,
    #[serde(default = "default_question")]
    pub question: String,
    #[serde(default)]
    pub show_all: bool,
}

/// Metrics block of the analysis response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsPayload {
    pub total_actividades: usize,
    pub tareas_con_tiempo: usize,
    pub tareas_sin_tiempo: usize,
    pub tareas_alta_prioridad: usize,
    pub tiempo_estimado_total: String,
}

impl From<&AnalysisMetrics> for MetricsPayload {
    fn from(m: &AnalysisMetrics) -> Self {
        Self {
            total_actividades: m.total_actividades,
            tareas_con_tiempo: m.tareas_con_tiempo,
            tareas_sin_tiempo: m.tareas_sin_tiempo,
            tareas_alta_prioridad: m.tareas_alta_prioridad,
            tiempo_estimado_total: m.tiempo_formateado(),
        }
    }
}

/// Response for the main analysis endpoint (also used by its early returns)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub success: bool,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub session_id: String,
    pub proyecto_principal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsPayload>,
    pub data: AnalysisSnapshot,
    pub separadas_por_tiempo: bool,
    pub sugerencias: Vec<String>,
}

/// POST /api/assistant/activities-with-reviews - the day's full analysis
pub async fn activities_with_reviews(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<AnalysisRequest>,
) -> Result<Json<AnalysisResponse>> {
    validation::validate_email(&req.email).map_validation_err("email")?;
    validation::validate_prompt_text(&req.question, "question", validation::MAX_QUESTION_LENGTH)
        .map_validation_err("question")?;

    let today = state.today();
    let session_id = state.history.daily_session_id(&user.id, today)?;

    let tracker_user = state
        .tracker
        .find_user(&req.email)
        .await
        .map_err(|e| AppError::TrackerUnavailable(e.to_string()))?
        .ok_or_else(|| AppError::UserNotFound(req.email.clone()))?;

    let actividades_raw = state
        .tracker
        .fetch_daily_activities(&req.email)
        .await
        .map_err(|e| AppError::TrackerUnavailable(e.to_string()))?;

    if actividades_raw.is_empty() {
        let answer = "No tienes actividades registradas para hoy";
        state
            .history
            .push_message(&user.id, &session_id, MsgRole::Bot, answer)?;

        return Ok(Json(AnalysisResponse {
            success: true,
            answer: answer.to_string(),
            provider: None,
            session_id,
            proyecto_principal: "Sin proyecto específico".to_string(),
            metrics: None,
            data: AnalysisSnapshot {
                actividades: Vec::new(),
                revisiones_por_actividad: Vec::new(),
            },
            separadas_por_tiempo: false,
            sugerencias: Vec::new(),
        }));
    }

    // Bookkeeping rows (00ftf titles, 00sec status) never reach the analysis
    let filtradas: Vec<Actividad> = dedup_activities(actividades_raw)
        .into_iter()
        .filter(|a| !is_excluded(a))
        .collect();

    let proyecto = proyecto_principal(&filtradas);

    let full_day = req.show_all || req.question.contains(prompt::MARCADOR_OTROS_HORARIOS);

    let (seleccionadas, mensaje_horario): (Vec<Actividad>, &str) = if full_day {
        (
            filtradas
                .iter()
                .filter(|a| in_working_hours(a))
                .cloned()
                .collect(),
            "Mostrando todas las actividades del día",
        )
    } else {
        (
            filtradas
                .iter()
                .filter(|a| is_principal_window(a))
                .cloned()
                .collect(),
            "Actividades en horario 09:30-16:30",
        )
    };

    if seleccionadas.is_empty() {
        let answer = if full_day {
            "No tienes actividades programadas en horario laboral (09:00-17:30)"
        } else {
            "No tienes actividades programadas en el horario de 09:30 a 16:30"
        };
        state
            .history
            .push_message(&user.id, &session_id, MsgRole::Bot, answer)?;

        return Ok(Json(AnalysisResponse {
            success: true,
            answer: answer.to_string(),
            provider: None,
            session_id,
            proyecto_principal: proyecto,
            metrics: None,
            data: AnalysisSnapshot {
                actividades: filtradas
                    .iter()
                    .map(|a| ActividadCard::from_actividad(a, is_principal_window(a)))
                    .collect(),
                revisiones_por_actividad: Vec::new(),
            },
            separadas_por_tiempo: false,
            sugerencias: vec![
                "¿Quieres ver todas tus actividades del día?".to_string(),
                "¿Necesitas ayuda con actividades en otros horarios?".to_string(),
                "¿Quieres que te ayude a planificar estas actividades?".to_string(),
            ],
        }));
    }

    // A failed reviews fetch degrades to an empty set
    let now = chrono::Utc::now();
    let revisiones = match state.tracker.fetch_daily_reviews(today, &req.email).await {
        Ok(revisiones) => revisiones,
        Err(e) => {
            tracing::warn!("failed to fetch reviews, continuing without: {}", e);
            RevisionesDia::default()
        }
    };

    let agrupadas = collect_reviews(&seleccionadas, &revisiones, &req.email, now);
    let ordenadas: Vec<&ActividadRevisiones> = seleccionadas
        .iter()
        .filter_map(|a| agrupadas.get(&a.id))
        .collect();

    let metrics = AnalysisMetrics::from_revisiones(ordenadas.iter().copied());

    // Cache what the day looks like for this user
    state.activities.ensure_user(&user.id, &proyecto)?;
    for rev in &ordenadas {
        let pendientes: Vec<CachedPendiente> = rev
            .pendientes_con_tiempo
            .iter()
            .map(|p| CachedPendiente {
                pendiente_id: p.id.clone(),
                nombre: p.nombre.clone(),
                descripcion: String::new(),
                estado: if p.terminada {
                    EstadoPendiente::Completado
                } else {
                    EstadoPendiente::Pendiente
                },
                duracion_min: p.duracion_min,
                prioridad: p.prioridad,
                motivo_no_completado: None,
                fecha_creacion: p.fecha_creacion.unwrap_or(now),
            })
            .collect();

        state.activities.replace_activity_pendientes(
            &user.id,
            &rev.actividad.id,
            Some(&rev.actividad.titulo),
            pendientes,
        )?;
    }

    let built_prompt = if full_day {
        prompt::build_full_day_prompt(
            &tracker_user.first_name,
            &req.email,
            &proyecto,
            mensaje_horario,
            &metrics,
            &ordenadas,
            &req.question,
        )
    } else {
        prompt::build_focused_prompt(
            &tracker_user.first_name,
            &req.email,
            &proyecto,
            &metrics,
            &ordenadas,
            &req.question,
        )
    };

    let reply = state.ai.generate(&built_prompt).await?;

    // Snapshot: the full-day view keeps every activity that has any task;
    // the focused view only those with timed tasks.
    let revision_cards: Vec<RevisionCard> = ordenadas
        .iter()
        .copied()
        .filter(|rev| {
            if full_day {
                !rev.pendientes_con_tiempo.is_empty() || !rev.pendientes_sin_tiempo.is_empty()
            } else {
                !rev.pendientes_con_tiempo.is_empty()
            }
        })
        .map(RevisionCard::from_revisiones)
        .collect();

    let snapshot = AnalysisSnapshot {
        actividades: seleccionadas
            .iter()
            .map(|a| ActividadCard::from_actividad(a, is_principal_window(a)))
            .collect(),
        revisiones_por_actividad: revision_cards,
    };

    let tareas: Vec<TareaEstado> = snapshot
        .revisiones_por_actividad
        .iter()
        .flat_map(|card| {
            card.tareas_con_tiempo.iter().map(|t| TareaEstado {
                task_id: t.id.clone(),
                task_name: t.nombre.clone(),
                actividad_titulo: card.actividad_titulo.clone(),
                explicada: false,
                validada: false,
                explicacion: String::new(),
                ultimo_intento: None,
            })
        })
        .collect();

    state.history.record_analysis(
        &user.id,
        &session_id,
        &req.question,
        &reply.text,
        snapshot.clone(),
        tareas,
    )?;

    let sugerencias = if full_day {
        vec![
            format!(
                "¿Te gustaría estimar tiempo para las {} tareas sin tiempo de '{}'?",
                metrics.tareas_sin_tiempo, proyecto
            ),
            format!("¿Quieres que te ayude a priorizar las tareas de '{proyecto}'?"),
            "¿Necesitas ayuda para organizar tu día completo?".to_string(),
        ]
    } else {
        vec![
            format!("¿Quieres profundizar en alguna tarea de '{proyecto}'?"),
            format!("¿Necesitas ayuda para organizar las tareas de '{proyecto}' por tiempo?"),
            "¿Quieres ver todas tus actividades del día?".to_string(),
        ]
    };

    Ok(Json(AnalysisResponse {
        success: true,
        answer: reply.text,
        provider: Some(reply.provider.to_string()),
        session_id,
        proyecto_principal: proyecto,
        metrics: Some(MetricsPayload::from(&metrics)),
        data: snapshot,
        separadas_por_tiempo: true,
        sugerencias,
    }))
}

// =============================================================================
// COMPACT DAILY ACTIVITIES
// =============================================================================

/// Request for the compact daily-activities endpoint
#[derive(Debug, Deserialize)]
pub struct DailyActivitiesRequest {
    pub email: String,
}

/// POST /api/assistant/activities - principal-window activity, compact shape
pub async fn daily_activities(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<DailyActivitiesRequest>,
) -> Result<Json<Vec<CompactActividad>>> {
    validation::validate_email(&req.email).map_validation_err("email")?;

    let today = state.today();
    let session_id = state.history.daily_session_id(&user.id, today)?;

    state.history.push_message(
        &user.id,
        &session_id,
        MsgRole::Usuario,
        &format!("Consulta de actividades del día para {}", req.email),
    )?;

    let actividades = state
        .tracker
        .fetch_daily_activities(&req.email)
        .await
        .map_err(|e| AppError::TrackerUnavailable(e.to_string()))?;

    let Some(seleccionada) = actividades.iter().find(|a| is_principal_window(a)) else {
        state.history.push_message(
            &user.id,
            &session_id,
            MsgRole::Bot,
            "No hay actividades en horario 09:30-16:30",
        )?;
        return Ok(Json(Vec::new()));
    };

    let titulo: String = seleccionada.titulo.chars().take(60).collect();
    let resultado = CompactActividad {
        t: if titulo.is_empty() {
            "Sin título".to_string()
        } else {
            titulo
        },
        h: format!("{}-{}", seleccionada.hora_inicio, seleccionada.hora_fin),
        p: seleccionada.pendientes.len(),
        duraciones: seleccionada
            .pendientes
            .iter()
            .map(|p| p.duracion_min.unwrap_or(0))
            .collect(),
    };

    state.history.push_message(
        &user.id,
        &session_id,
        MsgRole::Bot,
        &format!(
            "Actividad encontrada: \"{}\" con {} pendientes",
            resultado.t, resultado.p
        ),
    )?;

    Ok(Json(vec![resultado]))
}

// =============================================================================
// PER-ACTIVITY REVIEWS
// =============================================================================

/// Request for the reviews endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewsRequest {
    pub email: String,
    #[serde(default)]
    pub ids_act: Vec<String>,
}

/// One activity's reviews for the requesting user
#[derive(Debug, Serialize)]
pub struct ReviewGroup {
    pub actividades: ActividadRef,
    pub pendientes: Vec<PendienteInfo>,
    pub assignees: Vec<Assignee>,
}

/// Response for the reviews endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewsResponse {
    pub success: bool,
    pub session_id: String,
    pub data: Vec<ReviewGroup>,
}

/// POST /api/assistant/reviews - pendientes per activity, priorities included
pub async fn activity_reviews(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ReviewsRequest>,
) -> Result<Json<ReviewsResponse>> {
    validation::validate_email(&req.email).map_validation_err("email")?;
    validation::validate_activity_ids(&req.ids_act).map_validation_err("idsAct")?;

    let today = state.today();
    let session_id = state.history.daily_session_id(&user.id, today)?;

    state.history.push_message(
        &user.id,
        &session_id,
        MsgRole::Usuario,
        &format!("Consulta de revisiones para {} actividades", req.ids_act.len()),
    )?;

    let revisiones = match state.tracker.fetch_daily_reviews(today, &req.email).await {
        Ok(revisiones) => revisiones,
        Err(e) => {
            tracing::warn!("failed to fetch reviews, continuing without: {}", e);
            RevisionesDia::default()
        }
    };

    let now = chrono::Utc::now();
    let mut grupos: Vec<ReviewGroup> = Vec::new();

    for colaborador in &revisiones.colaboradores {
        for actividad in &colaborador.items.actividades {
            if !req.ids_act.is_empty() && !req.ids_act.contains(&actividad.id) {
                continue;
            }
            if grupos.iter().any(|g| g.actividades.id == actividad.id) {
                continue;
            }

            let pendientes: Vec<PendienteInfo> = actividad
                .pendientes
                .iter()
                .filter(|p| p.assignees.iter().any(|a| a.name == req.email))
                .map(|p| enrich_pendiente(p, now))
                .collect();

            if pendientes.is_empty() {
                continue;
            }

            grupos.push(ReviewGroup {
                actividades: ActividadRef {
                    id: actividad.id.clone(),
                    titulo: actividad.titulo.clone(),
                },
                pendientes,
                assignees: vec![Assignee {
                    name: req.email.clone(),
                }],
            });
        }
    }

    let total_pendientes: usize = grupos.iter().map(|g| g.pendientes.len()).sum();
    state.history.push_message(
        &user.id,
        &session_id,
        MsgRole::Bot,
        &format!(
            "Se encontraron {} actividades con {} pendientes totales.",
            grupos.len(),
            total_pendientes
        ),
    )?;

    Ok(Json(ReviewsResponse {
        success: true,
        session_id,
        data: grupos,
    }))
}
