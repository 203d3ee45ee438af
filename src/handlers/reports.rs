//! Daily report handler.
//!
//! Regenerates the day's snapshot of unfinished pendientes that carry a
//! reason: wipe today's rows, then walk every user's activity cache.

use axum::{extract::State, response::Json};
use serde::Serialize;

use super::state::AppState;
use crate::errors::Result;
use crate::store::{EstadoPendiente, ReportRow};

/// Response for the daily report endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReportResponse {
    pub success: bool,
    pub fecha: String,
    pub total_reportes: usize,
}

/// POST /api/reports/daily - regenerate today's report snapshot
pub async fn generate_daily_report(
    State(state): State<AppState>,
) -> Result<Json<DailyReportResponse>> {
    let hoy = state.today();

    let wiped = state.reports.wipe_date(hoy)?;
    if wiped > 0 {
        tracing::debug!("replaced {} existing report rows for {}", wiped, hoy);
    }

    let mut rows: Vec<ReportRow> = Vec::new();
    for doc in state.activities.all_docs()? {
        for actividad in &doc.actividades {
            for pendiente in &actividad.pendientes {
                let motivo = match &pendiente.motivo_no_completado {
                    Some(m) if !m.is_empty() => m.clone(),
                    _ => continue,
                };
                if pendiente.estado == EstadoPendiente::Completado {
                    continue;
                }

                rows.push(ReportRow {
                    user_id: doc.user_id.clone(),
                    proyecto_nombre: doc.nombre.clone(),
                    actividad_id: actividad.actividad_id.clone(),
                    pendiente_id: pendiente.pendiente_id.clone(),
                    pendiente_nombre: pendiente.nombre.clone(),
                    estado_final: pendiente.estado,
                    motivo_no_completado: motivo,
                    prioridad: pendiente.prioridad,
                    duracion_min: pendiente.duracion_min,
                    fecha_reporte: hoy,
                });
            }
        }
    }

    if !rows.is_empty() {
        state.reports.insert(&rows)?;
    }

    Ok(Json(DailyReportResponse {
        success: true,
        fecha: hoy.format("%Y-%m-%d").to_string(),
        total_reportes: rows.len(),
    }))
}
