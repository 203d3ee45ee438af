//! Tracker wire types and the enriched shapes derived from them.
//!
//! Field names mirror the task-tracker API (Spanish, camelCase), so every
//! struct that crosses the wire carries serde renames. Enriched shapes add
//! what the assistant computes locally: priority buckets, days pending, and
//! per-activity aggregates.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Tracker timestamps arrive as RFC 3339 or as bare `YYYY-MM-DD` dates, and
/// some rows carry garbage. Anything unparseable degrades to `None` rather
/// than failing the whole payload.
fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_lenient_datetime))
}

fn parse_lenient_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    None
}

// =============================================================================
// TRACKER WIRE TYPES
// =============================================================================

/// A scheduled work block for a user, as returned by the tracker API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actividad {
    pub id: String,
    pub titulo: String,
    #[serde(default)]
    pub hora_inicio: String,
    #[serde(default)]
    pub hora_fin: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub titulo_proyecto: Option<String>,
    #[serde(default)]
    pub pendientes: Vec<Pendiente>,
}

/// A sub-task attached to an actividad
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pendiente {
    pub id: String,
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub terminada: bool,
    #[serde(default)]
    pub confirmada: bool,
    #[serde(default)]
    pub duracion_min: Option<u32>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub fecha_creacion: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub fecha_fin_terminada: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assignees: Vec<Assignee>,
}

/// Pendiente assignee; `name` carries the collaborator email
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignee {
    pub name: String,
}

/// Collaborator record from the tracker user directory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerUser {
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Day-of-reviews payload from the tracker reports endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevisionesDia {
    #[serde(default)]
    pub colaboradores: Vec<ColaboradorRevisiones>,
}

/// Reviews grouped under one collaborator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColaboradorRevisiones {
    #[serde(default)]
    pub items: ColaboradorItems,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColaboradorItems {
    #[serde(default)]
    pub actividades: Vec<Actividad>,
}

// =============================================================================
// PRIORITY BUCKETS
// =============================================================================

/// Duration-based priority bucket for a pendiente
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Prioridad {
    #[serde(rename = "ALTA")]
    Alta,
    #[serde(rename = "MEDIA")]
    Media,
    #[serde(rename = "BAJA")]
    Baja,
    #[serde(rename = "SIN TIEMPO")]
    SinTiempo,
}

impl Prioridad {
    /// Bucket an estimated duration: >60min ALTA, >30min MEDIA, >0min BAJA,
    /// no estimate SIN TIEMPO.
    pub fn from_duration(duracion_min: Option<u32>) -> Self {
        match duracion_min {
            Some(min) if min > 60 => Prioridad::Alta,
            Some(min) if min > 30 => Prioridad::Media,
            Some(min) if min > 0 => Prioridad::Baja,
            _ => Prioridad::SinTiempo,
        }
    }

    /// Whether the pendiente carries a usable time estimate
    pub fn has_time(&self) -> bool {
        !matches!(self, Prioridad::SinTiempo)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Prioridad::Alta => "ALTA",
            Prioridad::Media => "MEDIA",
            Prioridad::Baja => "BAJA",
            Prioridad::SinTiempo => "SIN TIEMPO",
        }
    }
}

impl std::fmt::Display for Prioridad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ENRICHED SHAPES
// =============================================================================

/// A pendiente enriched with what the assistant computes locally
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendienteInfo {
    pub id: String,
    pub nombre: String,
    pub terminada: bool,
    pub confirmada: bool,
    pub duracion_min: u32,
    #[serde(default)]
    pub fecha_creacion: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fecha_fin_terminada: Option<DateTime<Utc>>,
    /// Whole days since creation (0 when unknown)
    pub dias_pendiente: i64,
    pub prioridad: Prioridad,
}

/// Minimal activity reference used inside review groupings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActividadRef {
    pub id: String,
    pub titulo: String,
}

/// Per-activity review grouping: pendientes split by whether they carry a
/// time estimate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActividadRevisiones {
    pub actividad: ActividadCard,
    pub pendientes_con_tiempo: Vec<PendienteInfo>,
    pub pendientes_sin_tiempo: Vec<PendienteInfo>,
}

impl ActividadRevisiones {
    /// Sum of estimated minutes across the timed pendientes
    pub fn tiempo_total_min(&self) -> u32 {
        self.pendientes_con_tiempo
            .iter()
            .map(|p| p.duracion_min)
            .sum()
    }

    /// Count of ALTA-priority pendientes
    pub fn alta_prioridad(&self) -> usize {
        self.pendientes_con_tiempo
            .iter()
            .filter(|p| p.prioridad == Prioridad::Alta)
            .count()
    }
}

/// Activity summary card used in API responses and history snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActividadCard {
    pub id: String,
    pub titulo: String,
    pub horario: String,
    pub status: String,
    pub proyecto: String,
    pub es_principal: bool,
}

impl ActividadCard {
    pub fn from_actividad(a: &Actividad, es_principal: bool) -> Self {
        Self {
            id: a.id.clone(),
            titulo: a.titulo.clone(),
            horario: format!("{} - {}", a.hora_inicio, a.hora_fin),
            status: a.status.clone(),
            proyecto: a
                .titulo_proyecto
                .clone()
                .unwrap_or_else(|| "Sin proyecto".to_string()),
            es_principal,
        }
    }
}

/// Per-activity entry in the analysis snapshot persisted with the history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionCard {
    pub actividad_id: String,
    pub actividad_titulo: String,
    pub tareas_con_tiempo: Vec<PendienteInfo>,
    pub tareas_sin_tiempo: Vec<PendienteInfo>,
    pub total_tareas: usize,
    pub tareas_alta_prioridad: usize,
    pub tiempo_total: u32,
}

impl RevisionCard {
    pub fn from_revisiones(rev: &ActividadRevisiones) -> Self {
        Self {
            actividad_id: rev.actividad.id.clone(),
            actividad_titulo: rev.actividad.titulo.clone(),
            total_tareas: rev.pendientes_con_tiempo.len() + rev.pendientes_sin_tiempo.len(),
            tareas_alta_prioridad: rev.alta_prioridad(),
            tiempo_total: rev.tiempo_total_min(),
            tareas_con_tiempo: rev.pendientes_con_tiempo.clone(),
            tareas_sin_tiempo: rev.pendientes_sin_tiempo.clone(),
        }
    }
}

/// Snapshot of one analysis run, persisted into the session history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSnapshot {
    pub actividades: Vec<ActividadCard>,
    pub revisiones_por_actividad: Vec<RevisionCard>,
}

/// Aggregate metrics across an analysis run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetrics {
    pub total_actividades: usize,
    pub tareas_con_tiempo: usize,
    pub tareas_sin_tiempo: usize,
    pub tareas_alta_prioridad: usize,
    pub tiempo_total_min: u32,
}

impl AnalysisMetrics {
    pub fn from_revisiones<'a, I>(revisiones: I) -> Self
    where
        I: IntoIterator<Item = &'a ActividadRevisiones>,
    {
        let mut metrics = Self::default();
        for rev in revisiones {
            metrics.total_actividades += 1;
            metrics.tareas_con_tiempo += rev.pendientes_con_tiempo.len();
            metrics.tareas_sin_tiempo += rev.pendientes_sin_tiempo.len();
            metrics.tareas_alta_prioridad += rev.alta_prioridad();
            metrics.tiempo_total_min += rev.tiempo_total_min();
        }
        metrics
    }

    pub fn total_tareas(&self) -> usize {
        self.tareas_con_tiempo + self.tareas_sin_tiempo
    }

    pub fn horas(&self) -> u32 {
        self.tiempo_total_min / 60
    }

    pub fn minutos(&self) -> u32 {
        self.tiempo_total_min % 60
    }

    /// "3h 25m" display form used in prompts and responses
    pub fn tiempo_formateado(&self) -> String {
        format!("{}h {}m", self.horas(), self.minutos())
    }
}

/// Compact activity shape for the lightweight daily endpoint:
/// title, schedule, pendiente count, and the raw duration list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactActividad {
    pub t: String,
    pub h: String,
    pub p: usize,
    pub duraciones: Vec<u32>,
}
