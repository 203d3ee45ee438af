//! Domain model for daily activities and their pendientes.
//!
//! `types` holds the tracker wire shapes plus the enriched analysis shapes;
//! `filters` holds the pure predicates the orchestration is built from.

pub mod filters;
pub mod types;

pub use filters::{
    collect_reviews, dedup_activities, dias_pendiente, enrich_pendiente, hora_a_minutos,
    in_working_hours, is_excluded, is_principal_window, proyecto_principal,
};
pub use types::{
    Actividad, ActividadCard, ActividadRef, ActividadRevisiones, AnalysisMetrics,
    AnalysisSnapshot, Assignee, ColaboradorItems, ColaboradorRevisiones, CompactActividad,
    Pendiente, PendienteInfo, Prioridad, RevisionCard, RevisionesDia, TrackerUser,
};
