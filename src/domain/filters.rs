//! Pure predicates and the review-collection routine the orchestration is
//! built from.
//!
//! Business rules, as enforced by the tracker workflow:
//! - the "proyecto principal" is the activity occupying 09:30-16:30;
//! - activities whose title contains "00ftf" or whose status is "00sec" are
//!   tracker bookkeeping rows and never shown;
//! - the working window runs 09:00-17:30 (inclusion is by start hour);
//! - a pendiente counts for a user only when one of its assignees carries
//!   that user's email.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::types::{
    Actividad, ActividadCard, ActividadRevisiones, Pendiente, PendienteInfo, Prioridad,
    RevisionesDia,
};

/// Reference window occupied by the proyecto principal
pub const PRINCIPAL_INICIO: &str = "09:30";
pub const PRINCIPAL_FIN: &str = "16:30";

/// Working-hours window (inclusion is by start hour)
pub const LABORAL_HORA_MIN: u32 = 9;
pub const LABORAL_HORA_MAX: u32 = 17;

/// Title/status markers for tracker bookkeeping rows
const MARCA_TITULO_EXCLUIDO: &str = "00ftf";
const STATUS_EXCLUIDO: &str = "00sec";

/// Title noise stripped when deriving the proyecto principal label
const MARCAS_TITULO: [&str; 2] = ["analizador de pendientes 00act", "anfeta"];

/// Parse "HH:MM" into minutes since midnight. Tolerates a missing leading
/// zero ("9:30" == "09:30").
pub fn hora_a_minutos(hora: &str) -> Option<u32> {
    let (h, m) = hora.trim().split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

/// Whether an activity occupies the principal reference window (09:30-16:30)
pub fn is_principal_window(actividad: &Actividad) -> bool {
    let inicio = hora_a_minutos(&actividad.hora_inicio);
    let fin = hora_a_minutos(&actividad.hora_fin);

    inicio.is_some()
        && inicio == hora_a_minutos(PRINCIPAL_INICIO)
        && fin == hora_a_minutos(PRINCIPAL_FIN)
}

/// Whether an activity is tracker bookkeeping and must be dropped
pub fn is_excluded(actividad: &Actividad) -> bool {
    actividad
        .titulo
        .to_lowercase()
        .contains(MARCA_TITULO_EXCLUIDO)
        || actividad.status == STATUS_EXCLUIDO
}

/// Whether an activity starts inside the working window (09:00-17:30)
pub fn in_working_hours(actividad: &Actividad) -> bool {
    match hora_a_minutos(&actividad.hora_inicio) {
        Some(min) => {
            let hora = min / 60;
            (LABORAL_HORA_MIN..=LABORAL_HORA_MAX).contains(&hora)
        }
        None => false,
    }
}

/// Drop duplicate activities by id, first occurrence wins
pub fn dedup_activities(actividades: Vec<Actividad>) -> Vec<Actividad> {
    let mut seen = std::collections::HashSet::new();
    actividades
        .into_iter()
        .filter(|a| seen.insert(a.id.clone()))
        .collect()
}

/// Whole days a pendiente has been open (0 when the creation date is unknown)
pub fn dias_pendiente(fecha_creacion: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    match fecha_creacion {
        Some(creada) => (now - creada).num_days().max(0),
        None => 0,
    }
}

/// Derive the display label for the proyecto principal from the activity
/// occupying the reference window.
///
/// Preference order: the activity's project title (when set and meaningful),
/// then the activity title with marker tokens stripped, then the raw title
/// truncated to 50 chars. No principal-window activity at all yields
/// "Sin proyecto específico".
pub fn proyecto_principal(actividades: &[Actividad]) -> String {
    let principal = match actividades.iter().find(|a| is_principal_window(a)) {
        Some(a) => a,
        None => return "Sin proyecto específico".to_string(),
    };

    if let Some(proyecto) = &principal.titulo_proyecto {
        if !proyecto.is_empty() && proyecto != "Sin proyecto" {
            return proyecto.clone();
        }
    }

    let mut limpio = principal.titulo.clone();
    for marca in MARCAS_TITULO {
        limpio = strip_marker(&limpio, marca);
    }
    // Drop any remaining 00-prefixed marker words
    let limpio = limpio
        .split_whitespace()
        .filter(|w| !w.starts_with("00"))
        .collect::<Vec<_>>()
        .join(" ");

    if !limpio.is_empty() {
        return limpio;
    }

    let titulo = &principal.titulo;
    if titulo.chars().count() > 50 {
        let corto: String = titulo.chars().take(50).collect();
        format!("{corto}...")
    } else {
        titulo.clone()
    }
}

/// Remove every case-insensitive occurrence of `marker`, keeping the rest of
/// the title's original casing
fn strip_marker(titulo: &str, marker: &str) -> String {
    // ASCII lowering keeps byte offsets aligned with the original string
    let lower = titulo.to_ascii_lowercase();
    let marker = marker.to_ascii_lowercase();
    let mut out = String::with_capacity(titulo.len());
    let mut pos = 0;

    while let Some(found) = lower[pos..].find(&marker) {
        out.push_str(&titulo[pos..pos + found]);
        pos += found + marker.len();
    }
    out.push_str(&titulo[pos..]);
    out
}

/// Enrich one pendiente with days-open and its priority bucket
pub fn enrich_pendiente(p: &Pendiente, now: DateTime<Utc>) -> PendienteInfo {
    PendienteInfo {
        id: p.id.clone(),
        nombre: p.nombre.clone(),
        terminada: p.terminada,
        confirmada: p.confirmada,
        duracion_min: p.duracion_min.unwrap_or(0),
        fecha_creacion: p.fecha_creacion,
        fecha_fin_terminada: p.fecha_fin_terminada,
        dias_pendiente: dias_pendiente(p.fecha_creacion, now),
        prioridad: Prioridad::from_duration(p.duracion_min),
    }
}

/// Merge the day's reviews into per-activity groupings for the selected
/// activities.
///
/// Only pendientes assigned to `email` count; duplicates (the same pendiente
/// surfacing under several collaborators) are dropped; each surviving
/// pendiente lands in the timed or untimed bucket of its activity. Every
/// selected activity gets an entry even when no review touches it.
pub fn collect_reviews(
    seleccionadas: &[Actividad],
    revisiones: &RevisionesDia,
    email: &str,
    now: DateTime<Utc>,
) -> BTreeMap<String, ActividadRevisiones> {
    let mut por_actividad: BTreeMap<String, ActividadRevisiones> = seleccionadas
        .iter()
        .map(|a| {
            (
                a.id.clone(),
                ActividadRevisiones {
                    actividad: ActividadCard::from_actividad(a, is_principal_window(a)),
                    pendientes_con_tiempo: Vec::new(),
                    pendientes_sin_tiempo: Vec::new(),
                },
            )
        })
        .collect();

    for colaborador in &revisiones.colaboradores {
        for actividad in &colaborador.items.actividades {
            let Some(entry) = por_actividad.get_mut(&actividad.id) else {
                continue;
            };

            for p in &actividad.pendientes {
                let asignado = p.assignees.iter().any(|a| a.name == email);
                if !asignado {
                    continue;
                }

                let ya_existe = entry
                    .pendientes_con_tiempo
                    .iter()
                    .chain(entry.pendientes_sin_tiempo.iter())
                    .any(|existente| existente.id == p.id);
                if ya_existe {
                    continue;
                }

                let info = enrich_pendiente(p, now);
                if info.prioridad.has_time() {
                    entry.pendientes_con_tiempo.push(info);
                } else {
                    entry.pendientes_sin_tiempo.push(info);
                }
            }
        }
    }

    por_actividad
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Assignee, ColaboradorItems, ColaboradorRevisiones};
    use chrono::TimeZone;

    fn actividad(id: &str, titulo: &str, inicio: &str, fin: &str, status: &str) -> Actividad {
        Actividad {
            id: id.to_string(),
            titulo: titulo.to_string(),
            hora_inicio: inicio.to_string(),
            hora_fin: fin.to_string(),
            status: status.to_string(),
            titulo_proyecto: None,
            pendientes: Vec::new(),
        }
    }

    fn pendiente(id: &str, nombre: &str, duracion: Option<u32>, email: &str) -> Pendiente {
        Pendiente {
            id: id.to_string(),
            nombre: nombre.to_string(),
            terminada: false,
            confirmada: false,
            duracion_min: duracion,
            fecha_creacion: None,
            fecha_fin_terminada: None,
            assignees: vec![Assignee {
                name: email.to_string(),
            }],
        }
    }

    #[test]
    fn test_hora_a_minutos() {
        assert_eq!(hora_a_minutos("09:30"), Some(570));
        assert_eq!(hora_a_minutos("9:30"), Some(570));
        assert_eq!(hora_a_minutos(" 16:30 "), Some(990));
        assert_eq!(hora_a_minutos("25:00"), None);
        assert_eq!(hora_a_minutos("sin-hora"), None);
        assert_eq!(hora_a_minutos(""), None);
    }

    #[test]
    fn test_principal_window() {
        assert!(is_principal_window(&actividad(
            "1", "X", "09:30", "16:30", "abierta"
        )));
        // Unpadded hour still matches
        assert!(is_principal_window(&actividad(
            "2", "X", "9:30", "16:30", "abierta"
        )));
        assert!(!is_principal_window(&actividad(
            "3", "X", "14:30", "17:30", "abierta"
        )));
        assert!(!is_principal_window(&actividad("4", "X", "", "", "abierta")));
    }

    #[test]
    fn test_exclusion_rules() {
        assert!(is_excluded(&actividad(
            "1",
            "Reunión 00FTF semanal",
            "10:00",
            "11:00",
            "abierta"
        )));
        assert!(is_excluded(&actividad("2", "Normal", "10:00", "11:00", "00sec")));
        assert!(!is_excluded(&actividad(
            "3", "Normal", "10:00", "11:00", "abierta"
        )));
    }

    #[test]
    fn test_working_hours() {
        assert!(in_working_hours(&actividad("1", "X", "09:00", "10:00", "a")));
        assert!(in_working_hours(&actividad("2", "X", "17:30", "18:00", "a")));
        assert!(!in_working_hours(&actividad("3", "X", "08:59", "10:00", "a")));
        assert!(!in_working_hours(&actividad("4", "X", "18:00", "19:00", "a")));
        assert!(!in_working_hours(&actividad("5", "X", "", "", "a")));
    }

    #[test]
    fn test_dedup_activities() {
        let list = vec![
            actividad("a", "primera", "09:00", "10:00", "x"),
            actividad("a", "duplicada", "09:00", "10:00", "x"),
            actividad("b", "otra", "10:00", "11:00", "x"),
        ];
        let deduped = dedup_activities(list);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].titulo, "primera");
    }

    #[test]
    fn test_dias_pendiente() {
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap();
        let creada = Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap();
        assert_eq!(dias_pendiente(Some(creada), now), 5);
        assert_eq!(dias_pendiente(None, now), 0);
        // Clock skew never yields negative ages
        let futura = Utc.with_ymd_and_hms(2026, 8, 7, 9, 0, 0).unwrap();
        assert_eq!(dias_pendiente(Some(futura), now), 0);
    }

    #[test]
    fn test_proyecto_principal_from_project_title() {
        let mut a = actividad("1", "cualquier titulo", "09:30", "16:30", "abierta");
        a.titulo_proyecto = Some("WorkLight Backend".to_string());
        assert_eq!(proyecto_principal(&[a]), "WorkLight Backend");
    }

    #[test]
    fn test_proyecto_principal_strips_markers() {
        let a = actividad(
            "1",
            "analizador de pendientes 00act migracion notion",
            "09:30",
            "16:30",
            "abierta",
        );
        assert_eq!(proyecto_principal(&[a]), "migracion notion");
    }

    #[test]
    fn test_proyecto_principal_ignores_sin_proyecto_placeholder() {
        let mut a = actividad("1", "anfeta respaldo semanal", "09:30", "16:30", "abierta");
        a.titulo_proyecto = Some("Sin proyecto".to_string());
        assert_eq!(proyecto_principal(&[a]), "respaldo semanal");
    }

    #[test]
    fn test_proyecto_principal_without_window() {
        let a = actividad("1", "X", "10:00", "11:00", "abierta");
        assert_eq!(proyecto_principal(&[a]), "Sin proyecto específico");
    }

    #[test]
    fn test_collect_reviews_buckets_and_dedups() {
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap();
        let seleccionadas = vec![actividad("act-1", "Principal", "09:30", "16:30", "abierta")];

        let mut revisada = actividad("act-1", "Principal", "09:30", "16:30", "abierta");
        revisada.pendientes = vec![
            pendiente("p-1", "rutas API", Some(80), "ana@wl.mx"),
            pendiente("p-2", "sin estimar", None, "ana@wl.mx"),
            pendiente("p-3", "de otra persona", Some(45), "otro@wl.mx"),
        ];

        // Same pendiente surfacing under a second collaborator
        let mut repetida = actividad("act-1", "Principal", "09:30", "16:30", "abierta");
        repetida.pendientes = vec![pendiente("p-1", "rutas API", Some(80), "ana@wl.mx")];

        let revisiones = RevisionesDia {
            colaboradores: vec![
                ColaboradorRevisiones {
                    items: ColaboradorItems {
                        actividades: vec![revisada],
                    },
                },
                ColaboradorRevisiones {
                    items: ColaboradorItems {
                        actividades: vec![repetida],
                    },
                },
            ],
        };

        let agrupadas = collect_reviews(&seleccionadas, &revisiones, "ana@wl.mx", now);
        let entry = &agrupadas["act-1"];

        assert_eq!(entry.pendientes_con_tiempo.len(), 1);
        assert_eq!(entry.pendientes_sin_tiempo.len(), 1);
        assert_eq!(entry.pendientes_con_tiempo[0].prioridad, Prioridad::Alta);
        assert_eq!(entry.tiempo_total_min(), 80);
        assert_eq!(entry.alta_prioridad(), 1);
    }

    #[test]
    fn test_collect_reviews_activity_without_reviews_keeps_entry() {
        let now = Utc::now();
        let seleccionadas = vec![actividad("act-9", "Sola", "10:00", "11:00", "abierta")];
        let agrupadas =
            collect_reviews(&seleccionadas, &RevisionesDia::default(), "ana@wl.mx", now);
        assert!(agrupadas.contains_key("act-9"));
        assert!(agrupadas["act-9"].pendientes_con_tiempo.is_empty());
    }
}
