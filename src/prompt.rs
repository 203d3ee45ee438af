//! Prompt assembly for the assistant's LLM calls.
//!
//! The prompts are product copy (Spanish) and their structure is part of the
//! assistant's observable behavior: the summary style the frontend renders
//! depends on the instruction blocks below. Keep edits conservative.

use std::fmt::Write;

use crate::domain::{ActividadRevisiones, AnalysisMetrics};

/// Default question when the frontend sends none
pub const PREGUNTA_DEFAULT: &str =
    "¿Qué actividades y revisiones tengo hoy? ¿Qué me recomiendas priorizar?";

/// Question marker that switches the analysis to the full-day view
pub const MARCADOR_OTROS_HORARIOS: &str = "otros horarios";

/// Prompt for the full-day analysis: every selected activity with its timed
/// and untimed pendientes.
pub fn build_full_day_prompt(
    first_name: &str,
    email: &str,
    proyecto_principal: &str,
    mensaje_horario: &str,
    metrics: &AnalysisMetrics,
    revisiones: &[&ActividadRevisiones],
    question: &str,
) -> String {
    let mut detalle = String::new();
    for (index, rev) in revisiones.iter().enumerate() {
        let con_tiempo = &rev.pendientes_con_tiempo;
        let sin_tiempo = &rev.pendientes_sin_tiempo;
        let indicador = if rev.actividad.es_principal {
            " [PROYECTO PRINCIPAL]"
        } else {
            ""
        };

        let _ = write!(
            detalle,
            "\n{}. {} - {}{}\n   • Proyecto: {}\n   • Estado: {}\n   • Total tareas: {} ({} con tiempo, {} sin tiempo)",
            index + 1,
            rev.actividad.horario,
            rev.actividad.titulo,
            indicador,
            rev.actividad.proyecto,
            rev.actividad.status,
            con_tiempo.len() + sin_tiempo.len(),
            con_tiempo.len(),
            sin_tiempo.len(),
        );

        if !con_tiempo.is_empty() {
            detalle.push_str("\n   • TAREAS CON TIEMPO:");
            for (i, tarea) in con_tiempo.iter().enumerate() {
                let _ = write!(
                    detalle,
                    "\n     {}. {}\n        - {} min | Prioridad: {} | Dias: {}d",
                    i + 1,
                    tarea.nombre,
                    tarea.duracion_min,
                    tarea.prioridad,
                    tarea.dias_pendiente,
                );
            }
        }

        if !sin_tiempo.is_empty() {
            detalle.push_str("\n   • TAREAS SIN TIEMPO:");
            for (i, tarea) in sin_tiempo.iter().enumerate() {
                let _ = write!(
                    detalle,
                    "\n     {}. {} ({}d pendiente)",
                    i + 1,
                    tarea.nombre,
                    tarea.dias_pendiente,
                );
            }
        }

        if con_tiempo.is_empty() && sin_tiempo.is_empty() {
            detalle.push_str("\n   • Sin tareas asignadas");
        }
        detalle.push('\n');
    }

    format!(
        r#"Eres un asistente que analiza todas las actividades del día.
Usuario: {first_name} ({email})
Proyecto principal asignado: "{proyecto_principal}"

Contexto: Mostrando todas las actividades del día, incluyendo las que tienen y no tienen tiempo estimado.

{mensaje_horario}
Total actividades: {total_actividades}
Total tareas: {total_tareas} ({con_tiempo} con tiempo, {sin_tiempo} sin tiempo)
Tiempo estimado de las tareas con tiempo: {tiempo}

PROYECTO PRINCIPAL DEL DÍA (09:30-16:30):
"{proyecto_principal}"

DETALLE DE ACTIVIDADES:
{detalle}
PREGUNTA DEL USUARIO: "{question}"

INSTRUCCIONES ESTRICTAS DE RESPUESTA:
1. COMIENZA mencionando el proyecto principal: "Tu proyecto principal es '{proyecto_principal}'"
2. Da un resumen general de todas las actividades mencionando el proyecto principal
3. Diles si están al día o menciona pendientes importantes del proyecto principal
4. Lista los puntos principales con viñetas relacionadas con el proyecto principal
5. Al final da sugerencias específicas: "Te recomiendo que empieces con [lista de tareas DEL PROYECTO PRINCIPAL] porque [razón]"
6. Pregunta si están de acuerdo con la sugerencia
7. Se natural y directo
8. NO uses emojis ni formato especial
9. Relaciona TODO con el proyecto principal"#,
        total_actividades = metrics.total_actividades,
        total_tareas = metrics.total_tareas(),
        con_tiempo = metrics.tareas_con_tiempo,
        sin_tiempo = metrics.tareas_sin_tiempo,
        tiempo = metrics.tiempo_formateado(),
    )
}

/// Prompt for the focused analysis: only timed pendientes of the proyecto
/// principal, capped at four lines of answer.
pub fn build_focused_prompt(
    first_name: &str,
    email: &str,
    proyecto_principal: &str,
    metrics: &AnalysisMetrics,
    revisiones: &[&ActividadRevisiones],
    question: &str,
) -> String {
    let mut lineas = String::new();
    for rev in revisiones {
        for tarea in &rev.pendientes_con_tiempo {
            let _ = write!(
                lineas,
                "• {} - {}min ({}, {}d)\n",
                tarea.nombre, tarea.duracion_min, tarea.prioridad, tarea.dias_pendiente,
            );
        }
    }

    format!(
        r#"Eres un asistente que analiza actividades del día con tiempo asignado.
Usuario: {first_name} ({email})
Proyecto principal asignado: "{proyecto_principal}"

TAREAS CON TIEMPO ASIGNADO para tu proyecto "{proyecto_principal}":
Total: {con_tiempo} tareas | Tiempo total: {tiempo}
Tareas alta prioridad: {alta}

{lineas}
PREGUNTA: "{question}"

INSTRUCCIONES ESTRICTAS DE RESPUESTA:
1. COMIENZA mencionando el proyecto principal: "Para tu proyecto '{proyecto_principal}'"
2. Enfócate SOLO en las tareas con tiempo asignado de este proyecto
3. Da prioridad principal basada en el proyecto
4. Recomendación breve relacionada con el proyecto
5. Pregunta final corta relacionada con el proyecto
6. MÁXIMO 4 renglones
7. SIN emojis
8. SIN formato especial"#,
        con_tiempo = metrics.tareas_con_tiempo,
        tiempo = metrics.tiempo_formateado(),
        alta = metrics.tareas_alta_prioridad,
    )
}

/// Prompt that checks whether a user's explanation is about a given task.
/// The model must answer with a single JSON object.
pub fn build_validation_prompt(activity_title: &str, task_name: &str, explanation: &str) -> String {
    // Commas in the title confuse the model's quoting; strip them.
    let titulo_limpio = activity_title.replace(',', " ");

    format!(
        r#"Eres un asistente que verifica si un comentario está relacionado
con una tarea específica o con algo necesario para poder trabajar en ella hoy.

CONTEXTO:
- Actividad: "{titulo_limpio}"
- Tarea: "{task_name}"
- Comentario del usuario: "{explanation}"

INSTRUCCIONES:
- Considera relacionado si el comentario:
  - Describe acciones sobre la tarea, o
  - Menciona algo necesario para poder avanzar en ella hoy
    (por ejemplo: herramientas, equipo, bloqueos prácticos).
- No evalúes calidad, detalle ni redacción.
- Comentarios breves o informales son aceptables.
- Solo marca como no relacionado si habla de un tema totalmente distinto
  o no se entiende ninguna intención.

RESPONDE ÚNICAMENTE EN JSON:
{{
  "esDelTema": true o false,
  "razon": "Frase corta (máx 10 palabras)",
  "sugerencia": "Pregunta corta para orientar al usuario (vacía si esDelTema es true)"
}}"#
    )
}

/// Extract the first JSON object from potentially messy LLM output
/// (markdown fences, prose around the object).
pub fn extract_json(output: &str) -> String {
    let cleaned = output
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    if let Some(start) = cleaned.find('{') {
        let mut depth = 0;
        let mut end = start;
        for (i, c) in cleaned[start..].char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = start + i + c.len_utf8();
                        break;
                    }
                }
                _ => {}
            }
        }
        cleaned[start..end].to_string()
    } else {
        cleaned.to_string()
    }
}
