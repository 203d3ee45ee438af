//! Per-user cache of activities and their pendientes.
//!
//! One document per user mirroring what the assistant last saw for that
//! user's day: the proyecto principal label plus each activity's pendientes
//! with their local completion state. Upserts follow the document-store
//! conventions of the original data: replace-in-place when the activity
//! exists, append otherwise, and point updates for single pendientes.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rocksdb::DB;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::domain::Prioridad;

/// Local completion state of a cached pendiente
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstadoPendiente {
    Pendiente,
    Completado,
    Cancelado,
}

impl Default for EstadoPendiente {
    fn default() -> Self {
        EstadoPendiente::Pendiente
    }
}

/// One cached pendiente
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedPendiente {
    pub pendiente_id: String,
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub descripcion: String,
    #[serde(default)]
    pub estado: EstadoPendiente,
    #[serde(default)]
    pub duracion_min: u32,
    #[serde(default = "default_prioridad")]
    pub prioridad: Prioridad,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motivo_no_completado: Option<String>,
    #[serde(default = "Utc::now")]
    pub fecha_creacion: DateTime<Utc>,
}

fn default_prioridad() -> Prioridad {
    Prioridad::Baja
}

/// One cached activity with its pendientes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedActividad {
    pub actividad_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub titulo: Option<String>,
    #[serde(default)]
    pub estado: String,
    #[serde(default)]
    pub pendientes: Vec<CachedPendiente>,
}

/// The per-user cache document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProyectoDoc {
    pub user_id: String,
    /// Proyecto principal label captured at insert time
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub actividades: Vec<CachedActividad>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An explanation entry to fold into the cache
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplicacionEntry {
    pub task_id: String,
    pub task_name: String,
    pub explanation: String,
    #[serde(default)]
    pub confirmed: bool,
    pub activity_title: String,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub priority: Option<Prioridad>,
}

/// Storage engine for the per-user activity cache
pub struct ActivityCacheStore {
    db: Arc<DB>,
}

impl ActivityCacheStore {
    pub fn new(storage_path: &Path) -> Result<Self> {
        let db = super::open_db(storage_path, "activities")?;
        tracing::info!("activity cache store initialized");
        Ok(Self { db })
    }

    fn put(&self, doc: &ProyectoDoc) -> Result<()> {
        let value = serde_json::to_vec(doc).context("serializing activity cache doc")?;
        self.db
            .put(doc.user_id.as_bytes(), &value)
            .context("storing activity cache doc")?;
        Ok(())
    }

    /// Load one user's cache document
    pub fn get(&self, user_id: &str) -> Result<Option<ProyectoDoc>> {
        match self
            .db
            .get(user_id.as_bytes())
            .context("reading activity cache doc")?
        {
            Some(bytes) => {
                let doc =
                    serde_json::from_slice(&bytes).context("deserializing activity cache doc")?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    fn get_or_create(&self, user_id: &str, nombre: &str) -> Result<ProyectoDoc> {
        Ok(self.get(user_id)?.unwrap_or_else(|| {
            let now = Utc::now();
            ProyectoDoc {
                user_id: user_id.to_string(),
                nombre: nombre.to_string(),
                actividades: Vec::new(),
                created_at: now,
                updated_at: now,
            }
        }))
    }

    /// Ensure the user document exists. `nombre` is only applied on insert
    /// (set-on-insert semantics); an existing label is left untouched.
    pub fn ensure_user(&self, user_id: &str, nombre: &str) -> Result<()> {
        if self.get(user_id)?.is_none() {
            self.put(&self.get_or_create(user_id, nombre)?)?;
        }
        Ok(())
    }

    /// Replace an activity's pendientes in place, appending the activity if
    /// it is new. Pendientes are deduplicated by id, first occurrence wins.
    pub fn replace_activity_pendientes(
        &self,
        user_id: &str,
        actividad_id: &str,
        titulo: Option<&str>,
        pendientes: Vec<CachedPendiente>,
    ) -> Result<()> {
        let pendientes = dedup_pendientes(pendientes);
        let mut doc = self.get_or_create(user_id, "")?;

        match doc
            .actividades
            .iter()
            .position(|a| a.actividad_id == actividad_id)
        {
            Some(idx) => {
                let actividad = &mut doc.actividades[idx];
                actividad.pendientes = pendientes;
                actividad.estado = "En proceso".to_string();
                if titulo.is_some() {
                    actividad.titulo = titulo.map(str::to_string);
                }
            }
            None => doc.actividades.push(CachedActividad {
                actividad_id: actividad_id.to_string(),
                titulo: titulo.map(str::to_string),
                estado: "En proceso".to_string(),
                pendientes,
            }),
        }

        doc.updated_at = Utc::now();
        self.put(&doc)
    }

    /// Point-update of one pendiente's completion state (and the reason it
    /// was not completed). False when no such pendiente is cached.
    pub fn confirm_estado(
        &self,
        user_id: &str,
        actividad_id: &str,
        pendiente_id: &str,
        estado: EstadoPendiente,
        motivo: Option<&str>,
    ) -> Result<bool> {
        let Some(mut doc) = self.get(user_id)? else {
            return Ok(false);
        };

        let Some(pendiente) = doc
            .actividades
            .iter_mut()
            .find(|a| a.actividad_id == actividad_id)
            .and_then(|a| {
                a.pendientes
                    .iter_mut()
                    .find(|p| p.pendiente_id == pendiente_id)
            })
        else {
            return Ok(false);
        };

        pendiente.estado = estado;
        pendiente.motivo_no_completado = motivo.map(str::to_string);

        doc.updated_at = Utc::now();
        self.put(&doc)?;
        Ok(true)
    }

    /// Fold one explanation into the cache. The activity is matched by
    /// title (explanations come from the chat flow, which only knows
    /// titles); a missing activity or pendiente is created.
    pub fn upsert_explicacion(&self, user_id: &str, entry: &ExplicacionEntry) -> Result<()> {
        let mut doc = self.get_or_create(user_id, "")?;

        let estado = if entry.confirmed {
            EstadoPendiente::Completado
        } else {
            EstadoPendiente::Pendiente
        };

        let act_idx = match doc.actividades.iter().position(|a| {
            a.titulo.as_deref() == Some(entry.activity_title.as_str())
                || a.actividad_id == entry.activity_title
        }) {
            Some(idx) => idx,
            None => {
                doc.actividades.push(CachedActividad {
                    actividad_id: entry.activity_title.clone(),
                    titulo: Some(entry.activity_title.clone()),
                    estado: "En proceso".to_string(),
                    pendientes: Vec::new(),
                });
                doc.actividades.len() - 1
            }
        };
        let actividad = &mut doc.actividades[act_idx];

        match actividad
            .pendientes
            .iter()
            .position(|p| p.pendiente_id == entry.task_id)
        {
            Some(idx) => {
                let p = &mut actividad.pendientes[idx];
                p.descripcion = entry.explanation.clone();
                p.estado = estado;
                if let Some(duracion) = entry.duration {
                    p.duracion_min = duracion;
                }
                if let Some(prioridad) = entry.priority {
                    p.prioridad = prioridad;
                }
            }
            None => actividad.pendientes.push(CachedPendiente {
                pendiente_id: entry.task_id.clone(),
                nombre: entry.task_name.clone(),
                descripcion: entry.explanation.clone(),
                estado,
                duracion_min: entry.duration.unwrap_or(0),
                prioridad: entry.priority.unwrap_or(Prioridad::Baja),
                motivo_no_completado: None,
                fecha_creacion: Utc::now(),
            }),
        }

        doc.updated_at = Utc::now();
        self.put(&doc)
    }

    /// Every cached document (the daily report walks all users)
    pub fn all_docs(&self) -> Result<Vec<ProyectoDoc>> {
        let mut docs = Vec::new();

        for item in self.db.iterator(rocksdb::IteratorMode::Start) {
            let (key, value) = item.context("iterating activity cache")?;
            match serde_json::from_slice::<ProyectoDoc>(&value) {
                Ok(doc) => docs.push(doc),
                Err(e) => tracing::warn!(
                    "skipping corrupt activity cache doc {}: {}",
                    String::from_utf8_lossy(&key),
                    e
                ),
            }
        }

        Ok(docs)
    }
}

fn dedup_pendientes(pendientes: Vec<CachedPendiente>) -> Vec<CachedPendiente> {
    let mut seen = std::collections::HashSet::new();
    pendientes
        .into_iter()
        .filter(|p| seen.insert(p.pendiente_id.clone()))
        .collect()
}
