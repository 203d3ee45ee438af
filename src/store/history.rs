//! Chat history store: one document per (user, session).
//!
//! Holds the running conversation, the task-validation state the explanation
//! flow walks through, and a snapshot of the last analysis. Also owns daily
//! session-id generation, since disambiguating a new id requires looking at
//! the sessions already stored for the day.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rocksdb::DB;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::domain::AnalysisSnapshot;

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MsgRole {
    Usuario,
    Bot,
}

/// One chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mensaje {
    pub role: MsgRole,
    pub contenido: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tipo_mensaje: Option<String>,
}

impl Mensaje {
    pub fn new(role: MsgRole, contenido: impl Into<String>) -> Self {
        Self {
            role,
            contenido: contenido.into(),
            timestamp: Utc::now(),
            tipo_mensaje: None,
        }
    }

    pub fn with_tipo(mut self, tipo: &str) -> Self {
        self.tipo_mensaje = Some(tipo.to_string());
        self
    }
}

/// Validation state for one task surfaced by an analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TareaEstado {
    pub task_id: String,
    pub task_name: String,
    pub actividad_titulo: String,
    #[serde(default)]
    pub explicada: bool,
    #[serde(default)]
    pub validada: bool,
    #[serde(default)]
    pub explicacion: String,
    #[serde(default)]
    pub ultimo_intento: Option<DateTime<Utc>>,
}

/// One history document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDoc {
    pub user_id: String,
    pub session_id: String,
    #[serde(default)]
    pub mensajes: Vec<Mensaje>,
    #[serde(default)]
    pub tareas_estado: Vec<TareaEstado>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<AnalysisSnapshot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HistoryDoc {
    fn new(user_id: &str, session_id: &str) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            mensajes: Vec::new(),
            tareas_estado: Vec::new(),
            data: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Build the base daily session id: `Act_{user}_{YYYY}_{MM}_{DD}`.
/// Characters outside `[A-Za-z0-9_]` in the user id are flattened to `_`.
pub fn session_base(user_id: &str, date: NaiveDate) -> String {
    let user: String = user_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    format!("Act_{}_{}", user, date.format("%Y_%m_%d"))
}

/// Storage and session-id engine for chat histories
pub struct HistoryStore {
    db: Arc<DB>,
}

impl HistoryStore {
    pub fn new(storage_path: &Path) -> Result<Self> {
        let db = super::open_db(storage_path, "history")?;
        tracing::info!("history store initialized");
        Ok(Self { db })
    }

    fn key(user_id: &str, session_id: &str) -> String {
        format!("{user_id}:{session_id}")
    }

    fn put(&self, doc: &HistoryDoc) -> Result<()> {
        let key = Self::key(&doc.user_id, &doc.session_id);
        let value = serde_json::to_vec(doc).context("serializing history doc")?;
        self.db
            .put(key.as_bytes(), &value)
            .context("storing history doc")?;
        Ok(())
    }

    /// Load one history document
    pub fn get(&self, user_id: &str, session_id: &str) -> Result<Option<HistoryDoc>> {
        let key = Self::key(user_id, session_id);
        match self.db.get(key.as_bytes()).context("reading history doc")? {
            Some(bytes) => {
                let doc = serde_json::from_slice(&bytes).context("deserializing history doc")?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    fn get_or_create(&self, user_id: &str, session_id: &str) -> Result<HistoryDoc> {
        Ok(self
            .get(user_id, session_id)?
            .unwrap_or_else(|| HistoryDoc::new(user_id, session_id)))
    }

    /// Append one message, creating the session document when absent
    pub fn push_message(
        &self,
        user_id: &str,
        session_id: &str,
        role: MsgRole,
        contenido: &str,
    ) -> Result<HistoryDoc> {
        if user_id.is_empty() || session_id.is_empty() || contenido.is_empty() {
            anyhow::bail!("missing fields for history message");
        }

        let mut doc = self.get_or_create(user_id, session_id)?;
        doc.mensajes.push(Mensaje::new(role, contenido));
        doc.updated_at = Utc::now();
        self.put(&doc)?;
        Ok(doc)
    }

    /// Append several messages in one write
    pub fn append_messages(
        &self,
        user_id: &str,
        session_id: &str,
        mensajes: Vec<Mensaje>,
    ) -> Result<HistoryDoc> {
        let mut doc = self.get_or_create(user_id, session_id)?;
        doc.mensajes.extend(mensajes);
        doc.updated_at = Utc::now();
        self.put(&doc)?;
        Ok(doc)
    }

    /// Record a full analysis run: question + answer messages, the fresh
    /// task-validation list, and the response snapshot.
    pub fn record_analysis(
        &self,
        user_id: &str,
        session_id: &str,
        question: &str,
        answer: &str,
        snapshot: AnalysisSnapshot,
        tareas: Vec<TareaEstado>,
    ) -> Result<HistoryDoc> {
        let mut doc = self.get_or_create(user_id, session_id)?;
        doc.mensajes
            .push(Mensaje::new(MsgRole::Usuario, question).with_tipo("texto"));
        doc.mensajes
            .push(Mensaje::new(MsgRole::Bot, answer).with_tipo("analisis_inicial"));
        doc.tareas_estado = tareas;
        doc.data = Some(snapshot);
        doc.updated_at = Utc::now();
        self.put(&doc)?;
        Ok(doc)
    }

    /// Mark a task's explanation as validated
    pub fn mark_validated(
        &self,
        user_id: &str,
        session_id: &str,
        task_name: &str,
        explicacion: &str,
    ) -> Result<bool> {
        self.update_task(user_id, session_id, task_name, |tarea| {
            tarea.validada = true;
            tarea.explicada = true;
            tarea.explicacion = explicacion.to_string();
            tarea.ultimo_intento = Some(Utc::now());
        })
    }

    /// Record a failed explanation attempt
    pub fn touch_attempt(&self, user_id: &str, session_id: &str, task_name: &str) -> Result<bool> {
        self.update_task(user_id, session_id, task_name, |tarea| {
            tarea.ultimo_intento = Some(Utc::now());
        })
    }

    fn update_task<F>(
        &self,
        user_id: &str,
        session_id: &str,
        task_name: &str,
        mutate: F,
    ) -> Result<bool>
    where
        F: FnOnce(&mut TareaEstado),
    {
        let Some(mut doc) = self.get(user_id, session_id)? else {
            return Ok(false);
        };

        let Some(tarea) = doc
            .tareas_estado
            .iter_mut()
            .find(|t| t.task_name == task_name)
        else {
            return Ok(false);
        };

        mutate(tarea);
        doc.updated_at = Utc::now();
        self.put(&doc)?;
        Ok(true)
    }

    /// All history documents for a user, newest first, with total count
    pub fn list_user(
        &self,
        user_id: &str,
        limit: usize,
        skip: usize,
    ) -> Result<(Vec<HistoryDoc>, usize)> {
        let mut docs = self.user_docs(user_id)?;
        docs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let total = docs.len();
        let page = docs.into_iter().skip(skip).take(limit).collect();
        Ok((page, total))
    }

    /// Delete one session's history; false when nothing matched
    pub fn delete(&self, user_id: &str, session_id: &str) -> Result<bool> {
        let key = Self::key(user_id, session_id);
        if self.db.get(key.as_bytes()).context("reading history doc")?.is_none() {
            return Ok(false);
        }
        self.db
            .delete(key.as_bytes())
            .context("deleting history doc")?;
        Ok(true)
    }

    // =========================================================================
    // DAILY SESSION IDS
    // =========================================================================

    /// The session id all of today's messages land in: the latest existing
    /// session for the day, or the bare base when the day is fresh.
    pub fn daily_session_id(&self, user_id: &str, date: NaiveDate) -> Result<String> {
        Ok(self
            .latest_session_id(user_id, date)?
            .unwrap_or_else(|| session_base(user_id, date)))
    }

    /// Generate an id for a brand-new session today, disambiguating against
    /// existing ones with a best-effort incrementing suffix.
    pub fn next_session_id(&self, user_id: &str, date: NaiveDate) -> Result<String> {
        let base = session_base(user_id, date);

        match self.latest_session_id(user_id, date)? {
            None => Ok(base),
            Some(last) if last == base => Ok(format!("{base}_2")),
            Some(last) => {
                let n = last
                    .strip_prefix(&format!("{base}_"))
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(1);
                Ok(format!("{base}_{}", n + 1))
            }
        }
    }

    /// Whether no session exists yet for the day
    pub fn is_first_session_of_day(&self, user_id: &str, date: NaiveDate) -> Result<bool> {
        Ok(self.latest_session_id(user_id, date)?.is_none())
    }

    /// Most recently created session id matching today's base
    fn latest_session_id(&self, user_id: &str, date: NaiveDate) -> Result<Option<String>> {
        let base = session_base(user_id, date);

        Ok(self
            .user_docs(user_id)?
            .into_iter()
            .filter(|d| d.session_id.starts_with(&base))
            .max_by_key(|d| d.created_at)
            .map(|d| d.session_id))
    }

    fn user_docs(&self, user_id: &str) -> Result<Vec<HistoryDoc>> {
        let prefix = format!("{user_id}:");
        let mut docs = Vec::new();

        let iter = self.db.prefix_iterator(prefix.as_bytes());
        for item in iter {
            let (key, value) = item.context("iterating history docs")?;
            let Ok(key_str) = std::str::from_utf8(&key) else {
                continue;
            };
            if !key_str.starts_with(&prefix) {
                break;
            }

            match serde_json::from_slice::<HistoryDoc>(&value) {
                Ok(doc) => docs.push(doc),
                Err(e) => tracing::warn!("skipping corrupt history doc {}: {}", key_str, e),
            }
        }

        Ok(docs)
    }
}
