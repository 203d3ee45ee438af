//! Daily report snapshots.
//!
//! One row per unfinished pendiente that carries a reason, keyed by
//! `{fecha}:{user}:{actividad}:{pendiente}` so regenerating a day's report
//! is a prefix wipe followed by a batch insert.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rocksdb::{WriteBatch, DB};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use super::EstadoPendiente;
use crate::domain::Prioridad;

/// One report row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub user_id: String,
    pub proyecto_nombre: String,
    pub actividad_id: String,
    pub pendiente_id: String,
    pub pendiente_nombre: String,
    pub estado_final: EstadoPendiente,
    pub motivo_no_completado: String,
    pub prioridad: Prioridad,
    pub duracion_min: u32,
    pub fecha_reporte: NaiveDate,
}

/// Storage engine for daily report snapshots
pub struct ReportStore {
    db: Arc<DB>,
}

impl ReportStore {
    pub fn new(storage_path: &Path) -> Result<Self> {
        let db = super::open_db(storage_path, "reports")?;
        tracing::info!("report store initialized");
        Ok(Self { db })
    }

    fn key(row: &ReportRow) -> String {
        format!(
            "{}:{}:{}:{}",
            row.fecha_reporte.format("%Y-%m-%d"),
            row.user_id,
            row.actividad_id,
            row.pendiente_id
        )
    }

    fn date_prefix(date: NaiveDate) -> String {
        format!("{}:", date.format("%Y-%m-%d"))
    }

    /// Delete every row for one date; returns how many were removed
    pub fn wipe_date(&self, date: NaiveDate) -> Result<usize> {
        let prefix = Self::date_prefix(date);
        let mut batch = WriteBatch::default();
        let mut removed = 0;

        for item in self.db.prefix_iterator(prefix.as_bytes()) {
            let (key, _) = item.context("iterating report rows")?;
            let Ok(key_str) = std::str::from_utf8(&key) else {
                continue;
            };
            if !key_str.starts_with(&prefix) {
                break;
            }
            batch.delete(&key);
            removed += 1;
        }

        if removed > 0 {
            self.db.write(batch).context("wiping report rows")?;
        }
        Ok(removed)
    }

    /// Insert a batch of rows
    pub fn insert(&self, rows: &[ReportRow]) -> Result<()> {
        let mut batch = WriteBatch::default();
        for row in rows {
            let value = serde_json::to_vec(row).context("serializing report row")?;
            batch.put(Self::key(row).as_bytes(), &value);
        }
        self.db.write(batch).context("storing report rows")?;
        Ok(())
    }

    /// Every row for one date
    pub fn rows_for_date(&self, date: NaiveDate) -> Result<Vec<ReportRow>> {
        let prefix = Self::date_prefix(date);
        let mut rows = Vec::new();

        for item in self.db.prefix_iterator(prefix.as_bytes()) {
            let (key, value) = item.context("iterating report rows")?;
            let Ok(key_str) = std::str::from_utf8(&key) else {
                continue;
            };
            if !key_str.starts_with(&prefix) {
                break;
            }

            match serde_json::from_slice::<ReportRow>(&value) {
                Ok(row) => rows.push(row),
                Err(e) => tracing::warn!("skipping corrupt report row {}: {}", key_str, e),
            }
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (ReportStore, TempDir) {
        let dir = TempDir::new().expect("create temp dir");
        let store = ReportStore::new(dir.path()).expect("open report store");
        (store, dir)
    }

    fn row(user: &str, pendiente: &str, fecha: NaiveDate) -> ReportRow {
        ReportRow {
            user_id: user.to_string(),
            proyecto_nombre: "WorkLight".to_string(),
            actividad_id: "act-1".to_string(),
            pendiente_id: pendiente.to_string(),
            pendiente_nombre: "rutas API".to_string(),
            estado_final: EstadoPendiente::Pendiente,
            motivo_no_completado: "bloqueado".to_string(),
            prioridad: Prioridad::Alta,
            duracion_min: 80,
            fecha_reporte: fecha,
        }
    }

    #[test]
    fn test_insert_wipe_roundtrip() {
        let (store, _dir) = store();
        let hoy = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        let ayer = NaiveDate::from_ymd_opt(2026, 8, 5).unwrap();

        store
            .insert(&[row("1", "p-1", hoy), row("1", "p-2", hoy), row("2", "p-3", ayer)])
            .unwrap();

        assert_eq!(store.rows_for_date(hoy).unwrap().len(), 2);
        assert_eq!(store.rows_for_date(ayer).unwrap().len(), 1);

        assert_eq!(store.wipe_date(hoy).unwrap(), 2);
        assert!(store.rows_for_date(hoy).unwrap().is_empty());
        // Other days untouched
        assert_eq!(store.rows_for_date(ayer).unwrap().len(), 1);
        // Idempotent
        assert_eq!(store.wipe_date(hoy).unwrap(), 0);
    }

    #[test]
    fn test_reinsert_same_key_overwrites() {
        let (store, _dir) = store();
        let hoy = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();

        store.insert(&[row("1", "p-1", hoy)]).unwrap();
        store.insert(&[row("1", "p-1", hoy)]).unwrap();
        assert_eq!(store.rows_for_date(hoy).unwrap().len(), 1);
    }
}
