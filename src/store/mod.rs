//! Document stores backed by RocksDB.
//!
//! Three stores, one RocksDB each, documents as serde_json values keyed by
//! `{user_id}` or `{user_id}:{…}` so per-user reads are prefix scans:
//! - `history`: per-session chat history plus task-validation state;
//! - `activities`: per-user cache of activities and their pendientes;
//! - `reports`: daily snapshot rows of unfinished pendientes.

pub mod activities;
pub mod history;
pub mod reports;

use anyhow::{Context, Result};
use rocksdb::{Options, DB};
use std::path::Path;
use std::sync::Arc;

pub use activities::{
    ActivityCacheStore, CachedActividad, CachedPendiente, EstadoPendiente, ExplicacionEntry,
    ProyectoDoc,
};
pub use history::{HistoryDoc, HistoryStore, Mensaje, MsgRole, TareaEstado};
pub use reports::{ReportRow, ReportStore};

/// Shared RocksDB tuning for all stores
fn db_options() -> Options {
    let mut opts = Options::default();
    opts.create_if_missing(true);
    opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
    opts.set_max_write_buffer_number(2);
    opts.set_write_buffer_size(16 * 1024 * 1024); // 16MB
    opts
}

/// Open one store database under the base storage path
pub(crate) fn open_db(base: &Path, name: &str) -> Result<Arc<DB>> {
    std::fs::create_dir_all(base)
        .with_context(|| format!("creating storage dir {}", base.display()))?;

    let db = DB::open(&db_options(), base.join(name))
        .with_context(|| format!("opening {name} DB"))?;

    Ok(Arc::new(db))
}
