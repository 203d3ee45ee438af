//! Application state: stores, outbound clients, and config.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::llm::AiService;
use crate::store::{ActivityCacheStore, HistoryStore, ReportStore};
use crate::tracker::TrackerClient;

/// Application state type alias
pub type AppState = Arc<AppContext>;

/// Central state for the server
pub struct AppContext {
    pub config: ServerConfig,
    pub history: HistoryStore,
    pub activities: ActivityCacheStore,
    pub reports: ReportStore,
    pub tracker: TrackerClient,
    pub ai: AiService,
}

impl AppContext {
    /// Open the stores and build the outbound clients
    pub fn new(config: ServerConfig) -> Result<Self> {
        let history = HistoryStore::new(&config.storage_path)?;
        let activities = ActivityCacheStore::new(&config.storage_path)?;
        let reports = ReportStore::new(&config.storage_path)?;
        let tracker = TrackerClient::new(&config.tracker_base_url, config.http_timeout_secs);
        let ai = AiService::from_config(&config);

        Ok(Self {
            config,
            history,
            activities,
            reports,
            tracker,
            ai,
        })
    }

    /// The service's notion of "today" (UTC calendar day)
    pub fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}
