use crate::error::{AppError, Result};
use crate::services::{SharedConfig, open_db};
use quitpath_core::TelemetryEvent;
use quitpath_db::Db;

/// Upper bound on one bulk write; the client flushes well below this.
pub const MAX_EVENT_BATCH: usize = 500;

#[derive(Clone)]
pub struct EventsService {
    config: SharedConfig,
}

impl EventsService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    fn db(&self) -> Result<Db> {
        open_db(&self.config)
    }

    pub fn ingest(&self, events: &[TelemetryEvent]) -> Result<usize> {
        if events.len() > MAX_EVENT_BATCH {
            return Err(AppError::InvalidInput(format!(
                "event batch exceeds {} events",
                MAX_EVENT_BATCH
            )));
        }
        let mut db = self.db()?;
        Ok(db.insert_telemetry_events(events)?)
    }
}
