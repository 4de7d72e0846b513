mod events;
mod metrics;
mod records;

use std::sync::Arc;

use crate::app::AppConfig;
use crate::error::Result;
use quitpath_db::Db;

pub use events::{EventsService, MAX_EVENT_BATCH};
pub use metrics::{MetricsService, SUMMARY_CACHE_TTL};
pub use records::RecordsService;

type SharedConfig = Arc<AppConfig>;

/// Service registry for app-level operations.
#[derive(Clone)]
pub struct AppServices {
    pub records: RecordsService,
    pub events: EventsService,
    pub metrics: MetricsService,
}

impl AppServices {
    pub fn new(config: &AppConfig) -> Self {
        let shared = Arc::new(config.clone());
        Self {
            records: RecordsService::new(shared.clone()),
            events: EventsService::new(shared.clone()),
            metrics: MetricsService::new(shared),
        }
    }
}

fn open_db(config: &SharedConfig) -> Result<Db> {
    Ok(Db::open(&config.db_path)?)
}
