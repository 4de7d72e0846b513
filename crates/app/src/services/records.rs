use serde_json::Value;

use crate::error::{AppError, Result};
use crate::services::{SharedConfig, open_db};
use quitpath_core::RemoteRecord;
use quitpath_db::Db;

#[derive(Clone)]
pub struct RecordsService {
    config: SharedConfig,
}

impl RecordsService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    fn db(&self) -> Result<Db> {
        open_db(&self.config)
    }

    pub fn upsert(
        &self,
        owner_id: &str,
        natural_key: &str,
        payload: &Value,
    ) -> Result<RemoteRecord> {
        require_key(owner_id, natural_key)?;
        let db = self.db()?;
        Ok(db.upsert_record(owner_id, natural_key, payload)?)
    }

    pub fn get(&self, owner_id: &str, natural_key: &str) -> Result<Option<RemoteRecord>> {
        require_key(owner_id, natural_key)?;
        let db = self.db()?;
        Ok(db.get_record(owner_id, natural_key)?)
    }

    pub fn list(&self, owner_id: &str) -> Result<Vec<RemoteRecord>> {
        if owner_id.is_empty() {
            return Err(AppError::InvalidInput("owner_id is required".to_string()));
        }
        let db = self.db()?;
        Ok(db.list_records(owner_id)?)
    }

    pub fn delete(&self, owner_id: &str, natural_key: &str) -> Result<bool> {
        require_key(owner_id, natural_key)?;
        let db = self.db()?;
        Ok(db.delete_record(owner_id, natural_key)?)
    }
}

fn require_key(owner_id: &str, natural_key: &str) -> Result<()> {
    if owner_id.is_empty() || natural_key.is_empty() {
        return Err(AppError::InvalidInput(
            "owner_id and natural_key are required".to_string(),
        ));
    }
    Ok(())
}
