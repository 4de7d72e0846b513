use chrono::{SecondsFormat, Utc};
use rusqlite::{OptionalExtension, Row, params};
use serde_json::Value;

use quitpath_core::{RecordKey, SyncEnvelope, SyncStatus};

use crate::LocalStore;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct LocalRecord {
    pub key: RecordKey,
    pub payload: Value,
    pub envelope: SyncEnvelope,
    pub updated_at: String,
}

impl LocalStore {
    /// Overwrite-in-place local write. The envelope is reset to `unsynced`;
    /// the payload is immediately visible to readers.
    pub fn put(&self, key: &RecordKey, payload: &Value) -> Result<()> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let payload_json = serde_json::to_string(payload)?;
        self.conn.execute(
            r#"
            INSERT INTO local_record (
              owner_id, natural_key, payload, sync_status, sync_error,
              last_sync_attempt, updated_at
            ) VALUES (?1, ?2, ?3, 'unsynced', NULL, NULL, ?4)
            ON CONFLICT(owner_id, natural_key) DO UPDATE SET
              payload = excluded.payload,
              sync_status = 'unsynced',
              sync_error = NULL,
              last_sync_attempt = NULL,
              updated_at = excluded.updated_at
            "#,
            params![key.owner_id, key.natural_key, payload_json, now],
        )?;
        Ok(())
    }

    /// Overwrite from an authoritative remote pull; marks the record synced.
    pub fn put_synced(&self, key: &RecordKey, payload: &Value, updated_at: &str) -> Result<()> {
        let payload_json = serde_json::to_string(payload)?;
        self.conn.execute(
            r#"
            INSERT INTO local_record (
              owner_id, natural_key, payload, sync_status, sync_error,
              last_sync_attempt, updated_at
            ) VALUES (?1, ?2, ?3, 'synced', NULL, NULL, ?4)
            ON CONFLICT(owner_id, natural_key) DO UPDATE SET
              payload = excluded.payload,
              sync_status = 'synced',
              sync_error = NULL,
              last_sync_attempt = NULL,
              updated_at = excluded.updated_at
            "#,
            params![key.owner_id, key.natural_key, payload_json, updated_at],
        )?;
        Ok(())
    }

    pub fn get(&self, key: &RecordKey) -> Result<Option<Value>> {
        Ok(self.get_record(key)?.map(|record| record.payload))
    }

    pub fn get_record(&self, key: &RecordKey) -> Result<Option<LocalRecord>> {
        let raw = self
            .conn
            .query_row(
                r#"
                SELECT owner_id, natural_key, payload, sync_status, sync_error,
                       last_sync_attempt, updated_at
                FROM local_record
                WHERE owner_id = ?1 AND natural_key = ?2
                "#,
                params![key.owner_id, key.natural_key],
                row_to_raw_record,
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(raw.into_record()?)),
            None => Ok(None),
        }
    }

    pub fn get_all(&self, owner_id: &str) -> Result<Vec<LocalRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT owner_id, natural_key, payload, sync_status, sync_error,
                   last_sync_attempt, updated_at
            FROM local_record
            WHERE owner_id = ?1
            ORDER BY natural_key ASC
            "#,
        )?;
        let raw_rows = stmt
            .query_map(params![owner_id], row_to_raw_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        collect_records(raw_rows)
    }

    /// Records whose local copy is not known to match the backend.
    pub fn pending(&self, owner_id: &str) -> Result<Vec<LocalRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT owner_id, natural_key, payload, sync_status, sync_error,
                   last_sync_attempt, updated_at
            FROM local_record
            WHERE owner_id = ?1 AND sync_status != 'synced'
            ORDER BY natural_key ASC
            "#,
        )?;
        let raw_rows = stmt
            .query_map(params![owner_id], row_to_raw_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        collect_records(raw_rows)
    }

    pub fn mark_status(
        &self,
        key: &RecordKey,
        status: &SyncStatus,
        last_sync_attempt: Option<&str>,
    ) -> Result<()> {
        let (status_text, error) = status_to_columns(status);
        self.conn.execute(
            r#"
            UPDATE local_record
            SET sync_status = ?3, sync_error = ?4, last_sync_attempt = ?5
            WHERE owner_id = ?1 AND natural_key = ?2
            "#,
            params![key.owner_id, key.natural_key, status_text, error, last_sync_attempt],
        )?;
        Ok(())
    }

    pub fn delete(&self, key: &RecordKey) -> Result<()> {
        self.conn.execute(
            "DELETE FROM local_record WHERE owner_id = ?1 AND natural_key = ?2",
            params![key.owner_id, key.natural_key],
        )?;
        Ok(())
    }
}

fn collect_records(raw_rows: Vec<RawRecord>) -> Result<Vec<LocalRecord>> {
    let mut records = Vec::with_capacity(raw_rows.len());
    for raw in raw_rows {
        records.push(raw.into_record()?);
    }
    Ok(records)
}

fn status_to_columns(status: &SyncStatus) -> (&'static str, Option<&str>) {
    match status {
        SyncStatus::Unsynced => ("unsynced", None),
        SyncStatus::Syncing => ("syncing", None),
        SyncStatus::Synced => ("synced", None),
        SyncStatus::Failed { error } => ("failed", Some(error.as_str())),
    }
}

fn status_from_columns(status: &str, error: Option<String>) -> SyncStatus {
    match status {
        "syncing" => SyncStatus::Syncing,
        "synced" => SyncStatus::Synced,
        "failed" => SyncStatus::Failed {
            error: error.unwrap_or_default(),
        },
        _ => SyncStatus::Unsynced,
    }
}

struct RawRecord {
    owner_id: String,
    natural_key: String,
    payload: String,
    sync_status: String,
    sync_error: Option<String>,
    last_sync_attempt: Option<String>,
    updated_at: String,
}

impl RawRecord {
    fn into_record(self) -> Result<LocalRecord> {
        Ok(LocalRecord {
            key: RecordKey::new(self.owner_id, self.natural_key),
            payload: serde_json::from_str(&self.payload)?,
            envelope: SyncEnvelope {
                status: status_from_columns(&self.sync_status, self.sync_error),
                last_sync_attempt: self.last_sync_attempt,
            },
            updated_at: self.updated_at,
        })
    }
}

fn row_to_raw_record(row: &Row<'_>) -> std::result::Result<RawRecord, rusqlite::Error> {
    Ok(RawRecord {
        owner_id: row.get(0)?,
        natural_key: row.get(1)?,
        payload: row.get(2)?,
        sync_status: row.get(3)?,
        sync_error: row.get(4)?,
        last_sync_attempt: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
