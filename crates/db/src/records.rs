use chrono::{SecondsFormat, Utc};
use rusqlite::{OptionalExtension, params};
use serde_json::Value;

use quitpath_core::RemoteRecord;

use crate::Db;
use crate::error::Result;

impl Db {
    /// Upsert keyed by `(owner_id, natural_key)`. The stored `updated_at`
    /// comes from the server clock, so replaying the same write is
    /// idempotent apart from the timestamp.
    pub fn upsert_record(
        &self,
        owner_id: &str,
        natural_key: &str,
        payload: &Value,
    ) -> Result<RemoteRecord> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let payload_json = serde_json::to_string(payload)?;
        self.conn.execute(
            r#"
            INSERT INTO record (owner_id, natural_key, payload, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(owner_id, natural_key) DO UPDATE SET
              payload = excluded.payload,
              updated_at = excluded.updated_at
            "#,
            params![owner_id, natural_key, payload_json, now],
        )?;
        Ok(RemoteRecord {
            owner_id: owner_id.to_string(),
            natural_key: natural_key.to_string(),
            payload: payload.clone(),
            updated_at: now,
        })
    }

    pub fn get_record(&self, owner_id: &str, natural_key: &str) -> Result<Option<RemoteRecord>> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT owner_id, natural_key, payload, updated_at
                FROM record
                WHERE owner_id = ?1 AND natural_key = ?2
                "#,
                params![owner_id, natural_key],
                row_to_raw_record,
            )
            .optional()?;
        match row {
            Some(raw) => Ok(Some(raw.into_record()?)),
            None => Ok(None),
        }
    }

    pub fn list_records(&self, owner_id: &str) -> Result<Vec<RemoteRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT owner_id, natural_key, payload, updated_at
            FROM record
            WHERE owner_id = ?1
            ORDER BY natural_key ASC
            "#,
        )?;
        let raw_rows = stmt
            .query_map(params![owner_id], row_to_raw_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut records = Vec::with_capacity(raw_rows.len());
        for raw in raw_rows {
            records.push(raw.into_record()?);
        }
        Ok(records)
    }

    pub fn delete_record(&self, owner_id: &str, natural_key: &str) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM record WHERE owner_id = ?1 AND natural_key = ?2",
            params![owner_id, natural_key],
        )?;
        Ok(deleted > 0)
    }

    pub fn count_records(&self, owner_id: &str) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM record WHERE owner_id = ?1",
                params![owner_id],
                |row| row.get(0),
            )
            .map_err(crate::error::DbError::from)
    }
}

struct RawRecord {
    owner_id: String,
    natural_key: String,
    payload: String,
    updated_at: String,
}

impl RawRecord {
    fn into_record(self) -> Result<RemoteRecord> {
        Ok(RemoteRecord {
            owner_id: self.owner_id,
            natural_key: self.natural_key,
            payload: serde_json::from_str(&self.payload)?,
            updated_at: self.updated_at,
        })
    }
}

fn row_to_raw_record(row: &rusqlite::Row<'_>) -> std::result::Result<RawRecord, rusqlite::Error> {
    Ok(RawRecord {
        owner_id: row.get(0)?,
        natural_key: row.get(1)?,
        payload: row.get(2)?,
        updated_at: row.get(3)?,
    })
}
