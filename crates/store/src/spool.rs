use chrono::{SecondsFormat, Utc};
use rusqlite::params;

use quitpath_core::TelemetryEvent;

use crate::LocalStore;
use crate::error::Result;

impl LocalStore {
    /// Appends one event to the durable spool and returns its sequence
    /// number. The spool is truncated on confirmed flush, so events accepted
    /// before a process kill survive into the next session.
    pub fn spool_append(&self, event: &TelemetryEvent) -> Result<i64> {
        let payload = serde_json::to_string(event)?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.conn.execute(
            "INSERT INTO event_spool (payload, created_at) VALUES (?1, ?2)",
            params![payload, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn spool_load(&self) -> Result<Vec<(i64, TelemetryEvent)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT seq, payload FROM event_spool ORDER BY seq ASC")?;
        let raw_rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut events = Vec::with_capacity(raw_rows.len());
        for (seq, payload) in raw_rows {
            events.push((seq, serde_json::from_str(&payload)?));
        }
        Ok(events)
    }

    pub fn spool_remove(&self, seqs: &[i64]) -> Result<()> {
        if seqs.is_empty() {
            return Ok(());
        }
        let placeholders = vec!["?"; seqs.len()].join(", ");
        let sql = format!("DELETE FROM event_spool WHERE seq IN ({})", placeholders);
        self.conn
            .execute(&sql, rusqlite::params_from_iter(seqs.iter()))?;
        Ok(())
    }

    pub fn spool_len(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM event_spool", [], |row| row.get(0))
            .map_err(crate::error::StoreError::from)
    }
}
