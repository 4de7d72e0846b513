use chrono::{SecondsFormat, Utc};
use rusqlite::params;

use quitpath_core::TelemetryEvent;

use crate::Db;
use crate::error::Result;

impl Db {
    /// Bulk append to the event log. One transaction per batch; duplicate
    /// delivery is tolerated (at-least-once, see the flush retry path).
    pub fn insert_telemetry_events(&mut self, events: &[TelemetryEvent]) -> Result<usize> {
        if events.is_empty() {
            return Ok(0);
        }
        let received_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let tx = self.conn.transaction()?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO telemetry_event (
                  user_id, session_id, event_name, properties, created_at, received_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for event in events {
                let properties = serde_json::to_string(&event.properties)?;
                stmt.execute(params![
                    event.user_id,
                    event.session_id,
                    event.event_name,
                    properties,
                    event.created_at,
                    received_at,
                ])?;
                inserted += 1;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn count_telemetry_events(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM telemetry_event", [], |row| row.get(0))
            .map_err(crate::error::DbError::from)
    }

    pub fn list_event_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_name FROM telemetry_event ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
