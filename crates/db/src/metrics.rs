use rusqlite::params;

use quitpath_core::{ApiMetricSample, TimeRange};

use crate::Db;
use crate::error::Result;

impl Db {
    pub fn insert_metric_sample(&self, sample: &ApiMetricSample) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO api_metric_sample (
              endpoint, method, ts, latency_ms, status, error, requester_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                sample.endpoint,
                sample.method,
                sample.ts,
                sample.latency_ms as i64,
                sample.status as i64,
                sample.error,
                sample.requester_id,
            ],
        )?;
        Ok(())
    }

    pub fn metric_samples_in_range(&self, range: &TimeRange) -> Result<Vec<ApiMetricSample>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT endpoint, method, ts, latency_ms, status, error, requester_id
            FROM api_metric_sample
            WHERE ts >= ?1 AND ts < ?2
            ORDER BY ts ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![range.start, range.end], |row| {
                Ok(ApiMetricSample {
                    endpoint: row.get(0)?,
                    method: row.get(1)?,
                    ts: row.get(2)?,
                    latency_ms: row.get::<_, i64>(3)? as u64,
                    status: row.get::<_, i64>(4)? as u16,
                    error: row.get(5)?,
                    requester_id: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_metric_samples(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM api_metric_sample", [], |row| row.get(0))
            .map_err(crate::error::DbError::from)
    }
}
