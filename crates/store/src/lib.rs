//! Client-side local store: per-record sync envelopes, app settings and
//! the durable telemetry spool, all on one sqlite file.

mod error;
mod records;
mod settings;
mod spool;

use std::path::Path;

use rusqlite::Connection;

pub use error::{Result, StoreError};
pub use records::LocalRecord;

const MIGRATION_0001: &str = include_str!("../migrations/0001_init.sql");

pub struct LocalStore {
    conn: Connection,
}

impl LocalStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn })
    }

    pub fn migrate(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(MIGRATION_0001)?;
        tx.commit()?;
        Ok(())
    }
}
