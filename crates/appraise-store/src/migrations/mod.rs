//! Versioned schema migrations.
//!
//! The on-disk version lives in `PRAGMA user_version`. Migrations are
//! applied in order inside transactions; v2 only adds indices and never
//! alters row semantics, so re-running against a migrated store is a
//! no-op.

use rusqlite::Connection;
use tracing::info;

use crate::StoreError;

/// SQL for each migration version, applied in order.
const MIGRATIONS: &[(&str, &str)] = &[
    ("v001_initial", include_str!("v001_initial.sql")),
    ("v002_indices", include_str!("v002_indices.sql")),
];

/// Schema version this build reads and writes.
pub const SCHEMA_VERSION: i32 = MIGRATIONS.len() as i32;

/// Runs database migrations.
pub struct Migrator<'a> {
    conn: &'a Connection,
}

impl<'a> Migrator<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Current on-disk schema version.
    pub fn current_version(&self) -> crate::Result<i32> {
        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        Ok(version)
    }

    fn set_version(&self, version: i32) -> crate::Result<()> {
        self.conn.pragma_update(None, "user_version", version)?;
        Ok(())
    }

    /// Apply all pending migrations.
    ///
    /// Refuses to touch a database whose version is ahead of this build;
    /// an ambiguous schema must never be written to.
    pub fn migrate(&self) -> crate::Result<()> {
        let current = self.current_version()?;
        if current > SCHEMA_VERSION {
            return Err(StoreError::SchemaTooNew {
                found: current,
                supported: SCHEMA_VERSION,
            });
        }
        if current == SCHEMA_VERSION {
            return Ok(());
        }

        for (idx, (name, sql)) in MIGRATIONS.iter().enumerate() {
            let version = (idx + 1) as i32;
            if version > current {
                info!(migration = %name, version, "applying schema migration");
                self.conn
                    .execute_batch(&format!("BEGIN;\n{}\nCOMMIT;", sql))
                    .map_err(|e| StoreError::Migration {
                        name: name.to_string(),
                        message: e.to_string(),
                    })?;
                self.set_version(version)?;
            }
        }

        Ok(())
    }
}
