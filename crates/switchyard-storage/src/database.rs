// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and migrations.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;

use switchyard_config::model::StorageConfig;
use switchyard_core::SwitchyardError;
use tracing::{debug, info};

use crate::migrations;

/// Convert a tokio-rusqlite error into `SwitchyardError::Storage`.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> SwitchyardError {
    SwitchyardError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the Switchyard SQLite database.
///
/// Cloning is cheap; every clone talks to the same background thread.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database described by `config` and run migrations.
    pub async fn open_with(config: &StorageConfig) -> Result<Self, SwitchyardError> {
        Self::open(&config.database_path, config.wal_mode).await
    }

    /// Open (or create) a database file and run migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, SwitchyardError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| SwitchyardError::Storage {
                    source: Box::new(e),
                })?;
            }
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| SwitchyardError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.initialize(wal_mode).await?;
        info!(path, wal_mode, "database opened");
        Ok(db)
    }

    /// Open a private in-memory database with the full schema.
    pub async fn open_in_memory() -> Result<Self, SwitchyardError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| SwitchyardError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.initialize(false).await?;
        Ok(db)
    }

    /// The single writer connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Flush the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<(), SwitchyardError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn initialize(&self, wal_mode: bool) -> Result<(), SwitchyardError> {
        self.conn
            .call(move |conn| -> Result<(), SwitchyardError> {
                let pragmas = if wal_mode {
                    "PRAGMA journal_mode = WAL;
                     PRAGMA synchronous = NORMAL;
                     PRAGMA foreign_keys = ON;
                     PRAGMA busy_timeout = 5000;"
                } else {
                    "PRAGMA foreign_keys = ON;
                     PRAGMA busy_timeout = 5000;"
                };
                conn.execute_batch(pragmas)
                    .map_err(|e| SwitchyardError::Storage {
                        source: Box::new(e),
                    })?;
                migrations::run_migrations(conn)
            })
            .await
            .map_err(|e| SwitchyardError::Storage {
                source: Box::new(e),
            })?;
        debug!("schema migrations applied");
        Ok(())
    }
}
