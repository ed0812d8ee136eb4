// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for Switchyard.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed queries for provider
//! statistics, patterns, the decision log, and durable cache entries. The cost
//! ledger lives in `switchyard-cost` but shares this database.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStore;
pub use database::{Database, map_tr_err};
