// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the repository traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use switchyard_core::{
    CacheEntry, CacheRepository, ComplexityClass, DecisionId, DecisionLog, Pattern, ProviderStats,
    RoutingDecision, StatsStore, SwitchyardError,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed store for statistics, decisions, and cache entries.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules.
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The underlying database, for the cost ledger and maintenance tasks.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Confirm the connection answers a trivial query.
    pub async fn health_check(&self) -> Result<(), SwitchyardError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)
    }

    /// Checkpoint the WAL before the process exits.
    pub async fn close(&self) -> Result<(), SwitchyardError> {
        self.db.checkpoint().await?;
        debug!("sqlite store closed");
        Ok(())
    }
}

#[async_trait]
impl StatsStore for SqliteStore {
    async fn get_provider_stats(
        &self,
        provider_id: &str,
        class: ComplexityClass,
    ) -> Result<Option<ProviderStats>, SwitchyardError> {
        queries::provider_stats::get(&self.db, provider_id, class).await
    }

    async fn put_provider_stats(&self, stats: &ProviderStats) -> Result<(), SwitchyardError> {
        queries::provider_stats::upsert(&self.db, stats).await
    }

    async fn list_provider_stats(&self) -> Result<Vec<ProviderStats>, SwitchyardError> {
        queries::provider_stats::list(&self.db).await
    }

    async fn get_pattern(&self, signature: &str) -> Result<Option<Pattern>, SwitchyardError> {
        queries::patterns::get(&self.db, signature).await
    }

    async fn put_pattern(&self, pattern: &Pattern) -> Result<(), SwitchyardError> {
        queries::patterns::upsert(&self.db, pattern).await
    }

    async fn record_transition(&self, from: &str, to: &str) -> Result<(), SwitchyardError> {
        queries::patterns::record_transition(&self.db, from, to).await
    }

    async fn transitions_from(&self, from: &str) -> Result<Vec<(String, u64)>, SwitchyardError> {
        queries::patterns::transitions_from(&self.db, from).await
    }
}

#[async_trait]
impl DecisionLog for SqliteStore {
    async fn record_decision(&self, decision: &RoutingDecision) -> Result<(), SwitchyardError> {
        queries::decisions::insert(&self.db, decision).await
    }

    async fn get_decision(
        &self,
        id: &DecisionId,
    ) -> Result<Option<RoutingDecision>, SwitchyardError> {
        queries::decisions::get(&self.db, id).await
    }

    async fn set_satisfaction(
        &self,
        id: &DecisionId,
        satisfaction: f64,
    ) -> Result<bool, SwitchyardError> {
        queries::decisions::set_satisfaction(&self.db, id, satisfaction).await
    }
}

#[async_trait]
impl CacheRepository for SqliteStore {
    async fn save_entry(&self, entry: &CacheEntry) -> Result<(), SwitchyardError> {
        queries::cache::save(&self.db, entry).await
    }

    async fn delete_entry(&self, key: &str) -> Result<(), SwitchyardError> {
        queries::cache::delete(&self.db, key).await
    }

    async fn delete_by_pattern(&self, signature: &str) -> Result<usize, SwitchyardError> {
        queries::cache::delete_by_pattern(&self.db, signature).await
    }

    async fn load_live_entries(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<CacheEntry>, SwitchyardError> {
        queries::cache::load_live(&self.db, now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_check_on_fresh_store() {
        let store = SqliteStore::new(Database::open_in_memory().await.unwrap());
        store.health_check().await.unwrap();
    }
}
