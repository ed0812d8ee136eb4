// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Repository traits for persisted routing state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SwitchyardError;
use crate::types::{CacheEntry, ComplexityClass, DecisionId, Pattern, ProviderStats, RoutingDecision};

/// Learned provider and pattern statistics.
///
/// Implementations do not lock; callers serialize read-modify-write cycles
/// per key.
#[async_trait]
pub trait StatsStore: Send + Sync {
    async fn get_provider_stats(
        &self,
        provider_id: &str,
        class: ComplexityClass,
    ) -> Result<Option<ProviderStats>, SwitchyardError>;

    async fn put_provider_stats(&self, stats: &ProviderStats) -> Result<(), SwitchyardError>;

    async fn list_provider_stats(&self) -> Result<Vec<ProviderStats>, SwitchyardError>;

    async fn get_pattern(&self, signature: &str) -> Result<Option<Pattern>, SwitchyardError>;

    async fn put_pattern(&self, pattern: &Pattern) -> Result<(), SwitchyardError>;

    /// Increment the co-occurrence count for `from -> to`.
    async fn record_transition(&self, from: &str, to: &str) -> Result<(), SwitchyardError>;

    /// Follow-up signatures of `from` with their counts, most frequent first.
    async fn transitions_from(&self, from: &str) -> Result<Vec<(String, u64)>, SwitchyardError>;
}

/// Append-mostly log of routing decisions.
#[async_trait]
pub trait DecisionLog: Send + Sync {
    async fn record_decision(&self, decision: &RoutingDecision) -> Result<(), SwitchyardError>;

    async fn get_decision(
        &self,
        id: &DecisionId,
    ) -> Result<Option<RoutingDecision>, SwitchyardError>;

    /// Store a satisfaction score unless one is already present.
    /// Returns `false` when the decision already had feedback.
    async fn set_satisfaction(
        &self,
        id: &DecisionId,
        satisfaction: f64,
    ) -> Result<bool, SwitchyardError>;
}

/// Durable backing for the response cache.
#[async_trait]
pub trait CacheRepository: Send + Sync {
    async fn save_entry(&self, entry: &CacheEntry) -> Result<(), SwitchyardError>;

    async fn delete_entry(&self, key: &str) -> Result<(), SwitchyardError>;

    async fn delete_by_pattern(&self, signature: &str) -> Result<usize, SwitchyardError>;

    /// Entries still live at `now`; expired rows are purged.
    async fn load_live_entries(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<CacheEntry>, SwitchyardError>;
}
