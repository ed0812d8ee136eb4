// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cost ledger for persisting spend records to SQLite.
//!
//! Every resolved decision, prefetch, and batched upstream call is recorded
//! with its actual cost and the baseline cost a premium answer would have
//! incurred. The ledger supports range totals, per-provider totals, and call
//! counts for budget enforcement and reporting.

use rusqlite::params;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use switchyard_core::types::timestamp;
use switchyard_core::{DecisionId, RoutePath, SwitchyardError};
use switchyard_storage::{Database, map_tr_err};
use tracing::debug;

/// What incurred a ledger row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SpendKind {
    /// A user-facing routing decision.
    Route,
    /// A speculative prefetch on the worker pool.
    Prefetch,
    /// One member's share of a batched upstream call.
    Batch,
}

/// A single spend record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    /// Unique record identifier (UUID v4).
    pub id: String,
    /// Decision this spend belongs to, if any.
    pub decision_id: Option<String>,
    /// Provider that was paid, if any.
    pub provider_id: Option<String>,
    pub kind: SpendKind,
    pub path: RoutePath,
    /// Actual cost in USD, never negative.
    pub cost_usd: f64,
    /// What the reference premium answer would have cost.
    pub baseline_usd: f64,
    /// ISO 8601 timestamp.
    pub created_at: String,
}

impl CostRecord {
    /// Create a record stamped now. Negative costs are clamped to zero.
    pub fn new(kind: SpendKind, path: RoutePath, cost_usd: f64, baseline_usd: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            decision_id: None,
            provider_id: None,
            kind,
            path,
            cost_usd: clamp_cost(cost_usd),
            baseline_usd: clamp_cost(baseline_usd),
            created_at: timestamp(chrono::Utc::now()),
        }
    }

    pub fn for_decision(mut self, id: &DecisionId) -> Self {
        self.decision_id = Some(id.0.clone());
        self
    }

    pub fn with_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    /// Baseline minus actual, floored at zero.
    pub fn savings(&self) -> f64 {
        (self.baseline_usd - self.cost_usd).max(0.0)
    }
}

fn clamp_cost(cost: f64) -> f64 {
    if cost.is_finite() && cost > 0.0 { cost } else { 0.0 }
}

/// Spend of one provider over a range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSpend {
    pub provider_id: String,
    pub spend_usd: f64,
    pub calls: u64,
}

/// Persistent cost ledger backed by the shared SQLite database.
///
/// All operations go through the single tokio-rusqlite background thread.
#[derive(Clone)]
pub struct CostLedger {
    db: Database,
}

impl CostLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Append a record to the ledger.
    pub async fn record(&self, record: &CostRecord) -> Result<(), SwitchyardError> {
        let r = record.clone();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO cost_ledger (id, decision_id, provider_id, kind, path, \
                     cost_usd, baseline_usd, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        r.id,
                        r.decision_id,
                        r.provider_id,
                        r.kind.to_string(),
                        r.path.to_string(),
                        r.cost_usd,
                        r.baseline_usd,
                        r.created_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        debug!(
            kind = %record.kind,
            path = %record.path,
            provider = record.provider_id.as_deref().unwrap_or("-"),
            cost_usd = record.cost_usd,
            "cost recorded"
        );
        Ok(())
    }

    /// Sum of costs with `start <= created_at < end`.
    pub async fn total_between(&self, start: &str, end: &str) -> Result<f64, SwitchyardError> {
        self.sum_between("cost_usd", start, end).await
    }

    /// Sum of savings (baseline minus actual, per row) in the range.
    pub async fn savings_between(&self, start: &str, end: &str) -> Result<f64, SwitchyardError> {
        self.sum_between("MAX(baseline_usd - cost_usd, 0.0)", start, end)
            .await
    }

    async fn sum_between(
        &self,
        expr: &'static str,
        start: &str,
        end: &str,
    ) -> Result<f64, SwitchyardError> {
        let start = start.to_string();
        let end = end.to_string();
        self.db
            .connection()
            .call(move |conn| {
                let total: f64 = conn.query_row(
                    &format!(
                        "SELECT COALESCE(SUM({expr}), 0.0) FROM cost_ledger \
                         WHERE created_at >= ?1 AND created_at < ?2"
                    ),
                    params![start, end],
                    |row| row.get(0),
                )?;
                Ok(total)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Spend and paid-call counts per provider in the range, highest spend first.
    pub async fn provider_totals_between(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<ProviderSpend>, SwitchyardError> {
        let start = start.to_string();
        let end = end.to_string();
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT provider_id, COALESCE(SUM(cost_usd), 0.0), COUNT(*) FROM cost_ledger \
                     WHERE provider_id IS NOT NULL AND created_at >= ?1 AND created_at < ?2 \
                     GROUP BY provider_id ORDER BY 2 DESC, provider_id ASC",
                )?;
                let rows = stmt
                    .query_map(params![start, end], |row| {
                        let calls: i64 = row.get(2)?;
                        Ok(ProviderSpend {
                            provider_id: row.get(0)?,
                            spend_usd: row.get(1)?,
                            calls: calls.max(0) as u64,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(map_tr_err)
    }
}
