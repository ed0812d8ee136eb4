// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Spend reports over a reporting window.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use switchyard_config::model::{BudgetPeriod, CostConfig};
use switchyard_core::SwitchyardError;
use switchyard_core::types::timestamp;
use switchyard_storage::queries::decisions;

use crate::budget::period_bounds;
use crate::ledger::{CostLedger, ProviderSpend};

const EPOCH: &str = "0000-01-01T00:00:00.000Z";
const END_OF_TIME: &str = "9999-12-31T23:59:59.999Z";

/// Reporting window.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReportPeriod {
    Today,
    Month,
    /// The configured billing period.
    #[default]
    Budget,
    All,
}

impl ReportPeriod {
    /// Inclusive start and exclusive end timestamps of the window containing `now`.
    pub fn bounds(self, budget_period: BudgetPeriod, now: DateTime<Utc>) -> (String, String) {
        let range = match self {
            ReportPeriod::Today => period_bounds(BudgetPeriod::Daily, now),
            ReportPeriod::Month => period_bounds(BudgetPeriod::Monthly, now),
            ReportPeriod::Budget => period_bounds(budget_period, now),
            ReportPeriod::All => return (EPOCH.to_string(), END_OF_TIME.to_string()),
        };
        (timestamp(range.0), timestamp(range.1))
    }
}

/// Spend summary returned by `get_cost_report`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    pub period: ReportPeriod,
    pub start: String,
    pub end: String,
    pub total_spend_usd: f64,
    pub per_provider: Vec<ProviderSpend>,
    /// Baseline minus actual, summed over every ledger row in the window.
    pub savings_estimate_usd: f64,
    /// Decision counts keyed by route path.
    pub decisions_by_path: BTreeMap<String, u64>,
    /// Configured budget for one billing period, if any.
    pub budget_usd: Option<f64>,
}

impl CostReport {
    /// Total decisions in the window.
    pub fn decisions(&self) -> u64 {
        self.decisions_by_path.values().sum()
    }
}

/// Build a report for the window containing `now`.
pub async fn build_report(
    ledger: &CostLedger,
    config: &CostConfig,
    period: ReportPeriod,
    now: DateTime<Utc>,
) -> Result<CostReport, SwitchyardError> {
    let (start, end) = period.bounds(config.period, now);
    let total_spend_usd = ledger.total_between(&start, &end).await?;
    let per_provider = ledger.provider_totals_between(&start, &end).await?;
    let savings_estimate_usd = ledger.savings_between(&start, &end).await?;
    let decisions_by_path = decisions::count_by_path(ledger.database(), &start, &end)
        .await?
        .into_iter()
        .collect();

    Ok(CostReport {
        period,
        start,
        end,
        total_spend_usd,
        per_provider,
        savings_estimate_usd,
        decisions_by_path,
        budget_usd: config.period_budget_usd,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{CostRecord, SpendKind};
    use switchyard_core::types::timestamp;
    use switchyard_core::{
        ComplexityClass, DecisionId, DecisionState, RoutePath, RoutingDecision, SessionId,
    };
    use switchyard_storage::Database;

    fn decision(path: RoutePath, created_at: &str) -> RoutingDecision {
        RoutingDecision {
            id: DecisionId::new(),
            query_id: "q".to_string(),
            session_id: SessionId("s".to_string()),
            query_hash: "h".to_string(),
            class: ComplexityClass::Standard,
            path,
            provider_id: None,
            cost_usd: 0.0,
            latency_ms: 1,
            state: DecisionState::Succeeded,
            pattern: None,
            coalesced: false,
            satisfaction: None,
            created_at: created_at.to_string(),
        }
    }

    #[test]
    fn all_window_spans_everything() {
        let (start, end) = ReportPeriod::All.bounds(BudgetPeriod::Monthly, Utc::now());
        assert!(start.as_str() < "2000");
        assert!(end.as_str() > "9000");
    }

    #[test]
    fn budget_window_follows_configured_period() {
        let now = DateTime::parse_from_rfc3339("2026-05-20T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let (start, _) = ReportPeriod::Budget.bounds(BudgetPeriod::Daily, now);
        assert_eq!(start, "2026-05-20T00:00:00.000Z");
        let (start, end) = ReportPeriod::Budget.bounds(BudgetPeriod::Monthly, now);
        assert_eq!(start, "2026-05-01T00:00:00.000Z");
        assert_eq!(end, "2026-06-01T00:00:00.000Z");
    }

    #[test]
    fn report_period_parses_cli_names() {
        use std::str::FromStr;
        assert_eq!(ReportPeriod::from_str("today").unwrap(), ReportPeriod::Today);
        assert_eq!(ReportPeriod::Budget.to_string(), "budget");
    }

    #[tokio::test]
    async fn report_aggregates_ledger_and_decisions() {
        let db = Database::open_in_memory().await.unwrap();
        let ledger = CostLedger::new(db.clone());
        let now = Utc::now();
        let ts = timestamp(now);

        ledger
            .record(
                &CostRecord::new(SpendKind::Route, RoutePath::Provider, 0.004, 0.02)
                    .with_provider("cheap"),
            )
            .await
            .unwrap();
        ledger
            .record(&CostRecord::new(SpendKind::Route, RoutePath::Cache, 0.0, 0.02))
            .await
            .unwrap();
        for path in [RoutePath::Provider, RoutePath::Cache, RoutePath::Cache] {
            decisions::insert(&db, &decision(path, &ts)).await.unwrap();
        }

        let report = build_report(&ledger, &CostConfig::default(), ReportPeriod::All, now)
            .await
            .unwrap();
        assert!((report.total_spend_usd - 0.004).abs() < 1e-12);
        assert!((report.savings_estimate_usd - 0.036).abs() < 1e-12);
        assert_eq!(report.per_provider.len(), 1);
        assert_eq!(report.decisions_by_path.get("cache"), Some(&2));
        assert_eq!(report.decisions(), 3);
    }
}
