// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Budget tracking over a daily or monthly billing period.
//!
//! The budget tracker keeps an in-memory running total for the current period
//! plus per-provider paid-call counts for free-tier accounting. It emits a
//! `tracing::warn` once per period when spend crosses the warning ratio and
//! exposes the spend ratio the provider selector uses to exclude tiers.
//!
//! On restart, `from_ledger()` re-hydrates the totals from the persistent cost
//! ledger so budget enforcement survives process restarts.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use switchyard_config::model::{BudgetPeriod, CostConfig};
use switchyard_core::SwitchyardError;
use switchyard_core::types::timestamp;
use tracing::{info, warn};

use crate::ledger::CostLedger;

/// Start and end (exclusive) of the billing period containing `now`.
pub fn period_bounds(period: BudgetPeriod, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.date_naive();
    let (start, end) = match period {
        BudgetPeriod::Daily => (today, today.succ_opt().unwrap_or(today)),
        BudgetPeriod::Monthly => {
            let first = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);
            let next = if today.month() == 12 {
                NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)
            };
            (first, next.unwrap_or(today))
        }
    };
    (midnight(start), midnight(end))
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

/// Key identifying the billing period containing `now`.
fn period_key(period: BudgetPeriod, now: DateTime<Utc>) -> String {
    match period {
        BudgetPeriod::Daily => now.format("%Y-%m-%d").to_string(),
        BudgetPeriod::Monthly => now.format("%Y-%m").to_string(),
    }
}

/// In-memory budget tracker for the configured billing period.
#[derive(Debug)]
pub struct BudgetTracker {
    period: BudgetPeriod,
    /// Spending cap for one period (None = unlimited).
    cap: Option<f64>,
    warn_ratio: f64,
    /// Running total of this period's spend.
    spent_usd: f64,
    /// Paid calls per provider this period, for free-tier accounting.
    calls: HashMap<String, u64>,
    current_period: String,
    warned: bool,
}

impl BudgetTracker {
    /// Create a new budget tracker with zero totals.
    pub fn new(config: &CostConfig) -> Self {
        Self::new_at(config, Utc::now())
    }

    pub fn new_at(config: &CostConfig, now: DateTime<Utc>) -> Self {
        Self {
            period: config.period,
            cap: config.period_budget_usd,
            warn_ratio: config.warn_ratio,
            spent_usd: 0.0,
            calls: HashMap::new(),
            current_period: period_key(config.period, now),
            warned: false,
        }
    }

    /// Create a budget tracker initialized from existing ledger data.
    pub async fn from_ledger(
        config: &CostConfig,
        ledger: &CostLedger,
    ) -> Result<Self, SwitchyardError> {
        let now = Utc::now();
        let (start, end) = period_bounds(config.period, now);
        let (start, end) = (timestamp(start), timestamp(end));

        let mut tracker = Self::new_at(config, now);
        tracker.spent_usd = ledger.total_between(&start, &end).await?;
        for spend in ledger.provider_totals_between(&start, &end).await? {
            tracker.calls.insert(spend.provider_id, spend.calls);
        }
        info!(
            period = %tracker.current_period,
            spent_usd = tracker.spent_usd,
            "budget totals restored from ledger"
        );
        Ok(tracker)
    }

    /// Record spend now. Negative costs are clamped to zero.
    pub fn record(&mut self, cost_usd: f64, provider_id: Option<&str>) {
        self.record_at(cost_usd, provider_id, Utc::now());
    }

    pub fn record_at(&mut self, cost_usd: f64, provider_id: Option<&str>, now: DateTime<Utc>) {
        self.maybe_reset(now);
        if cost_usd.is_finite() && cost_usd > 0.0 {
            self.spent_usd += cost_usd;
        }
        if let Some(id) = provider_id {
            *self.calls.entry(id.to_string()).or_insert(0) += 1;
        }

        if let Some(cap) = self.cap {
            if !self.warned && self.spent_usd >= cap * self.warn_ratio {
                self.warned = true;
                warn!(
                    spent_usd = self.spent_usd,
                    cap_usd = cap,
                    period = %self.current_period,
                    "approaching budget cap"
                );
            }
        }
    }

    /// Spend divided by the cap; `None` when uncapped. A zero cap is always
    /// at the ceiling.
    pub fn spend_ratio(&mut self) -> Option<f64> {
        self.spend_ratio_at(Utc::now())
    }

    pub fn spend_ratio_at(&mut self, now: DateTime<Utc>) -> Option<f64> {
        self.maybe_reset(now);
        self.cap.map(|cap| {
            if cap > 0.0 {
                self.spent_usd / cap
            } else {
                1.0
            }
        })
    }

    /// Allowance left this period; `None` when uncapped.
    pub fn remaining(&mut self) -> Option<f64> {
        self.remaining_at(Utc::now())
    }

    pub fn remaining_at(&mut self, now: DateTime<Utc>) -> Option<f64> {
        self.maybe_reset(now);
        self.cap.map(|cap| (cap - self.spent_usd).max(0.0))
    }

    /// Free-tier calls left for a provider with `allowance` calls per period.
    pub fn free_calls_remaining(&mut self, provider_id: &str, allowance: Option<u64>) -> Option<u64> {
        self.maybe_reset(Utc::now());
        allowance.map(|n| n.saturating_sub(self.calls.get(provider_id).copied().unwrap_or(0)))
    }

    /// Current period spend (for testing/reporting).
    pub fn spent(&self) -> f64 {
        self.spent_usd
    }

    pub fn cap(&self) -> Option<f64> {
        self.cap
    }

    fn maybe_reset(&mut self, now: DateTime<Utc>) {
        let key = period_key(self.period, now);
        if key != self.current_period {
            info!(from = %self.current_period, to = %key, "budget period rolled over");
            self.spent_usd = 0.0;
            self.calls.clear();
            self.warned = false;
            self.current_period = key;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{CostRecord, SpendKind};
    use switchyard_core::RoutePath;
    use switchyard_storage::Database;

    fn config(period: BudgetPeriod, cap: Option<f64>) -> CostConfig {
        CostConfig {
            period,
            period_budget_usd: cap,
            ..CostConfig::default()
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn monthly_bounds_roll_over_december() {
        let (start, end) = period_bounds(BudgetPeriod::Monthly, at("2026-12-15T08:00:00Z"));
        assert_eq!(start, at("2026-12-01T00:00:00Z"));
        assert_eq!(end, at("2027-01-01T00:00:00Z"));
    }

    #[test]
    fn daily_bounds_cover_one_day() {
        let (start, end) = period_bounds(BudgetPeriod::Daily, at("2026-03-01T23:59:59Z"));
        assert_eq!(start, at("2026-03-01T00:00:00Z"));
        assert_eq!(end, at("2026-03-02T00:00:00Z"));
    }

    #[test]
    fn ratio_and_remaining_track_spend() {
        let now = at("2026-03-10T12:00:00Z");
        let mut tracker = BudgetTracker::new_at(&config(BudgetPeriod::Monthly, Some(10.0)), now);
        tracker.record_at(2.5, Some("frontier"), now);
        assert_eq!(tracker.spend_ratio_at(now), Some(0.25));
        assert_eq!(tracker.remaining_at(now), Some(7.5));
    }

    #[test]
    fn negative_cost_is_ignored() {
        let now = at("2026-03-10T12:00:00Z");
        let mut tracker = BudgetTracker::new_at(&config(BudgetPeriod::Monthly, Some(10.0)), now);
        tracker.record_at(1.0, None, now);
        tracker.record_at(-5.0, None, now);
        assert_eq!(tracker.spent(), 1.0);
    }

    #[test]
    fn spend_resets_only_at_period_boundary() {
        let day1 = at("2026-03-10T23:00:00Z");
        let day2 = at("2026-03-11T01:00:00Z");
        let mut daily = BudgetTracker::new_at(&config(BudgetPeriod::Daily, Some(1.0)), day1);
        daily.record_at(0.6, Some("a"), day1);
        assert_eq!(daily.remaining_at(day2), Some(1.0));

        let mut monthly = BudgetTracker::new_at(&config(BudgetPeriod::Monthly, Some(1.0)), day1);
        monthly.record_at(0.6, Some("a"), day1);
        assert_eq!(monthly.remaining_at(day2), Some(0.4));
    }

    #[test]
    fn uncapped_has_no_ratio() {
        let mut tracker = BudgetTracker::new(&config(BudgetPeriod::Monthly, None));
        tracker.record(999_999.0, None);
        assert_eq!(tracker.spend_ratio(), None);
        assert_eq!(tracker.remaining(), None);
    }

    #[test]
    fn zero_cap_is_at_ceiling() {
        let mut tracker = BudgetTracker::new(&config(BudgetPeriod::Monthly, Some(0.0)));
        assert_eq!(tracker.spend_ratio(), Some(1.0));
        assert_eq!(tracker.remaining(), Some(0.0));
    }

    #[test]
    fn free_tier_calls_count_down() {
        let mut tracker = BudgetTracker::new(&config(BudgetPeriod::Monthly, None));
        assert_eq!(tracker.free_calls_remaining("cheap", Some(2)), Some(2));
        tracker.record(0.0, Some("cheap"));
        tracker.record(0.0, Some("cheap"));
        tracker.record(0.0, Some("cheap"));
        assert_eq!(tracker.free_calls_remaining("cheap", Some(2)), Some(0));
        assert_eq!(tracker.free_calls_remaining("cheap", None), None);
    }

    #[test]
    #[tracing_test::traced_test]
    fn warns_once_at_warn_ratio() {
        let mut tracker = BudgetTracker::new(&config(BudgetPeriod::Monthly, Some(10.0)));
        tracker.record(7.0, None);
        assert!(!logs_contain("approaching budget cap"));
        tracker.record(1.5, None);
        assert!(logs_contain("approaching budget cap"));
    }

    #[tokio::test]
    async fn from_ledger_initializes_totals() {
        let ledger = CostLedger::new(Database::open_in_memory().await.unwrap());
        ledger
            .record(
                &CostRecord::new(SpendKind::Route, RoutePath::Provider, 3.50, 5.0)
                    .with_provider("frontier"),
            )
            .await
            .unwrap();
        let mut stale = CostRecord::new(SpendKind::Route, RoutePath::Provider, 9.0, 9.0);
        stale.created_at = "2001-01-01T00:00:00.000Z".to_string();
        ledger.record(&stale).await.unwrap();

        let cfg = config(BudgetPeriod::Monthly, Some(10.0));
        let mut tracker = BudgetTracker::from_ledger(&cfg, &ledger).await.unwrap();
        assert!(
            (tracker.spent() - 3.50).abs() < 1e-10,
            "expected 3.50, got {}",
            tracker.spent()
        );
        assert_eq!(tracker.free_calls_remaining("frontier", Some(5)), Some(4));
    }
}
