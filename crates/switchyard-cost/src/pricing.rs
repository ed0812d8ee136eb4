// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-call cost calculation and the savings baseline.

use switchyard_config::model::SwitchyardConfig;

/// Reference cost of one answer from the most expensive enabled provider,
/// unless `cost.baseline_cost_usd` overrides it.
pub fn baseline_cost(config: &SwitchyardConfig) -> f64 {
    if let Some(baseline) = config.cost.baseline_cost_usd {
        return baseline.max(0.0);
    }
    config
        .providers
        .iter()
        .filter(|p| p.enabled)
        .map(|p| p.cost_per_unit)
        .fold(0.0, f64::max)
}

/// Cost charged for one upstream call. Calls inside a free-tier allowance
/// cost nothing; otherwise the provider-reported usage cost applies, clamped
/// to zero.
pub fn call_cost(usage_cost: f64, within_free_tier: bool) -> f64 {
    if within_free_tier || !usage_cost.is_finite() {
        0.0
    } else {
        usage_cost.max(0.0)
    }
}

/// Even share of a batched call's cost.
pub fn split_cost(total: f64, members: usize) -> f64 {
    if members == 0 {
        return 0.0;
    }
    total.max(0.0) / members as f64
}
