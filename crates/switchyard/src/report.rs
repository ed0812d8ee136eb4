// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `switchyard report` and `switchyard profiles` command implementations.
//!
//! Both read the persisted routing state directly, so they work whether or
//! not an engine is running against the same database.

use chrono::Utc;
use serde::Serialize;
use switchyard_config::SwitchyardConfig;
use switchyard_core::{ComplexityClass, ProviderStats, ProviderTier, StatsStore, SwitchyardError};
use switchyard_cost::{CostLedger, CostReport, ReportPeriod, build_report};
use switchyard_storage::{Database, SqliteStore};

/// Run the `switchyard report` command.
pub async fn run_report(
    config: &SwitchyardConfig,
    period: ReportPeriod,
    json: bool,
    use_color: bool,
) -> Result<(), SwitchyardError> {
    let db = Database::open_with(&config.storage).await?;
    let report = build_report(&CostLedger::new(db), &config.cost, period, Utc::now()).await?;
    if json {
        println!("{}", to_json(&report)?);
    } else {
        print_report(&report, use_color);
    }
    Ok(())
}

fn print_report(report: &CostReport, use_color: bool) {
    println!();
    println!("  switchyard report ({})", report.period);
    println!("  {}", "-".repeat(50));
    println!("    Window:   {} .. {}", report.start, report.end);

    let spend = format!("${:.4}", report.total_spend_usd);
    match report.budget_usd {
        Some(cap) => {
            let over = report.total_spend_usd >= cap;
            if use_color && over {
                use colored::Colorize;
                println!("    Spend:    {} of ${cap:.2}", spend.red());
            } else {
                println!("    Spend:    {spend} of ${cap:.2}");
            }
        }
        None => println!("    Spend:    {spend}"),
    }
    if use_color {
        use colored::Colorize;
        println!(
            "    Savings:  {}",
            format!("${:.4}", report.savings_estimate_usd).green()
        );
    } else {
        println!("    Savings:  ${:.4}", report.savings_estimate_usd);
    }

    if !report.per_provider.is_empty() {
        println!();
        println!("    {:<20} {:>8} {:>12}", "Provider", "Calls", "Spend");
        for p in &report.per_provider {
            println!(
                "    {:<20} {:>8} {:>12}",
                p.provider_id,
                p.calls,
                format!("${:.4}", p.spend_usd)
            );
        }
    }

    println!();
    println!("    Decisions: {}", report.decisions());
    for (path, count) in &report.decisions_by_path {
        println!("      {path:<12} {count}");
    }
    println!();
}

/// One (provider, class) row of `switchyard profiles`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileRow {
    pub provider_id: String,
    pub tier: ProviderTier,
    pub cost_per_unit: f64,
    pub class: ComplexityClass,
    pub success_rate: f64,
    pub satisfaction: f64,
    pub avg_latency_ms: f64,
    pub samples: u64,
}

/// Learned stats for every enabled provider and class; priors where nothing
/// has been observed yet.
pub fn profile_rows(config: &SwitchyardConfig, learned: &[ProviderStats]) -> Vec<ProfileRow> {
    let mut rows = Vec::new();
    for provider in config.providers.iter().filter(|p| p.enabled) {
        for class in ComplexityClass::ALL {
            let stats = learned
                .iter()
                .find(|s| s.provider_id == provider.id && s.class == class);
            rows.push(ProfileRow {
                provider_id: provider.id.clone(),
                tier: provider.tier,
                cost_per_unit: provider.cost_per_unit,
                class,
                success_rate: stats.map_or(config.learning.prior_success, |s| s.success_rate),
                satisfaction: stats.map_or(config.learning.prior_satisfaction, |s| s.satisfaction),
                avg_latency_ms: stats.map_or(0.0, |s| s.avg_latency_ms),
                samples: stats.map_or(0, |s| s.samples),
            });
        }
    }
    rows
}

/// Run the `switchyard profiles` command.
pub async fn run_profiles(
    config: &SwitchyardConfig,
    json: bool,
    use_color: bool,
) -> Result<(), SwitchyardError> {
    let store = SqliteStore::new(Database::open_with(&config.storage).await?);
    let learned = store.list_provider_stats().await?;
    let rows = profile_rows(config, &learned);
    if json {
        println!("{}", to_json(&rows)?);
        return Ok(());
    }

    println!();
    println!(
        "    {:<20} {:<9} {:<9} {:>8} {:>8} {:>10} {:>8}",
        "Provider", "Tier", "Class", "Success", "Satisf.", "Latency", "Samples"
    );
    for row in &rows {
        let line = format!(
            "    {:<20} {:<9} {:<9} {:>8.3} {:>8.3} {:>8.0}ms {:>8}",
            row.provider_id,
            row.tier,
            row.class,
            row.success_rate,
            row.satisfaction,
            row.avg_latency_ms,
            row.samples
        );
        if use_color && row.samples == 0 {
            use colored::Colorize;
            println!("{}", line.dimmed());
        } else {
            println!("{line}");
        }
    }
    println!();
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, SwitchyardError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| SwitchyardError::Internal(format!("failed to render JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_config::model::ProviderConfig;

    fn config() -> SwitchyardConfig {
        let mut config = SwitchyardConfig::default();
        for (id, enabled) in [("std", true), ("retired", false)] {
            config.providers.push(ProviderConfig {
                id: id.to_string(),
                tier: ProviderTier::Standard,
                cost_per_unit: 0.002,
                free_tier_calls: None,
                timeout_ms: None,
                enabled,
            });
        }
        config
    }

    #[test]
    fn unobserved_classes_show_priors() {
        let config = config();
        let learned = vec![ProviderStats {
            provider_id: "std".into(),
            class: ComplexityClass::Complex,
            success_rate: 0.5,
            satisfaction: 0.4,
            avg_latency_ms: 120.0,
            samples: 7,
            updated_at: "2026-01-01T00:00:00.000Z".into(),
        }];
        let rows = profile_rows(&config, &learned);
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.provider_id == "std"));

        let complex = rows
            .iter()
            .find(|r| r.class == ComplexityClass::Complex)
            .unwrap();
        assert_eq!(complex.samples, 7);
        assert_eq!(complex.success_rate, 0.5);

        let trivial = rows
            .iter()
            .find(|r| r.class == ComplexityClass::Trivial)
            .unwrap();
        assert_eq!(trivial.samples, 0);
        assert_eq!(trivial.success_rate, config.learning.prior_success);
        assert_eq!(trivial.satisfaction, config.learning.prior_satisfaction);
    }

    #[tokio::test]
    async fn empty_ledger_reports_zero() {
        let db = Database::open_in_memory().await.unwrap();
        let report = build_report(
            &CostLedger::new(db),
            &config().cost,
            ReportPeriod::All,
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(report.total_spend_usd, 0.0);
        assert_eq!(report.decisions(), 0);
        let json = to_json(&report).unwrap();
        assert!(json.contains("\"period\": \"all\""));
    }
}
