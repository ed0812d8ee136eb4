// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `switchyard check` command implementation.
//!
//! Runs diagnostic checks against the loaded configuration and the routing
//! database. Exits non-zero when any check fails.

use std::time::{Duration, Instant};

use chrono::Utc;
use switchyard_config::SwitchyardConfig;
use switchyard_core::SwitchyardError;
use switchyard_cost::{CostLedger, ReportPeriod, build_report};
use switchyard_storage::{Database, SqliteStore};

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run the `switchyard check` command.
pub async fn run_check(config: &SwitchyardConfig, use_color: bool) -> Result<(), SwitchyardError> {
    let mut results = vec![check_providers(config)];
    let db = match Database::open_with(&config.storage).await {
        Ok(db) => Some(db),
        Err(e) => {
            results.push(CheckResult::new(
                "Database",
                CheckStatus::Fail,
                format!("open failed: {e}"),
                Instant::now(),
            ));
            None
        }
    };
    if let Some(db) = db {
        results.push(check_database(&db, &config.storage.database_path).await);
        results.push(check_budget(&db, config).await);
    }

    println!();
    println!("  switchyard check");
    println!("  {}", "-".repeat(50));
    for result in &results {
        println!("{}", format_line(result, use_color));
    }
    println!();

    let failures = results
        .iter()
        .filter(|r| r.status == CheckStatus::Fail)
        .count();
    if failures > 0 {
        let word = if failures == 1 { "check" } else { "checks" };
        return Err(SwitchyardError::Config(format!("{failures} {word} failed")));
    }
    println!("  All checks passed.");
    println!();
    Ok(())
}

/// The engine refuses to start without at least one enabled provider.
fn check_providers(config: &SwitchyardConfig) -> CheckResult {
    let start = Instant::now();
    let enabled: Vec<String> = config
        .providers
        .iter()
        .filter(|p| p.enabled)
        .map(|p| format!("{} ({}, ${})", p.id, p.tier, p.cost_per_unit))
        .collect();
    if enabled.is_empty() {
        return CheckResult::new(
            "Providers",
            CheckStatus::Fail,
            "no enabled providers configured",
            start,
        );
    }
    CheckResult::new("Providers", CheckStatus::Pass, enabled.join(", "), start)
}

async fn check_database(db: &Database, path: &str) -> CheckResult {
    let start = Instant::now();
    match SqliteStore::new(db.clone()).health_check().await {
        Ok(()) => CheckResult::new("Database", CheckStatus::Pass, path, start),
        Err(e) => CheckResult::new(
            "Database",
            CheckStatus::Fail,
            format!("query failed: {e}"),
            start,
        ),
    }
}

async fn check_budget(db: &Database, config: &SwitchyardConfig) -> CheckResult {
    let start = Instant::now();
    let report = match build_report(
        &CostLedger::new(db.clone()),
        &config.cost,
        ReportPeriod::Budget,
        Utc::now(),
    )
    .await
    {
        Ok(report) => report,
        Err(e) => {
            return CheckResult::new(
                "Budget",
                CheckStatus::Fail,
                format!("ledger unreadable: {e}"),
                start,
            );
        }
    };
    let (status, message) = budget_status(
        report.total_spend_usd,
        config.cost.period_budget_usd,
        config.cost.warn_ratio,
    );
    CheckResult::new("Budget", status, message, start)
}

fn budget_status(spent: f64, cap: Option<f64>, warn_ratio: f64) -> (CheckStatus, String) {
    let Some(cap) = cap else {
        return (CheckStatus::Pass, format!("${spent:.4} spent, no cap"));
    };
    let ratio = if cap > 0.0 { spent / cap } else { 1.0 };
    let message = format!("${spent:.4} of ${cap:.2} ({:.0}%)", ratio * 100.0);
    if ratio >= 1.0 {
        (CheckStatus::Warn, format!("{message}, exhausted"))
    } else if ratio >= warn_ratio {
        (CheckStatus::Warn, message)
    } else {
        (CheckStatus::Pass, message)
    }
}

fn format_line(result: &CheckResult, use_color: bool) -> String {
    let ms = result.duration.as_millis();
    if use_color {
        use colored::Colorize;
        let (symbol, message) = match result.status {
            CheckStatus::Pass => ("✓".green(), result.message.normal()),
            CheckStatus::Warn => ("!".yellow(), result.message.yellow()),
            CheckStatus::Fail => ("✗".red(), result.message.red()),
        };
        format!("    {symbol} {:<12} {message} ({ms}ms)", result.name)
    } else {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!("    {tag} {:<12} {} ({ms}ms)", result.name, result.message)
    }
}
