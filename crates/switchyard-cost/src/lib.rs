// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Spend tracking, budget enforcement, and savings reports for Switchyard.
//!
//! This crate provides:
//! - **Cost ledger**: persistent record of every paid or avoided upstream call
//! - **Budget tracker**: in-memory period cap with a warning threshold and free-tier counts
//! - **Pricing**: per-call cost, batch cost shares, and the savings baseline
//! - **Reports**: spend, savings, and decision counts per window

pub mod budget;
pub mod ledger;
pub mod pricing;
pub mod report;

pub use budget::BudgetTracker;
pub use ledger::{CostLedger, CostRecord, ProviderSpend, SpendKind};
pub use report::{CostReport, ReportPeriod, build_report};
