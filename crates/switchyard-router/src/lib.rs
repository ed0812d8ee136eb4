// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query classification and provider selection for Switchyard.
//!
//! This crate provides:
//! - [`QueryClassifier`]: weighted-feature complexity classification (zero-cost, zero-latency)
//! - [`TemplateRegistry`]: deterministic local answers for trivial queries
//! - [`ProviderSelector`]: budget-aware ordering of providers into a fallback chain

pub mod classifier;
pub mod selector;
pub mod templates;

pub use classifier::{Classification, QueryClassifier};
pub use selector::{BudgetView, ProviderSelector, Selection};
pub use templates::{TemplateRegistry, template_signature};
