// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Switchyard routing engine.
//!
//! Ties the classifier, template responder, response cache, provider
//! selector, fallback chain, learning loop, and cost ledger into one
//! [`RoutingEngine`]. Build it with [`EngineBuilder`]:
//!
//! ```no_run
//! # async fn demo(
//! #     config: switchyard_config::SwitchyardConfig,
//! #     provider: std::sync::Arc<dyn switchyard_core::ProviderAdapter>,
//! # ) -> Result<(), switchyard_core::SwitchyardError> {
//! use switchyard_core::ConversationContext;
//! use switchyard_engine::EngineBuilder;
//!
//! let engine = EngineBuilder::new(config).provider(provider).build().await?;
//! let result = engine
//!     .route("How do I reset my password?", &ConversationContext::new("session-1"))
//!     .await;
//! engine.record_feedback(&result.decision_id, 0.9).await?;
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod cooldown;
pub mod decision;
pub mod engine;
pub mod fallback;
pub mod metrics;
mod prefetch;
pub mod workers;

pub use builder::EngineBuilder;
pub use engine::RoutingEngine;
pub use switchyard_cost::{CostReport, ReportPeriod};
pub use switchyard_learning::FeedbackOutcome;
pub use tokio_util::sync::CancellationToken;
