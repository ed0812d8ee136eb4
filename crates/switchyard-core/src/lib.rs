// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Switchyard query router.
//!
//! This crate provides the shared types, the error taxonomy, text
//! normalization, and the adapter and repository traits used throughout the
//! Switchyard workspace.

pub mod error;
pub mod text;
pub mod traits;
pub mod types;

pub use error::SwitchyardError;
pub use types::{
    AdapterType, BudgetHint, CacheEntry, ComplexityClass, ConversationContext, DecisionId,
    DecisionState, EmotionalState, EntryOrigin, FeedbackRecord, HealthStatus, Pattern,
    ProviderError, ProviderErrorKind, ProviderProfile, ProviderReply, ProviderRequest,
    ProviderStats, ProviderTier, Query, RoutePath, RouteResult, RoutingDecision, SessionId,
    Urgency,
};

pub use traits::{
    CacheRepository, DecisionLog, EmbeddingAdapter, PluginAdapter, ProviderAdapter, StatsStore,
};
