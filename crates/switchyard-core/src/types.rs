// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the routing pipeline, its stores, and adapters.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for a routing decision, handed back to callers so they
/// can report feedback later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecisionId(pub String);

impl DecisionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DecisionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DecisionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter plugged into the engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Embedding,
}

/// Difficulty/criticality bucket for a query. Ordered from cheapest to most
/// conservative handling.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ComplexityClass {
    Trivial,
    Standard,
    Complex,
    Critical,
}

impl ComplexityClass {
    pub const ALL: [ComplexityClass; 4] = [
        ComplexityClass::Trivial,
        ComplexityClass::Standard,
        ComplexityClass::Complex,
        ComplexityClass::Critical,
    ];
}

/// Emotional-state tag supplied by the conversation context provider.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EmotionalState {
    #[default]
    Neutral,
    Positive,
    Anxious,
    Distressed,
    Crisis,
}

impl EmotionalState {
    /// Emotional intensity in [0, 1].
    pub fn intensity(self) -> f64 {
        match self {
            EmotionalState::Neutral => 0.0,
            EmotionalState::Positive => 0.1,
            EmotionalState::Anxious => 0.5,
            EmotionalState::Distressed => 0.8,
            EmotionalState::Crisis => 1.0,
        }
    }
}

/// Explicit urgency flag supplied by the conversation context provider.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    #[default]
    Normal,
    Elevated,
    Critical,
}

/// Pricing tier of a provider. Ordered cheapest first.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProviderTier {
    Free,
    Standard,
    Premium,
}

/// Where a response came from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RoutePath {
    Local,
    Cache,
    Predictive,
    Provider,
    Degraded,
}

/// Lifecycle of a routing decision.
///
/// `Pending -> Routed(path) -> {Succeeded, Degraded, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionState {
    Pending,
    Routed(RoutePath),
    Succeeded,
    Degraded,
    Failed,
}

impl DecisionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DecisionState::Succeeded | DecisionState::Degraded | DecisionState::Failed
        )
    }

    /// Parse a terminal state as persisted in the decision log.
    pub fn parse_terminal(s: &str) -> Option<Self> {
        match s {
            "succeeded" => Some(DecisionState::Succeeded),
            "degraded" => Some(DecisionState::Degraded),
            "failed" => Some(DecisionState::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DecisionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionState::Pending => write!(f, "pending"),
            DecisionState::Routed(path) => write!(f, "routed({path})"),
            DecisionState::Succeeded => write!(f, "succeeded"),
            DecisionState::Degraded => write!(f, "degraded"),
            DecisionState::Failed => write!(f, "failed"),
        }
    }
}

/// Per-query context supplied by the conversation context provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    pub session_id: SessionId,
    /// Normalized recent turns, oldest first.
    pub recent_turns: Vec<String>,
    pub emotion: EmotionalState,
    pub urgency: Urgency,
    /// Set when the query may be coalesced with same-intent queries.
    pub batchable: bool,
}

impl ConversationContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: SessionId(session_id.into()),
            recent_turns: Vec::new(),
            emotion: EmotionalState::Neutral,
            urgency: Urgency::Normal,
            batchable: false,
        }
    }

    pub fn with_turns(mut self, turns: Vec<String>) -> Self {
        self.recent_turns = turns;
        self
    }

    pub fn with_emotion(mut self, emotion: EmotionalState) -> Self {
        self.emotion = emotion;
        self
    }

    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }

    pub fn batchable(mut self, batchable: bool) -> Self {
        self.batchable = batchable;
        self
    }
}

/// A classified query. Lives only for the duration of one routing decision.
#[derive(Debug, Clone)]
pub struct Query {
    pub id: String,
    pub text: String,
    pub normalized: String,
    /// Exact cache key derived from the normalized text and context slice.
    pub hash: String,
    pub class: ComplexityClass,
    pub score: f64,
    pub emotion: EmotionalState,
    pub urgency: Urgency,
    pub session_id: SessionId,
    pub timestamp: String,
    pub needs_clarification: bool,
    /// Topic fingerprint used for pattern statistics, if the text has one.
    pub signature: Option<String>,
}

impl Query {
    pub fn is_critical(&self) -> bool {
        self.class == ComplexityClass::Critical
    }
}

/// Spending guidance passed to a provider adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetHint {
    pub class: ComplexityClass,
    /// Remaining allowance for this period, `None` when uncapped or critical.
    pub max_cost_usd: Option<f64>,
    pub max_tokens: u32,
}

/// A request to an external inference provider.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub query: String,
    pub context: ConversationContext,
    pub hint: BudgetHint,
    /// Additional same-intent queries answered by this call when batched.
    pub batch: Vec<String>,
}

/// A successful provider response.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReply {
    pub text: String,
    pub usage_cost: f64,
    pub latency: Duration,
}

/// Tagged provider failure kinds.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    Timeout,
    RateLimited,
    AuthError,
    ServerError,
}

/// A failed provider call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Learned statistics for one (provider, class) bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStats {
    pub provider_id: String,
    pub class: ComplexityClass,
    pub success_rate: f64,
    pub satisfaction: f64,
    pub avg_latency_ms: f64,
    pub samples: u64,
    pub updated_at: String,
}

/// Merged view of a provider used for selection: static configuration,
/// learned statistics, and current budget/cooldown state.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderProfile {
    pub id: String,
    pub tier: ProviderTier,
    pub cost_per_unit: f64,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub satisfaction: f64,
    /// Free-tier calls left this period; `None` when the provider has no free tier.
    pub free_calls_remaining: Option<u64>,
    pub on_cooldown: bool,
}

impl ProviderProfile {
    /// Per-call cost after free-tier allowance.
    pub fn effective_cost(&self) -> f64 {
        match self.free_calls_remaining {
            Some(n) if n > 0 => 0.0,
            _ => self.cost_per_unit.max(0.0),
        }
    }

    /// Expected answer quality in [0, 1].
    pub fn quality(&self) -> f64 {
        self.success_rate * self.satisfaction
    }
}

/// Intent/topic fingerprint statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub signature: String,
    /// Decaying occurrence count.
    pub frequency: f64,
    pub success_rate: f64,
    pub avg_complexity: f64,
    /// Most recent query text seen for this pattern.
    pub exemplar: String,
    pub last_seen: DateTime<Utc>,
}

/// How a cache entry was produced.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntryOrigin {
    /// Stored after serving a live query.
    Computed,
    /// Stored speculatively by the prefetcher.
    Predicted,
}

/// A stored response.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub response: String,
    pub class: ComplexityClass,
    pub origin: EntryOrigin,
    pub pattern: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub ttl_secs: u64,
    pub hit_count: u64,
    pub last_access: DateTime<Utc>,
}

impl CacheEntry {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + chrono::Duration::seconds(self.ttl_secs.min(i64::MAX as u64) as i64)
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at()
    }

    /// The entry may answer a query of `class` only if it was computed for an
    /// equal or more demanding class.
    pub fn serves(&self, class: ComplexityClass) -> bool {
        class <= self.class
    }
}

/// Outcome of one routing decision, persisted to the decision log.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingDecision {
    pub id: DecisionId,
    pub query_id: String,
    pub session_id: SessionId,
    pub query_hash: String,
    pub class: ComplexityClass,
    pub path: RoutePath,
    pub provider_id: Option<String>,
    pub cost_usd: f64,
    pub latency_ms: u64,
    pub state: DecisionState,
    pub pattern: Option<String>,
    pub coalesced: bool,
    pub satisfaction: Option<f64>,
    pub created_at: String,
}

/// A late user satisfaction signal.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackRecord {
    pub decision_id: DecisionId,
    pub satisfaction: f64,
    pub correct: Option<bool>,
}

/// What `route()` hands back to the request-handling layer.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteResult {
    pub decision_id: DecisionId,
    pub text: String,
    pub path: RoutePath,
    pub provider_id: Option<String>,
    pub cost_usd: f64,
    pub latency: Duration,
    pub state: DecisionState,
    pub class: ComplexityClass,
    pub coalesced: bool,
    pub needs_clarification: bool,
}

/// ISO-8601 UTC timestamp in the format used by every persisted row.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
