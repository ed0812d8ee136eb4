// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Switchyard router.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages. Every numeric
//! knob of the routing pipeline lives here with its default.

use serde::{Deserialize, Serialize};
use switchyard_core::types::{ComplexityClass, ProviderTier};

/// Top-level Switchyard configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchyardConfig {
    /// Process-level settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Spend tracking and budget settings.
    #[serde(default)]
    pub cost: CostConfig,

    /// Complexity classifier weights and thresholds.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Local template responder settings.
    #[serde(default)]
    pub templates: TemplateConfig,

    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Predictive prefetch settings.
    #[serde(default)]
    pub prediction: PredictionConfig,

    /// Provider selection policy.
    #[serde(default)]
    pub selector: SelectorConfig,

    /// Fallback chain settings.
    #[serde(default)]
    pub fallback: FallbackConfig,

    /// Request coalescing settings.
    #[serde(default)]
    pub batching: BatchingConfig,

    /// Online learning settings.
    #[serde(default)]
    pub learning: LearningConfig,

    /// Background worker pool settings.
    #[serde(default)]
    pub workers: WorkerConfig,

    /// External inference providers.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl SwitchyardConfig {
    /// Look up a provider entry by id.
    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }
}

/// Process-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Sessions with no routed turn for this long are forgotten, as if
    /// `end_session` had been called.
    #[serde(default = "default_session_idle_ms")]
    pub session_idle_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            session_idle_ms: default_session_idle_ms(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_session_idle_ms() -> u64 {
    30 * 60 * 1000
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("switchyard").join("switchyard.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("switchyard.db"))
        .to_string_lossy()
        .to_string()
}

fn default_true() -> bool {
    true
}

/// Billing period over which the budget applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPeriod {
    Daily,
    #[default]
    Monthly,
}

/// Spend tracking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CostConfig {
    /// Billing period the budget resets on.
    #[serde(default)]
    pub period: BudgetPeriod,

    /// Budget for one period in USD. `None` means unlimited.
    #[serde(default)]
    pub period_budget_usd: Option<f64>,

    /// Reference cost of one premium answer used for savings estimates.
    /// Defaults to the most expensive configured provider.
    #[serde(default)]
    pub baseline_cost_usd: Option<f64>,

    /// Spend ratio at which a budget warning is logged.
    #[serde(default = "default_warn_ratio")]
    pub warn_ratio: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            period: BudgetPeriod::default(),
            period_budget_usd: None,
            baseline_cost_usd: None,
            warn_ratio: default_warn_ratio(),
        }
    }
}

fn default_warn_ratio() -> f64 {
    0.8
}

/// Complexity classifier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierConfig {
    #[serde(default = "default_length_weight")]
    pub length_weight: f64,
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f64,
    #[serde(default = "default_history_weight")]
    pub history_weight: f64,
    #[serde(default = "default_emotion_weight")]
    pub emotion_weight: f64,
    #[serde(default = "default_depth_weight")]
    pub depth_weight: f64,

    /// Lower bound of the standard class.
    #[serde(default = "default_standard_threshold")]
    pub standard_threshold: f64,
    /// Lower bound of the complex class.
    #[serde(default = "default_complex_threshold")]
    pub complex_threshold: f64,
    /// Lower bound of the critical class.
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: f64,

    /// Score added when urgency is elevated.
    #[serde(default = "default_elevated_urgency_bonus")]
    pub elevated_urgency_bonus: f64,

    /// Observations required before pattern history contributes.
    #[serde(default = "default_min_pattern_frequency")]
    pub min_pattern_frequency: f64,

    /// Longer inputs are treated as malformed.
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,

    /// Extra words that indicate a complex query.
    #[serde(default)]
    pub extra_complex_keywords: Vec<String>,

    /// Extra phrases that force the critical class.
    #[serde(default)]
    pub extra_critical_keywords: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            length_weight: default_length_weight(),
            keyword_weight: default_keyword_weight(),
            history_weight: default_history_weight(),
            emotion_weight: default_emotion_weight(),
            depth_weight: default_depth_weight(),
            standard_threshold: default_standard_threshold(),
            complex_threshold: default_complex_threshold(),
            critical_threshold: default_critical_threshold(),
            elevated_urgency_bonus: default_elevated_urgency_bonus(),
            min_pattern_frequency: default_min_pattern_frequency(),
            max_query_chars: default_max_query_chars(),
            extra_complex_keywords: Vec::new(),
            extra_critical_keywords: Vec::new(),
        }
    }
}

fn default_length_weight() -> f64 {
    0.20
}
fn default_keyword_weight() -> f64 {
    0.45
}
fn default_history_weight() -> f64 {
    0.15
}
fn default_emotion_weight() -> f64 {
    0.15
}
fn default_depth_weight() -> f64 {
    0.05
}
fn default_standard_threshold() -> f64 {
    0.15
}
fn default_complex_threshold() -> f64 {
    0.40
}
fn default_critical_threshold() -> f64 {
    0.80
}
fn default_elevated_urgency_bonus() -> f64 {
    0.15
}
fn default_min_pattern_frequency() -> f64 {
    3.0
}
fn default_max_query_chars() -> usize {
    8000
}

/// A configured local template.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateEntry {
    /// Phrases that trigger the template (normalized before matching).
    pub triggers: Vec<String>,
    /// Deterministic reply.
    pub response: String,
}

/// Template responder configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateConfig {
    /// Include the built-in greeting/thanks/farewell templates.
    #[serde(default = "default_true")]
    pub builtin: bool,

    /// Maximum Levenshtein distance for a fuzzy template match.
    #[serde(default = "default_max_edit_distance")]
    pub max_edit_distance: usize,

    /// Signatures shorter than this only match exactly.
    #[serde(default = "default_min_fuzzy_len")]
    pub min_fuzzy_len: usize,

    /// Reply used when every provider failed and nothing cached fits.
    /// An empty string lets such decisions end in the failed state.
    #[serde(default = "default_apology")]
    pub apology: Option<String>,

    /// Reply for empty or malformed queries. An empty string sends them
    /// through the normal pipeline.
    #[serde(default = "default_clarification")]
    pub clarification: Option<String>,

    /// Additional templates.
    #[serde(default)]
    pub entries: Vec<TemplateEntry>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            builtin: true,
            max_edit_distance: default_max_edit_distance(),
            min_fuzzy_len: default_min_fuzzy_len(),
            apology: default_apology(),
            clarification: default_clarification(),
            entries: Vec::new(),
        }
    }
}

fn default_max_edit_distance() -> usize {
    1
}
fn default_min_fuzzy_len() -> usize {
    4
}
fn default_apology() -> Option<String> {
    Some(
        "Sorry, I can't answer that right now. Please try again in a moment.".to_string(),
    )
}

fn default_clarification() -> Option<String> {
    Some("Sorry, I didn't catch that. Could you rephrase your question?".to_string())
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Maximum number of in-memory entries before LRU eviction.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// TTL for stable answers.
    #[serde(default = "default_standard_ttl_secs")]
    pub standard_ttl_secs: u64,

    /// TTL for urgent, critical, or time-sensitive answers.
    #[serde(default = "default_volatile_ttl_secs")]
    pub volatile_ttl_secs: u64,

    /// Minimum cosine similarity for a semantic hit.
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f32,

    /// Minimum cosine similarity for a degraded near-match.
    #[serde(default = "default_degraded_similarity")]
    pub degraded_similarity: f32,

    /// How long past expiry an entry may still serve as a degraded answer.
    #[serde(default = "default_stale_grace_secs")]
    pub stale_grace_secs: u64,

    /// Number of trailing context turns folded into the exact cache key.
    #[serde(default)]
    pub context_turns_in_key: usize,

    /// Entries backed by a pattern below this success rate are evicted.
    #[serde(default = "default_evict_below_success")]
    pub evict_below_success: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            standard_ttl_secs: default_standard_ttl_secs(),
            volatile_ttl_secs: default_volatile_ttl_secs(),
            semantic_threshold: default_semantic_threshold(),
            degraded_similarity: default_degraded_similarity(),
            stale_grace_secs: default_stale_grace_secs(),
            context_turns_in_key: 0,
            evict_below_success: default_evict_below_success(),
        }
    }
}

fn default_max_entries() -> usize {
    10_000
}
fn default_standard_ttl_secs() -> u64 {
    86_400
}
fn default_volatile_ttl_secs() -> u64 {
    300
}
fn default_semantic_threshold() -> f32 {
    0.92
}
fn default_degraded_similarity() -> f32 {
    0.75
}
fn default_stale_grace_secs() -> u64 {
    86_400
}
fn default_evict_below_success() -> f64 {
    0.3
}

/// Predictive prefetch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PredictionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum observed follow-up probability worth prefetching.
    #[serde(default = "default_min_transition_probability")]
    pub min_transition_probability: f64,

    /// Follow-ups considered after each turn.
    #[serde(default = "default_max_predictions_per_turn")]
    pub max_predictions_per_turn: usize,

    /// Speculative calls allowed per session.
    #[serde(default = "default_session_max_predictions")]
    pub session_max_predictions: u32,

    /// Speculative spend allowed per session in USD.
    #[serde(default = "default_session_max_spend_usd")]
    pub session_max_spend_usd: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_transition_probability: default_min_transition_probability(),
            max_predictions_per_turn: default_max_predictions_per_turn(),
            session_max_predictions: default_session_max_predictions(),
            session_max_spend_usd: default_session_max_spend_usd(),
        }
    }
}

fn default_min_transition_probability() -> f64 {
    0.3
}
fn default_max_predictions_per_turn() -> usize {
    2
}
fn default_session_max_predictions() -> u32 {
    5
}
fn default_session_max_spend_usd() -> f64 {
    0.05
}

/// Minimum expected quality (success x satisfaction) per class.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QualityFloors {
    #[serde(default)]
    pub trivial: f64,
    #[serde(default = "default_standard_floor")]
    pub standard: f64,
    #[serde(default = "default_complex_floor")]
    pub complex: f64,
    #[serde(default = "default_critical_floor")]
    pub critical: f64,
}

impl QualityFloors {
    pub fn for_class(&self, class: ComplexityClass) -> f64 {
        match class {
            ComplexityClass::Trivial => self.trivial,
            ComplexityClass::Standard => self.standard,
            ComplexityClass::Complex => self.complex,
            ComplexityClass::Critical => self.critical,
        }
    }
}

impl Default for QualityFloors {
    fn default() -> Self {
        Self {
            trivial: 0.0,
            standard: default_standard_floor(),
            complex: default_complex_floor(),
            critical: default_critical_floor(),
        }
    }
}

fn default_standard_floor() -> f64 {
    0.2
}
fn default_complex_floor() -> f64 {
    0.4
}
fn default_critical_floor() -> f64 {
    0.5
}

/// Provider selection policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SelectorConfig {
    #[serde(default)]
    pub quality_floors: QualityFloors,

    /// Lower bound on the cost term of the ranking score.
    #[serde(default = "default_cost_floor")]
    pub cost_floor: f64,

    /// Spend ratio at which premium providers become ineligible.
    #[serde(default = "default_premium_cutoff")]
    pub premium_cutoff: f64,

    /// Spend ratio at which standard providers become ineligible.
    #[serde(default = "default_standard_cutoff")]
    pub standard_cutoff: f64,

    /// Order premium providers first for critical queries.
    #[serde(default = "default_true")]
    pub critical_prefers_premium: bool,

    /// Token ceiling hinted to providers per class.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: [u32; 4],
}

impl SelectorConfig {
    pub fn max_tokens_for(&self, class: ComplexityClass) -> u32 {
        self.max_tokens[class as usize]
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            quality_floors: QualityFloors::default(),
            cost_floor: default_cost_floor(),
            premium_cutoff: default_premium_cutoff(),
            standard_cutoff: default_standard_cutoff(),
            critical_prefers_premium: true,
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_cost_floor() -> f64 {
    0.0001
}
fn default_premium_cutoff() -> f64 {
    0.8
}
fn default_standard_cutoff() -> f64 {
    0.95
}
fn default_max_tokens() -> [u32; 4] {
    [256, 1024, 4096, 4096]
}

/// Fallback chain configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FallbackConfig {
    /// Maximum providers attempted per decision.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Per-call timeout for providers without their own.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Cooldown after a rate-limited response.
    #[serde(default = "default_rate_limit_cooldown_secs")]
    pub rate_limit_cooldown_secs: u64,

    /// Cooldown after an authentication failure.
    #[serde(default = "default_auth_cooldown_secs")]
    pub auth_cooldown_secs: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            default_timeout_ms: default_timeout_ms(),
            rate_limit_cooldown_secs: default_rate_limit_cooldown_secs(),
            auth_cooldown_secs: default_auth_cooldown_secs(),
        }
    }
}

fn default_max_attempts() -> usize {
    3
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_rate_limit_cooldown_secs() -> u64 {
    30
}
fn default_auth_cooldown_secs() -> u64 {
    300
}

/// Request coalescing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BatchingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// How long the first batchable query waits for company.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Per-query latency ceiling; the window never exceeds a quarter of it.
    #[serde(default = "default_latency_ceiling_ms")]
    pub latency_ceiling_ms: u64,
}

impl BatchingConfig {
    /// Coalescing window after applying the latency ceiling.
    pub fn effective_window_ms(&self) -> u64 {
        self.window_ms.min(self.latency_ceiling_ms / 4)
    }
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: default_window_ms(),
            max_batch_size: default_max_batch_size(),
            latency_ceiling_ms: default_latency_ceiling_ms(),
        }
    }
}

fn default_window_ms() -> u64 {
    50
}
fn default_max_batch_size() -> usize {
    4
}
fn default_latency_ceiling_ms() -> u64 {
    2_000
}

/// Online learning configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LearningConfig {
    /// EMA smoothing factor.
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// Success rate assumed for a provider with no history.
    #[serde(default = "default_prior_success")]
    pub prior_success: f64,

    /// Satisfaction assumed for a provider with no feedback.
    #[serde(default = "default_prior_satisfaction")]
    pub prior_satisfaction: f64,

    /// Half-life of pattern frequency in days.
    #[serde(default = "default_pattern_half_life_days")]
    pub pattern_half_life_days: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            prior_success: default_prior_success(),
            prior_satisfaction: default_prior_satisfaction(),
            pattern_half_life_days: default_pattern_half_life_days(),
        }
    }
}

fn default_alpha() -> f64 {
    0.1
}
fn default_prior_success() -> f64 {
    0.9
}
fn default_prior_satisfaction() -> f64 {
    0.8
}
fn default_pattern_half_life_days() -> f64 {
    7.0
}

/// Background worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Tasks running at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Tasks queued or running before new submissions are dropped.
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            max_pending: default_max_pending(),
        }
    }
}

fn default_max_concurrency() -> usize {
    4
}
fn default_max_pending() -> usize {
    64
}

/// One external inference provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Matches the adapter's `name()`.
    pub id: String,

    pub tier: ProviderTier,

    /// Estimated USD cost of one call.
    #[serde(default)]
    pub cost_per_unit: f64,

    /// Calls per budget period that cost nothing.
    #[serde(default)]
    pub free_tier_calls: Option<u64>,

    /// Per-call timeout; falls back to `fallback.default_timeout_ms`.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = SwitchyardConfig::default();
        assert_eq!(config.learning.alpha, 0.1);
        assert_eq!(config.fallback.max_attempts, 3);
        assert_eq!(config.cost.period, BudgetPeriod::Monthly);
        assert!(config.providers.is_empty());
        assert_eq!(config.selector.max_tokens_for(ComplexityClass::Trivial), 256);
        assert_eq!(config.selector.quality_floors.for_class(ComplexityClass::Critical), 0.5);
    }

    #[test]
    fn batching_window_respects_latency_ceiling() {
        let batching = BatchingConfig {
            window_ms: 900,
            latency_ceiling_ms: 1_000,
            ..BatchingConfig::default()
        };
        assert_eq!(batching.effective_window_ms(), 250);
        assert_eq!(BatchingConfig::default().effective_window_ms(), 50);
    }

    #[test]
    fn providers_deserialize_from_array_of_tables() {
        let toml_str = r#"
[[providers]]
id = "local-llm"
tier = "free"

[[providers]]
id = "frontier"
tier = "premium"
cost_per_unit = 0.03
timeout_ms = 5000
"#;
        let config: SwitchyardConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].tier, ProviderTier::Free);
        assert!(config.providers[0].enabled);
        let frontier = config.provider("frontier").unwrap();
        assert_eq!(frontier.cost_per_unit, 0.03);
        assert_eq!(frontier.timeout_ms, Some(5000));
    }

    #[test]
    fn provider_requires_id_and_tier() {
        let toml_str = r#"
[[providers]]
id = "x"
"#;
        assert!(toml::from_str::<SwitchyardConfig>(toml_str).is_err());
    }
}
