// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes:
//! probability ranges, ordered thresholds, non-negative costs, and unique
//! provider ids. A configuration without providers is valid here; the engine
//! refuses to start without one.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::SwitchyardConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &SwitchyardConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(invalid("storage.database_path must not be empty".to_string()));
    }

    if config.engine.session_idle_ms == 0 {
        errors.push(invalid("engine.session_idle_ms must be at least 1".to_string()));
    }

    // Cost
    if let Some(budget) = config.cost.period_budget_usd {
        non_negative(&mut errors, "cost.period_budget_usd", budget);
    }
    if let Some(baseline) = config.cost.baseline_cost_usd {
        non_negative(&mut errors, "cost.baseline_cost_usd", baseline);
    }
    unit_open(&mut errors, "cost.warn_ratio", config.cost.warn_ratio);

    // Classifier
    let c = &config.classifier;
    for (name, weight) in [
        ("classifier.length_weight", c.length_weight),
        ("classifier.keyword_weight", c.keyword_weight),
        ("classifier.history_weight", c.history_weight),
        ("classifier.emotion_weight", c.emotion_weight),
        ("classifier.depth_weight", c.depth_weight),
        ("classifier.elevated_urgency_bonus", c.elevated_urgency_bonus),
    ] {
        unit(&mut errors, name, weight);
    }
    if !(0.0 < c.standard_threshold
        && c.standard_threshold < c.complex_threshold
        && c.complex_threshold < c.critical_threshold
        && c.critical_threshold <= 1.0)
    {
        errors.push(invalid(format!(
            "classifier thresholds must satisfy 0 < standard < complex < critical <= 1, got {} / {} / {}",
            c.standard_threshold, c.complex_threshold, c.critical_threshold
        )));
    }
    if c.max_query_chars == 0 {
        errors.push(invalid("classifier.max_query_chars must be at least 1".to_string()));
    }

    // Templates
    for (i, entry) in config.templates.entries.iter().enumerate() {
        if entry.triggers.iter().all(|t| t.trim().is_empty()) {
            errors.push(invalid(format!(
                "templates.entries[{i}] must have at least one non-empty trigger"
            )));
        }
    }

    // Cache
    let cache = &config.cache;
    if cache.max_entries == 0 {
        errors.push(invalid("cache.max_entries must be at least 1".to_string()));
    }
    if cache.standard_ttl_secs == 0 || cache.volatile_ttl_secs == 0 {
        errors.push(invalid("cache TTLs must be greater than zero".to_string()));
    }
    unit_open(&mut errors, "cache.semantic_threshold", f64::from(cache.semantic_threshold));
    unit_open(&mut errors, "cache.degraded_similarity", f64::from(cache.degraded_similarity));
    unit(&mut errors, "cache.evict_below_success", cache.evict_below_success);

    // Prediction
    unit(
        &mut errors,
        "prediction.min_transition_probability",
        config.prediction.min_transition_probability,
    );
    non_negative(
        &mut errors,
        "prediction.session_max_spend_usd",
        config.prediction.session_max_spend_usd,
    );

    // Selector
    let s = &config.selector;
    for class in switchyard_core::ComplexityClass::ALL {
        unit(
            &mut errors,
            &format!("selector.quality_floors.{class}"),
            s.quality_floors.for_class(class),
        );
    }
    if s.cost_floor <= 0.0 {
        errors.push(invalid(format!(
            "selector.cost_floor must be greater than zero, got {}",
            s.cost_floor
        )));
    }
    if !(0.0 < s.premium_cutoff && s.premium_cutoff <= s.standard_cutoff && s.standard_cutoff <= 1.0)
    {
        errors.push(invalid(format!(
            "selector cutoffs must satisfy 0 < premium_cutoff <= standard_cutoff <= 1, got {} / {}",
            s.premium_cutoff, s.standard_cutoff
        )));
    }

    // Fallback
    if config.fallback.max_attempts == 0 {
        errors.push(invalid("fallback.max_attempts must be at least 1".to_string()));
    }
    if config.fallback.default_timeout_ms == 0 {
        errors.push(invalid("fallback.default_timeout_ms must be greater than zero".to_string()));
    }

    // Batching
    if config.batching.max_batch_size == 0 {
        errors.push(invalid("batching.max_batch_size must be at least 1".to_string()));
    }

    // Learning
    let l = &config.learning;
    unit_open(&mut errors, "learning.alpha", l.alpha);
    unit(&mut errors, "learning.prior_success", l.prior_success);
    unit(&mut errors, "learning.prior_satisfaction", l.prior_satisfaction);
    if l.pattern_half_life_days <= 0.0 {
        errors.push(invalid(format!(
            "learning.pattern_half_life_days must be greater than zero, got {}",
            l.pattern_half_life_days
        )));
    }

    // Workers
    if config.workers.max_concurrency == 0 {
        errors.push(invalid("workers.max_concurrency must be at least 1".to_string()));
    }
    if config.workers.max_pending < config.workers.max_concurrency {
        errors.push(invalid(format!(
            "workers.max_pending ({}) must be at least workers.max_concurrency ({})",
            config.workers.max_pending, config.workers.max_concurrency
        )));
    }

    // Providers
    let mut seen_ids = HashSet::new();
    for (i, provider) in config.providers.iter().enumerate() {
        if provider.id.trim().is_empty() {
            errors.push(invalid(format!("providers[{i}].id must not be empty")));
        } else if !seen_ids.insert(provider.id.as_str()) {
            errors.push(invalid(format!(
                "duplicate provider id `{}` in [[providers]] array",
                provider.id
            )));
        }
        non_negative(
            &mut errors,
            &format!("providers[{i}].cost_per_unit"),
            provider.cost_per_unit,
        );
        if provider.timeout_ms == Some(0) {
            errors.push(invalid(format!(
                "providers[{i}].timeout_ms must be greater than zero"
            )));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Validation { message }
}

fn non_negative(errors: &mut Vec<ConfigError>, name: &str, value: f64) {
    if !(value.is_finite() && value >= 0.0) {
        errors.push(invalid(format!("{name} must be non-negative, got {value}")));
    }
}

/// Value in [0, 1].
fn unit(errors: &mut Vec<ConfigError>, name: &str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(invalid(format!("{name} must be within [0, 1], got {value}")));
    }
}

/// Value in (0, 1].
fn unit_open(errors: &mut Vec<ConfigError>, name: &str, value: f64) {
    if !(value > 0.0 && value <= 1.0) {
        errors.push(invalid(format!("{name} must be within (0, 1], got {value}")));
    }
}
