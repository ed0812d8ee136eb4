// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure statistic transitions.
//!
//! Every learned number moves through one of these functions: given the old
//! value and an observation they return the new value and touch nothing
//! else. The recorder owns persistence and locking.

use chrono::{DateTime, Utc};
use switchyard_config::model::LearningConfig;
use switchyard_core::types::timestamp;
use switchyard_core::{ComplexityClass, Pattern, ProviderStats};

/// One thing learned about a provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Observation {
    /// A call finished. Latency is recorded for successes only.
    Attempt { success: bool, latency_ms: Option<f64> },
    /// Late user satisfaction in [0, 1].
    Satisfaction(f64),
}

/// Exponential moving average step.
pub fn ema(previous: f64, sample: f64, alpha: f64) -> f64 {
    alpha * sample + (1.0 - alpha) * previous
}

fn ema_unit(previous: f64, sample: f64, alpha: f64) -> f64 {
    ema(previous, sample.clamp(0.0, 1.0), alpha).clamp(0.0, 1.0)
}

/// Statistics for a (provider, class) bucket with no history.
pub fn prior_stats(
    provider_id: &str,
    class: ComplexityClass,
    config: &LearningConfig,
    now: DateTime<Utc>,
) -> ProviderStats {
    ProviderStats {
        provider_id: provider_id.to_string(),
        class,
        success_rate: config.prior_success,
        satisfaction: config.prior_satisfaction,
        avg_latency_ms: 0.0,
        samples: 0,
        updated_at: timestamp(now),
    }
}

/// Apply one observation to provider statistics.
pub fn apply(
    stats: &ProviderStats,
    observation: Observation,
    alpha: f64,
    now: DateTime<Utc>,
) -> ProviderStats {
    let mut next = stats.clone();
    match observation {
        Observation::Attempt {
            success,
            latency_ms,
        } => {
            next.success_rate = ema_unit(stats.success_rate, if success { 1.0 } else { 0.0 }, alpha);
            next.samples = stats.samples.saturating_add(1);
            if let Some(latency) = latency_ms.filter(|l| success && l.is_finite() && *l >= 0.0) {
                next.avg_latency_ms = if stats.avg_latency_ms <= 0.0 {
                    latency
                } else {
                    ema(stats.avg_latency_ms, latency, alpha)
                };
            }
        }
        Observation::Satisfaction(score) => {
            next.satisfaction = ema_unit(stats.satisfaction, score, alpha);
        }
    }
    next.updated_at = timestamp(now);
    next
}

/// Frequency after exponential decay with the given half-life.
pub fn decayed_frequency(
    frequency: f64,
    last_seen: DateTime<Utc>,
    now: DateTime<Utc>,
    half_life_days: f64,
) -> f64 {
    let elapsed_days = (now - last_seen).num_milliseconds().max(0) as f64 / 86_400_000.0;
    frequency * 0.5_f64.powf(elapsed_days / half_life_days)
}

/// What one resolved query says about its pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternSighting<'a> {
    pub signature: &'a str,
    pub exemplar: &'a str,
    pub complexity: f64,
    /// `None` when the outcome carries no quality signal.
    pub success: Option<f64>,
}

/// Fold a sighting into a pattern, creating it on first sight.
pub fn observe_pattern(
    existing: Option<&Pattern>,
    sighting: &PatternSighting<'_>,
    config: &LearningConfig,
    now: DateTime<Utc>,
) -> Pattern {
    let complexity = sighting.complexity.clamp(0.0, 1.0);
    match existing {
        None => Pattern {
            signature: sighting.signature.to_string(),
            frequency: 1.0,
            success_rate: sighting
                .success
                .map_or(config.prior_success, |s| s.clamp(0.0, 1.0)),
            avg_complexity: complexity,
            exemplar: sighting.exemplar.to_string(),
            last_seen: now,
        },
        Some(pattern) => Pattern {
            signature: pattern.signature.clone(),
            frequency: decayed_frequency(
                pattern.frequency,
                pattern.last_seen,
                now,
                config.pattern_half_life_days,
            ) + 1.0,
            success_rate: sighting.success.map_or(pattern.success_rate, |s| {
                ema_unit(pattern.success_rate, s, config.alpha)
            }),
            avg_complexity: ema(pattern.avg_complexity, complexity, config.alpha).clamp(0.0, 1.0),
            exemplar: sighting.exemplar.to_string(),
            last_seen: now,
        },
    }
}

/// Fold late satisfaction into a pattern's success rate without counting
/// another occurrence.
pub fn pattern_feedback(pattern: &Pattern, satisfaction: f64, alpha: f64) -> Pattern {
    Pattern {
        success_rate: ema_unit(pattern.success_rate, satisfaction, alpha),
        ..pattern.clone()
    }
}
