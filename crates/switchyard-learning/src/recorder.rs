// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The feedback recorder: serializes statistic updates per key and persists
//! them through the injected stores.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use switchyard_config::model::LearningConfig;
use switchyard_core::{
    ComplexityClass, DecisionId, DecisionLog, Pattern, ProviderStats, StatsStore,
    SwitchyardError,
};
use tracing::{debug, warn};

use crate::ema::{self, Observation, PatternSighting};
use crate::locks::KeyedLocks;

/// Result of applying late user feedback.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackOutcome {
    Applied {
        provider: Option<ProviderStats>,
        pattern: Option<Pattern>,
    },
    /// The decision already carried feedback; nothing changed.
    AlreadyRecorded,
}

/// A likely follow-up pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub pattern: Pattern,
    pub probability: f64,
}

pub struct FeedbackRecorder {
    stats: Arc<dyn StatsStore>,
    decisions: Arc<dyn DecisionLog>,
    locks: KeyedLocks,
    config: LearningConfig,
}

impl FeedbackRecorder {
    pub fn new(
        stats: Arc<dyn StatsStore>,
        decisions: Arc<dyn DecisionLog>,
        config: &LearningConfig,
    ) -> Self {
        Self {
            stats,
            decisions,
            locks: KeyedLocks::new(),
            config: config.clone(),
        }
    }

    /// Stored statistics for the bucket, or the configured prior.
    pub async fn provider_stats(
        &self,
        provider_id: &str,
        class: ComplexityClass,
    ) -> Result<ProviderStats, SwitchyardError> {
        Ok(self
            .stats
            .get_provider_stats(provider_id, class)
            .await?
            .unwrap_or_else(|| ema::prior_stats(provider_id, class, &self.config, Utc::now())))
    }

    pub async fn list_provider_stats(&self) -> Result<Vec<ProviderStats>, SwitchyardError> {
        self.stats.list_provider_stats().await
    }

    async fn observe_provider(
        &self,
        provider_id: &str,
        class: ComplexityClass,
        observation: Observation,
    ) -> Result<ProviderStats, SwitchyardError> {
        let _guard = self.locks.lock(&format!("provider:{provider_id}:{class}")).await;
        let current = self.provider_stats(provider_id, class).await?;
        let next = ema::apply(&current, observation, self.config.alpha, Utc::now());
        self.stats.put_provider_stats(&next).await?;
        debug!(
            provider = provider_id,
            class = %class,
            success_rate = next.success_rate,
            satisfaction = next.satisfaction,
            "provider stats updated"
        );
        Ok(next)
    }

    /// Record one provider attempt. Latency counts only for successes.
    pub async fn record_attempt(
        &self,
        provider_id: &str,
        class: ComplexityClass,
        success: bool,
        latency: Option<Duration>,
    ) -> Result<ProviderStats, SwitchyardError> {
        let observation = Observation::Attempt {
            success,
            latency_ms: latency.map(|l| l.as_secs_f64() * 1000.0),
        };
        self.observe_provider(provider_id, class, observation).await
    }

    /// Apply late satisfaction for a decision, at most once.
    ///
    /// The decision is marked as rated only after the statistics it feeds
    /// were written, so a failed update can be retried.
    pub async fn record_feedback(
        &self,
        decision_id: &DecisionId,
        satisfaction: f64,
    ) -> Result<FeedbackOutcome, SwitchyardError> {
        if !(0.0..=1.0).contains(&satisfaction) {
            return Err(SwitchyardError::InvalidFeedback(satisfaction));
        }
        let _feedback = self.locks.lock(&format!("feedback:{decision_id}")).await;
        let decision = self
            .decisions
            .get_decision(decision_id)
            .await?
            .ok_or_else(|| SwitchyardError::UnknownDecision(decision_id.to_string()))?;

        if decision.satisfaction.is_some() {
            debug!(decision_id = %decision_id, "duplicate feedback ignored");
            return Ok(FeedbackOutcome::AlreadyRecorded);
        }

        let provider = match &decision.provider_id {
            // Coalesced joiners did not call the provider themselves.
            Some(id) if !decision.coalesced => Some(
                self.observe_provider(id, decision.class, Observation::Satisfaction(satisfaction))
                    .await?,
            ),
            _ => None,
        };

        let pattern = match &decision.pattern {
            Some(signature) => {
                let _guard = self.locks.lock(&format!("pattern:{signature}")).await;
                match self.stats.get_pattern(signature).await? {
                    Some(existing) => {
                        let next = ema::pattern_feedback(&existing, satisfaction, self.config.alpha);
                        self.stats.put_pattern(&next).await?;
                        Some(next)
                    }
                    None => None,
                }
            }
            None => None,
        };

        if !self.decisions.set_satisfaction(decision_id, satisfaction).await? {
            warn!(decision_id = %decision_id, "decision was rated concurrently by another writer");
        }
        Ok(FeedbackOutcome::Applied { provider, pattern })
    }

    pub async fn pattern(&self, signature: &str) -> Result<Option<Pattern>, SwitchyardError> {
        self.stats.get_pattern(signature).await
    }

    /// Fold one resolved query into its pattern.
    pub async fn observe_pattern(
        &self,
        sighting: &PatternSighting<'_>,
    ) -> Result<Pattern, SwitchyardError> {
        let _guard = self.locks.lock(&format!("pattern:{}", sighting.signature)).await;
        let existing = self.stats.get_pattern(sighting.signature).await?;
        let next = ema::observe_pattern(existing.as_ref(), sighting, &self.config, Utc::now());
        self.stats.put_pattern(&next).await?;
        Ok(next)
    }

    pub async fn record_transition(&self, from: &str, to: &str) -> Result<(), SwitchyardError> {
        if from == to {
            return Ok(());
        }
        self.stats.record_transition(from, to).await
    }

    /// Follow-ups of `from` whose share of observed transitions is at least
    /// `min_probability`, most likely first.
    pub async fn predict_followups(
        &self,
        from: &str,
        min_probability: f64,
        limit: usize,
    ) -> Result<Vec<Prediction>, SwitchyardError> {
        let transitions = self.stats.transitions_from(from).await?;
        let total: u64 = transitions.iter().map(|(_, n)| n).sum();
        if total == 0 {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for (to, count) in transitions {
            if out.len() >= limit {
                break;
            }
            let probability = count as f64 / total as f64;
            if probability < min_probability {
                // Sorted by count, nothing after this qualifies.
                break;
            }
            if let Some(pattern) = self.stats.get_pattern(&to).await? {
                out.push(Prediction {
                    pattern,
                    probability,
                });
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use std::sync::atomic::{AtomicBool, Ordering};
    use switchyard_core::{DecisionState, RoutePath, RoutingDecision, SessionId};

    fn recorder() -> (FeedbackRecorder, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let recorder = FeedbackRecorder::new(
            store.clone(),
            store.clone(),
            &LearningConfig::default(),
        );
        (recorder, store)
    }

    fn decision(id: &DecisionId, provider: Option<&str>, pattern: Option<&str>) -> RoutingDecision {
        RoutingDecision {
            id: id.clone(),
            query_id: "q".into(),
            session_id: SessionId("s".into()),
            query_hash: "h".into(),
            class: ComplexityClass::Standard,
            path: RoutePath::Provider,
            provider_id: provider.map(str::to_string),
            cost_usd: 0.01,
            latency_ms: 100,
            state: DecisionState::Succeeded,
            pattern: pattern.map(str::to_string),
            coalesced: false,
            satisfaction: None,
            created_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    #[tokio::test]
    async fn unknown_provider_starts_from_prior() {
        let (recorder, _) = recorder();
        let stats = recorder
            .provider_stats("fresh", ComplexityClass::Complex)
            .await
            .unwrap();
        assert_eq!(stats.success_rate, 0.9);
        assert_eq!(stats.satisfaction, 0.8);
        assert_eq!(stats.samples, 0);
    }

    #[tokio::test]
    async fn attempts_are_persisted_per_class() {
        let (recorder, store) = recorder();
        recorder
            .record_attempt("a", ComplexityClass::Standard, false, None)
            .await
            .unwrap();
        let stored = store
            .get_provider_stats("a", ComplexityClass::Standard)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.success_rate < 0.9);
        assert!(
            store
                .get_provider_stats("a", ComplexityClass::Complex)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn feedback_applies_once() {
        let (recorder, store) = recorder();
        let id = DecisionId::new();
        store
            .record_decision(&decision(&id, Some("a"), None))
            .await
            .unwrap();

        let first = recorder.record_feedback(&id, 0.0).await.unwrap();
        let FeedbackOutcome::Applied { provider, .. } = first else {
            panic!("expected feedback to apply");
        };
        let after_first = provider.unwrap().satisfaction;
        assert!(after_first < 0.8);

        let second = recorder.record_feedback(&id, 1.0).await.unwrap();
        assert_eq!(second, FeedbackOutcome::AlreadyRecorded);
        let stats = recorder
            .provider_stats("a", ComplexityClass::Standard)
            .await
            .unwrap();
        assert_eq!(stats.satisfaction, after_first);
    }

    /// Provider-stat writes fail while `broken` is set.
    struct BrittleStats {
        inner: Arc<InMemoryStore>,
        broken: AtomicBool,
    }

    #[async_trait::async_trait]
    impl StatsStore for BrittleStats {
        async fn get_provider_stats(
            &self,
            provider_id: &str,
            class: ComplexityClass,
        ) -> Result<Option<ProviderStats>, SwitchyardError> {
            self.inner.get_provider_stats(provider_id, class).await
        }

        async fn put_provider_stats(&self, stats: &ProviderStats) -> Result<(), SwitchyardError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(SwitchyardError::Storage {
                    source: Box::new(std::io::Error::other("disk full")),
                });
            }
            self.inner.put_provider_stats(stats).await
        }

        async fn list_provider_stats(&self) -> Result<Vec<ProviderStats>, SwitchyardError> {
            self.inner.list_provider_stats().await
        }

        async fn get_pattern(&self, signature: &str) -> Result<Option<Pattern>, SwitchyardError> {
            self.inner.get_pattern(signature).await
        }

        async fn put_pattern(&self, pattern: &Pattern) -> Result<(), SwitchyardError> {
            self.inner.put_pattern(pattern).await
        }

        async fn record_transition(&self, from: &str, to: &str) -> Result<(), SwitchyardError> {
            self.inner.record_transition(from, to).await
        }

        async fn transitions_from(&self, from: &str) -> Result<Vec<(String, u64)>, SwitchyardError> {
            self.inner.transitions_from(from).await
        }
    }

    #[tokio::test]
    async fn failed_feedback_can_be_retried() {
        let store = Arc::new(InMemoryStore::new());
        let stats = Arc::new(BrittleStats {
            inner: store.clone(),
            broken: AtomicBool::new(true),
        });
        let recorder =
            FeedbackRecorder::new(stats.clone(), store.clone(), &LearningConfig::default());
        let id = DecisionId::new();
        store
            .record_decision(&decision(&id, Some("a"), None))
            .await
            .unwrap();

        assert!(matches!(
            recorder.record_feedback(&id, 0.0).await,
            Err(SwitchyardError::Storage { .. })
        ));
        let logged = store.get_decision(&id).await.unwrap().unwrap();
        assert_eq!(logged.satisfaction, None);

        stats.broken.store(false, Ordering::SeqCst);
        let retried = recorder.record_feedback(&id, 0.0).await.unwrap();
        let FeedbackOutcome::Applied { provider, .. } = retried else {
            panic!("expected the retry to apply");
        };
        assert!(provider.unwrap().satisfaction < 0.8);
        let logged = store.get_decision(&id).await.unwrap().unwrap();
        assert_eq!(logged.satisfaction, Some(0.0));
        assert_eq!(
            recorder.record_feedback(&id, 1.0).await.unwrap(),
            FeedbackOutcome::AlreadyRecorded
        );
    }

    #[tokio::test]
    async fn feedback_rejects_unknown_and_out_of_range() {
        let (recorder, _) = recorder();
        let id = DecisionId::new();
        assert!(matches!(
            recorder.record_feedback(&id, 0.5).await,
            Err(SwitchyardError::UnknownDecision(_))
        ));
        assert!(matches!(
            recorder.record_feedback(&id, 1.5).await,
            Err(SwitchyardError::InvalidFeedback(_))
        ));
        assert!(matches!(
            recorder.record_feedback(&id, f64::NAN).await,
            Err(SwitchyardError::InvalidFeedback(_))
        ));
    }

    #[tokio::test]
    async fn feedback_moves_pattern_success() {
        let (recorder, store) = recorder();
        let sighting = PatternSighting {
            signature: "invoice missing",
            exemplar: "my invoice is missing",
            complexity: 0.3,
            success: Some(1.0),
        };
        recorder.observe_pattern(&sighting).await.unwrap();
        let id = DecisionId::new();
        store
            .record_decision(&decision(&id, None, Some("invoice missing")))
            .await
            .unwrap();

        let outcome = recorder.record_feedback(&id, 0.0).await.unwrap();
        let FeedbackOutcome::Applied { provider, pattern } = outcome else {
            panic!("expected feedback to apply");
        };
        assert!(provider.is_none());
        assert!((pattern.unwrap().success_rate - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn followups_respect_probability_and_limit() {
        let (recorder, _) = recorder();
        for sig in ["billing", "refund", "shipping"] {
            recorder
                .observe_pattern(&PatternSighting {
                    signature: sig,
                    exemplar: sig,
                    complexity: 0.2,
                    success: None,
                })
                .await
                .unwrap();
        }
        for _ in 0..3 {
            recorder.record_transition("billing", "refund").await.unwrap();
        }
        recorder.record_transition("billing", "shipping").await.unwrap();
        recorder.record_transition("billing", "billing").await.unwrap();

        let predictions = recorder.predict_followups("billing", 0.3, 2).await.unwrap();
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].pattern.signature, "refund");
        assert!((predictions[0].probability - 0.75).abs() < 1e-9);

        let loose = recorder.predict_followups("billing", 0.1, 1).await.unwrap();
        assert_eq!(loose.len(), 1);
    }
}
