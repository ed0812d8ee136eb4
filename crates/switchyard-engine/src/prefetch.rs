// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Speculative answers for likely follow-up questions.
//!
//! After each turn the engine looks up which patterns usually follow the
//! current one and, on the background pool, asks the cheapest eligible
//! provider for the pattern's exemplar. Results land in the cache as
//! predicted entries under a context-free key.

use std::sync::Arc;

use switchyard_core::{
    ComplexityClass, ConversationContext, EntryOrigin, ProviderRequest, RoutePath, SessionId,
};
use switchyard_cost::pricing::call_cost;
use switchyard_cost::{CostRecord, SpendKind};
use switchyard_learning::Prediction;
use switchyard_router::Selection;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::engine::Inner;
use crate::fallback::kind_tag;
use crate::metrics;

impl Inner {
    /// Queue prefetch work for the follow-ups of `signature`.
    pub(crate) fn schedule_prefetch(self: &Arc<Self>, session: &SessionId, signature: &str) {
        if !self.config.prediction.enabled {
            return;
        }
        let inner = Arc::clone(self);
        let owner = session.clone();
        let from = signature.to_string();
        let accepted = self.workers.submit(Some(session), "prefetch", async move {
            inner.prefetch_followups(&owner, &from).await;
        });
        if !accepted {
            debug!(signature, "prefetch not scheduled");
        }
    }

    async fn prefetch_followups(&self, session: &SessionId, from: &str) {
        let prediction = &self.config.prediction;
        let predictions = match self
            .recorder
            .predict_followups(
                from,
                prediction.min_transition_probability,
                prediction.max_predictions_per_turn,
            )
            .await
        {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, from, "follow-up prediction failed");
                return;
            }
        };

        for predicted in predictions {
            self.prefetch_one(session, predicted).await;
        }
    }

    async fn prefetch_one(&self, session: &SessionId, predicted: Prediction) {
        let exemplar = predicted.pattern.exemplar.as_str();
        if self.templates.matches(exemplar) {
            return;
        }

        // No turns: the key is the context-free one cache lookups fall back to.
        let context = ConversationContext::new(session.as_str());
        let query = self.build_query(exemplar, &context).await;
        if query.class == ComplexityClass::Critical || query.needs_clarification {
            return;
        }
        if self.cache.contains_live(&query.hash).await {
            return;
        }

        let profiles = self.provider_profiles(query.class).await;
        let budget = self.budget_view().await;
        let chain = match self.selector.select(query.class, &profiles, budget, usize::MAX) {
            Selection::Chain(chain) => chain,
            Selection::BudgetExceeded | Selection::NoneAvailable => return,
        };
        let Some(cheapest) = chain
            .into_iter()
            .min_by(|a, b| a.effective_cost().total_cmp(&b.effective_cost()))
        else {
            return;
        };

        let estimate = cheapest.effective_cost();
        if !self.reserve_prediction(session, estimate) {
            debug!(session = session.as_str(), "session prediction allowance spent");
            return;
        }

        let within_free_tier = cheapest.free_calls_remaining.is_some_and(|n| n > 0);
        let Some(link) = self.links(vec![cheapest]).into_iter().next() else {
            self.settle_prediction(session, estimate, 0.0);
            return;
        };
        let request = ProviderRequest {
            query: query.text.clone(),
            context,
            hint: self.selector.budget_hint(query.class, budget),
            batch: Vec::new(),
        };

        let started = Instant::now();
        let reply = match tokio::time::timeout(link.timeout, link.adapter.call(&request)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                self.cooldowns.observe(&link.profile.id, e.kind);
                self.note_attempt(&link.profile.id, query.class, kind_tag(e.kind), None)
                    .await;
                self.settle_prediction(session, estimate, 0.0);
                debug!(provider = %link.profile.id, error = %e, "prefetch call failed");
                return;
            }
            Err(_) => {
                self.note_attempt(&link.profile.id, query.class, "timeout", None)
                    .await;
                self.settle_prediction(session, estimate, 0.0);
                debug!(provider = %link.profile.id, "prefetch call timed out");
                return;
            }
        };
        self.note_attempt(&link.profile.id, query.class, "success", Some(started.elapsed()))
            .await;

        let cost_usd = call_cost(reply.usage_cost, within_free_tier);
        self.settle_prediction(session, estimate, cost_usd);
        self.charge(&link.profile.id, cost_usd).await;
        self.write_ledger(
            CostRecord::new(SpendKind::Prefetch, RoutePath::Predictive, cost_usd, 0.0)
                .with_provider(link.profile.id.clone()),
        )
        .await;

        let embedding = if self.cache.has_semantic_tier() {
            self.cache.embed(&query.normalized).await
        } else {
            None
        };
        let entry = self
            .cache
            .entry_for(&query, &reply.text, EntryOrigin::Predicted, embedding);
        self.cache.insert(entry).await;
        metrics::record_prefetch();
        info!(
            provider = %link.profile.id,
            pattern = %predicted.pattern.signature,
            probability = predicted.probability,
            cost_usd,
            "prefetched follow-up"
        );
    }

    async fn note_attempt(
        &self,
        provider_id: &str,
        class: ComplexityClass,
        tag: &'static str,
        latency: Option<Duration>,
    ) {
        metrics::record_attempt(provider_id, tag);
        if let Err(e) = self
            .recorder
            .record_attempt(provider_id, class, tag == "success", latency)
            .await
        {
            warn!(provider = provider_id, error = %e, "provider stats update failed");
        }
    }

    /// Claim one prediction and `estimate` USD of the session's allowance.
    fn reserve_prediction(&self, session: &SessionId, estimate: f64) -> bool {
        let limits = &self.config.prediction;
        let mut track = self.sessions.entry(session.as_str().to_string()).or_default();
        if track.predictions >= limits.session_max_predictions
            || track.prediction_spend_usd + estimate > limits.session_max_spend_usd
        {
            return false;
        }
        track.predictions += 1;
        track.prediction_spend_usd += estimate;
        true
    }

    /// Replace the reserved estimate with what the call actually cost.
    fn settle_prediction(&self, session: &SessionId, estimate: f64, actual: f64) {
        if let Some(mut track) = self.sessions.get_mut(session.as_str()) {
            track.prediction_spend_usd = (track.prediction_spend_usd - estimate + actual).max(0.0);
        }
    }
}
