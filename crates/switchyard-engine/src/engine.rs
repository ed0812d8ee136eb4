// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The routing pipeline.
//!
//! Every query walks the same stages: classify, answer locally from a
//! template, serve from cache, or escalate to the provider chain. Whatever
//! happens, the caller gets a [`RouteResult`] and exactly one decision is
//! logged.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use switchyard_cache::{BatchCoalescer, BatchKey, ResponseCache, SingleFlight};
use switchyard_config::model::{ProviderConfig, SwitchyardConfig};
use switchyard_core::text::{cache_key, normalize, signature};
use switchyard_core::types::timestamp;
use switchyard_core::{
    ComplexityClass, ConversationContext, DecisionId, DecisionLog, EmbeddingAdapter,
    EntryOrigin, ProviderAdapter, ProviderProfile, ProviderRequest, Query, RoutePath,
    RouteResult, RoutingDecision, SessionId, SwitchyardError, Urgency,
};
use switchyard_cost::pricing::{call_cost, split_cost};
use switchyard_cost::{
    BudgetTracker, CostLedger, CostRecord, CostReport, ReportPeriod, SpendKind, build_report,
};
use switchyard_learning::ema::prior_stats;
use switchyard_learning::{FeedbackOutcome, FeedbackRecorder, PatternSighting};
use switchyard_router::{BudgetView, ProviderSelector, QueryClassifier, Selection, TemplateRegistry};
use switchyard_storage::SqliteStore;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cooldown::Cooldowns;
use crate::decision::DecisionFsm;
use crate::fallback::{self, Attempt, AttemptObserver, AttemptOutcome, ChainLink};
use crate::metrics;
use crate::workers::WorkerPool;

/// Outcome of one upstream resolution, shared by every caller that waited
/// on it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Resolution {
    Answered {
        text: String,
        provider_id: String,
        cost_usd: f64,
    },
    Unavailable {
        reason: &'static str,
    },
}

pub(crate) struct RegisteredProvider {
    pub(crate) config: ProviderConfig,
    pub(crate) adapter: Arc<dyn ProviderAdapter>,
}

/// Per-session routing state.
#[derive(Debug)]
pub(crate) struct SessionTrack {
    pub(crate) last_signature: Option<String>,
    pub(crate) predictions: u32,
    pub(crate) prediction_spend_usd: f64,
    pub(crate) last_seen: Instant,
}

impl Default for SessionTrack {
    fn default() -> Self {
        Self {
            last_signature: None,
            predictions: 0,
            prediction_spend_usd: 0.0,
            last_seen: Instant::now(),
        }
    }
}

pub(crate) struct Inner {
    pub(crate) config: SwitchyardConfig,
    pub(crate) classifier: QueryClassifier,
    pub(crate) templates: TemplateRegistry,
    pub(crate) selector: ProviderSelector,
    pub(crate) cache: ResponseCache,
    pub(crate) flights: SingleFlight<Arc<Resolution>>,
    pub(crate) batches: BatchCoalescer<Arc<Resolution>>,
    pub(crate) providers: Vec<RegisteredProvider>,
    pub(crate) embedder: Option<Arc<dyn EmbeddingAdapter>>,
    pub(crate) recorder: FeedbackRecorder,
    pub(crate) decisions: Arc<dyn DecisionLog>,
    pub(crate) ledger: CostLedger,
    pub(crate) budget: Mutex<BudgetTracker>,
    pub(crate) cooldowns: Cooldowns,
    pub(crate) workers: WorkerPool,
    pub(crate) sessions: DashMap<String, SessionTrack>,
    /// Milliseconds after `started` at which idle sessions were last swept.
    pub(crate) last_sweep_ms: AtomicU64,
    pub(crate) started: Instant,
    pub(crate) baseline_usd: f64,
    pub(crate) store: SqliteStore,
}

/// A decision on its way to the caller, not yet persisted.
pub(crate) struct Routed {
    id: DecisionId,
    query: Query,
    fsm: DecisionFsm,
    text: String,
    provider_id: Option<String>,
    cost_usd: f64,
    coalesced: bool,
    /// Ledger row the caller still owes.
    ledger: Option<CostRecord>,
    /// Quality signal for the query's pattern.
    signal: Option<f64>,
}

impl Routed {
    fn new(id: DecisionId, query: Query) -> Self {
        Self {
            id,
            query,
            fsm: DecisionFsm::new(),
            text: String::new(),
            provider_id: None,
            cost_usd: 0.0,
            coalesced: false,
            ledger: None,
            signal: None,
        }
    }

    fn step(&mut self, f: impl FnOnce(&mut DecisionFsm) -> Result<(), SwitchyardError>) {
        if let Err(e) = f(&mut self.fsm) {
            warn!(decision_id = %self.id, error = %e, "decision state machine rejected a step");
        }
    }

    /// Zero-cost answer from a local stage.
    fn served(mut self, path: RoutePath, text: &str, baseline_usd: f64) -> Self {
        self.step(|f| f.route(path));
        self.step(DecisionFsm::succeed);
        self.text = text.to_string();
        self.ledger = Some(
            CostRecord::new(SpendKind::Route, path, 0.0, baseline_usd).for_decision(&self.id),
        );
        self
    }

    fn answered(mut self, text: &str, provider_id: &str, cost_usd: f64) -> Self {
        self.step(|f| f.route(RoutePath::Provider));
        self.step(DecisionFsm::succeed);
        self.text = text.to_string();
        self.provider_id = Some(provider_id.to_string());
        self.cost_usd = cost_usd;
        self.signal = Some(1.0);
        self
    }

    fn path(&self) -> RoutePath {
        self.fsm.path().unwrap_or(RoutePath::Degraded)
    }
}

/// The query router.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct RoutingEngine {
    pub(crate) inner: Arc<Inner>,
}

impl RoutingEngine {
    /// Route a query. Never fails; the worst case is an apology with
    /// `path = degraded`.
    pub async fn route(&self, text: &str, context: &ConversationContext) -> RouteResult {
        let started = Instant::now();
        let routed = self.inner.resolve(DecisionId::new(), text, context).await;
        self.inner.finish(routed, context, started).await
    }

    /// Route a query unless `cancel` fires first.
    ///
    /// A cancelled query still logs a failed decision. Upstream work it
    /// started keeps running and fills the cache for later callers.
    pub async fn route_cancellable(
        &self,
        text: &str,
        context: &ConversationContext,
        cancel: &CancellationToken,
    ) -> Result<RouteResult, SwitchyardError> {
        let started = Instant::now();
        let id = DecisionId::new();
        let routed = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.inner.abandon(id, text, context, started).await;
                return Err(SwitchyardError::Cancelled);
            }
            routed = self.inner.resolve(id.clone(), text, context) => routed,
        };
        Ok(self.inner.finish(routed, context, started).await)
    }

    /// Apply a late satisfaction score to a logged decision.
    pub async fn record_feedback(
        &self,
        decision_id: &DecisionId,
        satisfaction: f64,
    ) -> Result<FeedbackOutcome, SwitchyardError> {
        let outcome = self
            .inner
            .recorder
            .record_feedback(decision_id, satisfaction)
            .await?;
        if let FeedbackOutcome::Applied {
            pattern: Some(pattern),
            ..
        } = &outcome
        {
            self.inner
                .evict_if_unreliable(&pattern.signature, pattern.success_rate)
                .await;
        }
        Ok(outcome)
    }

    pub async fn get_cost_report(&self, period: ReportPeriod) -> Result<CostReport, SwitchyardError> {
        build_report(&self.inner.ledger, &self.inner.config.cost, period, Utc::now()).await
    }

    /// Cancel the session's background work and forget its routing state.
    ///
    /// Sessions that are never ended expire after `engine.session_idle_ms`
    /// without a routed turn.
    pub fn end_session(&self, session: &SessionId) {
        self.inner.workers.end_session(session);
        self.inner.sessions.remove(session.as_str());
        debug!(session = session.as_str(), "session ended");
    }

    /// Stop background work, release adapters, and checkpoint storage.
    pub async fn shutdown(&self) {
        info!("routing engine shutting down");
        self.inner.workers.shutdown().await;
        for provider in &self.inner.providers {
            if let Err(e) = provider.adapter.shutdown().await {
                warn!(provider = %provider.config.id, error = %e, "provider shutdown failed");
            }
        }
        if let Some(embedder) = &self.inner.embedder {
            if let Err(e) = embedder.shutdown().await {
                warn!(error = %e, "embedder shutdown failed");
            }
        }
        if let Err(e) = self.inner.store.close().await {
            warn!(error = %e, "storage checkpoint failed");
        }
        info!("routing engine stopped");
    }

    /// Merged provider view the selector sees for `class`.
    pub async fn provider_profiles(&self, class: ComplexityClass) -> Vec<ProviderProfile> {
        self.inner.provider_profiles(class).await
    }

    /// Load persisted cache entries. Runs in the background at build time.
    pub async fn warm_cache(&self) -> Result<usize, SwitchyardError> {
        self.inner.cache.warm().await
    }

    pub fn config(&self) -> &SwitchyardConfig {
        &self.inner.config
    }

    /// Background tasks accepted and not yet finished.
    pub fn pending_background_tasks(&self) -> usize {
        self.inner.workers.pending()
    }

    /// Sessions with routing state held in memory.
    pub fn active_sessions(&self) -> usize {
        self.inner.sessions.len()
    }
}

impl Inner {
    /// Build the query and run the pipeline up to the answer.
    pub(crate) async fn resolve(
        self: &Arc<Self>,
        id: DecisionId,
        text: &str,
        context: &ConversationContext,
    ) -> Routed {
        let query = self.build_query(text, context).await;
        let routed = Routed::new(id, query);

        if routed.query.needs_clarification {
            if let Some(reply) = self.templates.clarification() {
                return routed.served(RoutePath::Local, reply, 0.0);
            }
        }

        if routed.query.class == ComplexityClass::Trivial {
            if let Some(reply) = self.templates.respond(text) {
                debug!(decision_id = %routed.id, "template answered");
                return routed.served(RoutePath::Local, reply, self.baseline_usd);
            }
        }

        let embedding = if self.cache.has_semantic_tier() && !routed.query.normalized.is_empty() {
            self.cache.embed(&routed.query.normalized).await
        } else {
            None
        };

        if let Some(hit) = self.cache.lookup(&routed.query, embedding.as_deref()).await {
            let path = match hit.entry.origin {
                EntryOrigin::Predicted => RoutePath::Predictive,
                EntryOrigin::Computed => RoutePath::Cache,
            };
            debug!(decision_id = %routed.id, %path, similarity = ?hit.similarity, "cache answered");
            return routed.served(path, &hit.entry.response, self.baseline_usd);
        }

        if self.should_batch(&routed.query, context) {
            self.resolve_batched(routed, context, embedding).await
        } else {
            self.resolve_single(routed, context, embedding).await
        }
    }

    pub(crate) async fn build_query(&self, text: &str, context: &ConversationContext) -> Query {
        let normalized = normalize(text);
        let signature = signature(&normalized);
        let pattern = match &signature {
            Some(sig) => self.recorder.pattern(sig).await.unwrap_or_else(|e| {
                warn!(error = %e, "pattern lookup failed, classifying without history");
                None
            }),
            None => None,
        };
        let classification = self.classifier.classify(text, context, pattern.as_ref());

        Query {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.to_string(),
            hash: cache_key(
                &normalized,
                &context.recent_turns,
                self.config.cache.context_turns_in_key,
            ),
            normalized,
            class: classification.class,
            score: classification.score,
            emotion: context.emotion,
            urgency: context.urgency,
            session_id: context.session_id.clone(),
            timestamp: timestamp(Utc::now()),
            needs_clarification: classification.needs_clarification,
            signature,
        }
    }

    fn should_batch(&self, query: &Query, context: &ConversationContext) -> bool {
        self.config.batching.enabled
            && context.batchable
            && query.signature.is_some()
            && query.urgency == Urgency::Normal
            && query.class != ComplexityClass::Critical
    }

    /// Escalate with at most one upstream resolution per cache key.
    async fn resolve_single(
        self: &Arc<Self>,
        routed: Routed,
        context: &ConversationContext,
        embedding: Option<Vec<f32>>,
    ) -> Routed {
        let work = {
            let inner = Arc::clone(self);
            let query = routed.query.clone();
            let context = context.clone();
            let embedding = embedding.clone();
            let leader = routed.id.clone();
            async move {
                Arc::new(
                    inner
                        .resolve_upstream(&query, &context, embedding, Vec::new(), Some(&leader))
                        .await,
                )
            }
        };

        // A caller only shares a flight resolved for its own class.
        let key = format!("{}:{}", routed.query.hash, routed.query.class);
        match self.flights.run(&key, work).await {
            Ok((resolution, joined)) => match &*resolution {
                Resolution::Answered {
                    text,
                    provider_id,
                    cost_usd,
                } => {
                    if joined {
                        debug!(decision_id = %routed.id, "joined in-flight resolution");
                        let mut routed = routed.answered(text, provider_id, 0.0);
                        routed.coalesced = true;
                        routed.ledger = Some(
                            CostRecord::new(SpendKind::Route, RoutePath::Provider, 0.0, self.baseline_usd)
                                .for_decision(&routed.id),
                        );
                        routed
                    } else {
                        routed.answered(text, provider_id, *cost_usd)
                    }
                }
                Resolution::Unavailable { reason } => {
                    debug!(decision_id = %routed.id, reason, "no upstream answer");
                    self.degrade(routed, embedding).await
                }
            },
            Err(e) => {
                warn!(error = %e, "upstream resolution failed");
                self.degrade(routed, embedding).await
            }
        }
    }

    /// Escalate through the batch coalescer; the cost is split evenly.
    async fn resolve_batched(
        self: &Arc<Self>,
        routed: Routed,
        context: &ConversationContext,
        embedding: Option<Vec<f32>>,
    ) -> Routed {
        let Some(signature) = routed.query.signature.clone() else {
            return self.resolve_single(routed, context, embedding).await;
        };
        let key = BatchKey {
            signature,
            class: routed.query.class,
        };

        let flush = {
            let inner = Arc::clone(self);
            let query = routed.query.clone();
            let context = context.clone();
            let embedding = embedding.clone();
            move |texts: Vec<String>| async move {
                // The opener's own text travels as the request's query.
                let batch: Vec<String> = texts.into_iter().skip(1).collect();
                Arc::new(
                    inner
                        .resolve_upstream(&query, &context, embedding, batch, None)
                        .await,
                )
            }
        };

        match self.batches.submit(key, routed.query.text.clone(), flush).await {
            Ok(reply) => match &*reply.value {
                Resolution::Answered {
                    text,
                    provider_id,
                    cost_usd,
                } => {
                    let share = split_cost(*cost_usd, reply.members);
                    let mut routed = routed.answered(text, provider_id, share);
                    routed.coalesced = reply.position > 0;
                    let mut record = CostRecord::new(
                        SpendKind::Batch,
                        RoutePath::Provider,
                        share,
                        self.baseline_usd,
                    )
                    .for_decision(&routed.id);
                    // The call is counted once, against the opener.
                    if reply.position == 0 {
                        record = record.with_provider(provider_id.clone());
                    }
                    routed.ledger = Some(record);
                    debug!(
                        decision_id = %routed.id,
                        members = reply.members,
                        position = reply.position,
                        "batched answer"
                    );
                    routed
                }
                Resolution::Unavailable { reason } => {
                    debug!(decision_id = %routed.id, reason, "no upstream answer for batch");
                    self.degrade(routed, embedding).await
                }
            },
            Err(e) => {
                warn!(error = %e, "batch resolution failed");
                self.degrade(routed, embedding).await
            }
        }
    }

    /// Select providers, walk the chain, charge the winner, and fill the
    /// cache. Runs detached from any caller.
    pub(crate) async fn resolve_upstream(
        &self,
        query: &Query,
        context: &ConversationContext,
        embedding: Option<Vec<f32>>,
        batch: Vec<String>,
        ledger_for: Option<&DecisionId>,
    ) -> Resolution {
        let profiles = self.provider_profiles(query.class).await;
        let budget = self.budget_view().await;
        let chain = match self.selector.select(
            query.class,
            &profiles,
            budget,
            self.config.fallback.max_attempts,
        ) {
            Selection::Chain(chain) => chain,
            Selection::BudgetExceeded => {
                return Resolution::Unavailable {
                    reason: "budget_exceeded",
                };
            }
            Selection::NoneAvailable => {
                return Resolution::Unavailable {
                    reason: "none_available",
                };
            }
        };

        let links = self.links(chain);
        let request = ProviderRequest {
            query: query.text.clone(),
            context: context.clone(),
            hint: self.selector.budget_hint(query.class, budget),
            batch,
        };
        let outcome = fallback::execute(links, &request, query.class, self).await;

        let Some((profile, reply)) = outcome.success() else {
            let err = SwitchyardError::AllProvidersFailed {
                attempts: outcome.attempts.len(),
            };
            warn!(class = %query.class, error = %err, "fallback chain exhausted");
            return Resolution::Unavailable { reason: "exhausted" };
        };

        let within_free_tier = profile.free_calls_remaining.is_some_and(|n| n > 0);
        let cost_usd = call_cost(reply.usage_cost, within_free_tier);
        self.charge(&profile.id, cost_usd).await;
        if let Some(id) = ledger_for {
            self.write_ledger(
                CostRecord::new(SpendKind::Route, RoutePath::Provider, cost_usd, self.baseline_usd)
                    .for_decision(id)
                    .with_provider(profile.id.clone()),
            )
            .await;
        }

        if !self.templates.matches(&query.text) {
            let entry = self
                .cache
                .entry_for(query, &reply.text, EntryOrigin::Computed, embedding);
            self.cache.insert(entry).await;
        }

        info!(
            provider = %profile.id,
            class = %query.class,
            cost_usd,
            attempts = outcome.attempts.len(),
            "provider answered"
        );
        Resolution::Answered {
            text: reply.text.clone(),
            provider_id: profile.id.clone(),
            cost_usd,
        }
    }

    /// Best local stand-in after escalation produced nothing.
    async fn degrade(&self, mut routed: Routed, embedding: Option<Vec<f32>>) -> Routed {
        routed.step(|f| f.route(RoutePath::Provider));
        routed.signal = Some(0.0);
        let now = Utc::now();

        let fallback_text = match self.cache.stale_at(&routed.query, now).await {
            Some(entry) => Some(entry.response),
            None => match embedding {
                Some(embedding) => self
                    .cache
                    .degraded_match_at(&routed.query, &embedding, now)
                    .await
                    .map(|hit| hit.entry.response),
                None => None,
            },
        };

        match fallback_text.or_else(|| self.templates.apology().map(str::to_string)) {
            Some(text) => {
                routed.step(DecisionFsm::degrade);
                routed.text = text;
                warn!(decision_id = %routed.id, "serving degraded response");
            }
            None => {
                routed.step(DecisionFsm::fail);
                warn!(decision_id = %routed.id, "no degraded response available");
            }
        }
        routed
    }

    /// Persist the decision, learn from it, and hand the result back.
    pub(crate) async fn finish(
        self: &Arc<Self>,
        routed: Routed,
        context: &ConversationContext,
        started: Instant,
    ) -> RouteResult {
        let latency = started.elapsed();
        let path = routed.path();
        let decision = RoutingDecision {
            id: routed.id.clone(),
            query_id: routed.query.id.clone(),
            session_id: routed.query.session_id.clone(),
            query_hash: routed.query.hash.clone(),
            class: routed.query.class,
            path,
            provider_id: routed.provider_id.clone(),
            cost_usd: routed.cost_usd,
            latency_ms: latency.as_millis() as u64,
            state: routed.fsm.state(),
            pattern: routed.query.signature.clone(),
            coalesced: routed.coalesced,
            satisfaction: None,
            created_at: timestamp(Utc::now()),
        };
        self.log_decision(&decision).await;
        if let Some(record) = routed.ledger {
            self.write_ledger(record).await;
        }
        metrics::record_route(path);
        metrics::record_latency(latency.as_secs_f64());

        if !routed.query.needs_clarification {
            if let Some(sig) = &routed.query.signature {
                self.learn_pattern(&routed.query, sig, routed.signal).await;
                self.track_turn(&context.session_id, sig).await;
            }
        }

        info!(
            decision_id = %routed.id,
            %path,
            class = %routed.query.class,
            cost_usd = routed.cost_usd,
            latency_ms = decision.latency_ms,
            coalesced = routed.coalesced,
            "query routed"
        );

        RouteResult {
            decision_id: routed.id,
            text: routed.text,
            path,
            provider_id: routed.provider_id,
            cost_usd: routed.cost_usd,
            latency,
            state: routed.fsm.state(),
            class: routed.query.class,
            coalesced: routed.coalesced,
            needs_clarification: routed.query.needs_clarification,
        }
    }

    /// Log a failed decision for a cancelled query.
    pub(crate) async fn abandon(
        &self,
        id: DecisionId,
        text: &str,
        context: &ConversationContext,
        started: Instant,
    ) {
        let query = self.build_query(text, context).await;
        let mut fsm = DecisionFsm::new();
        if let Err(e) = fsm.fail() {
            warn!(error = %e, "decision state machine rejected cancellation");
        }
        let decision = RoutingDecision {
            id,
            query_id: query.id,
            session_id: query.session_id,
            query_hash: query.hash,
            class: query.class,
            path: RoutePath::Degraded,
            provider_id: None,
            cost_usd: 0.0,
            latency_ms: started.elapsed().as_millis() as u64,
            state: fsm.state(),
            pattern: query.signature,
            coalesced: false,
            satisfaction: None,
            created_at: timestamp(Utc::now()),
        };
        info!(decision_id = %decision.id, "query cancelled by caller");
        self.log_decision(&decision).await;
        metrics::record_route(RoutePath::Degraded);
    }

    async fn log_decision(&self, decision: &RoutingDecision) {
        if let Err(e) = self.decisions.record_decision(decision).await {
            warn!(decision_id = %decision.id, error = %e, "failed to log decision");
        }
    }

    pub(crate) async fn write_ledger(&self, record: CostRecord) {
        if let Err(e) = self.ledger.record(&record).await {
            warn!(error = %e, cost_usd = record.cost_usd, "failed to write cost record");
        }
    }

    pub(crate) async fn charge(&self, provider_id: &str, cost_usd: f64) {
        self.budget.lock().await.record(cost_usd, Some(provider_id));
        metrics::record_spend(provider_id, cost_usd);
    }

    async fn learn_pattern(&self, query: &Query, signature: &str, signal: Option<f64>) {
        let sighting = PatternSighting {
            signature,
            exemplar: &query.text,
            complexity: query.score,
            success: signal,
        };
        match self.recorder.observe_pattern(&sighting).await {
            Ok(pattern) => {
                self.evict_if_unreliable(signature, pattern.success_rate)
                    .await;
            }
            Err(e) => warn!(error = %e, signature, "pattern update failed"),
        }
    }

    /// Record the topic transition and schedule prefetch of likely
    /// follow-ups.
    async fn track_turn(self: &Arc<Self>, session: &SessionId, signature: &str) {
        self.sweep_idle_sessions();
        let previous = {
            let mut track = self.sessions.entry(session.as_str().to_string()).or_default();
            track.last_seen = Instant::now();
            track.last_signature.replace(signature.to_string())
        };
        if let Some(previous) = previous {
            if let Err(e) = self.recorder.record_transition(&previous, signature).await {
                warn!(error = %e, "pattern transition update failed");
            }
        }
        self.schedule_prefetch(session, signature);
    }

    /// Forget sessions idle for longer than `engine.session_idle_ms`. Runs at
    /// most once per idle window.
    fn sweep_idle_sessions(&self) {
        let idle_ms = self.config.engine.session_idle_ms;
        let now_ms = self.started.elapsed().as_millis() as u64;
        let last = self.last_sweep_ms.load(Ordering::Acquire);
        if now_ms.saturating_sub(last) < idle_ms
            || self
                .last_sweep_ms
                .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            return;
        }

        let idle = Duration::from_millis(idle_ms);
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|track| track.last_seen.elapsed() >= idle)
            .map(|track| track.key().clone())
            .collect();
        for key in expired {
            // Re-checked under the shard lock; a turn may have landed since.
            if self
                .sessions
                .remove_if(&key, |_, track| track.last_seen.elapsed() >= idle)
                .is_some()
            {
                self.workers.end_session(&SessionId(key.clone()));
                debug!(session = key.as_str(), "idle session expired");
            }
        }
    }

    pub(crate) async fn evict_if_unreliable(&self, signature: &str, success_rate: f64) {
        if success_rate < self.config.cache.evict_below_success {
            self.cache.evict_pattern(signature).await;
        }
    }

    pub(crate) async fn budget_view(&self) -> BudgetView {
        let mut budget = self.budget.lock().await;
        BudgetView {
            spend_ratio: budget.spend_ratio(),
            remaining_usd: budget.remaining(),
        }
    }

    pub(crate) async fn provider_profiles(&self, class: ComplexityClass) -> Vec<ProviderProfile> {
        let mut stats = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            let id = &provider.config.id;
            let learned = match self.recorder.provider_stats(id, class).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(provider = %id, error = %e, "provider stats unavailable, using prior");
                    prior_stats(id, class, &self.config.learning, Utc::now())
                }
            };
            stats.push(learned);
        }

        let mut budget = self.budget.lock().await;
        self.providers
            .iter()
            .zip(stats)
            .map(|(provider, learned)| ProviderProfile {
                id: provider.config.id.clone(),
                tier: provider.config.tier,
                cost_per_unit: provider.config.cost_per_unit,
                success_rate: learned.success_rate,
                avg_latency_ms: learned.avg_latency_ms,
                satisfaction: learned.satisfaction,
                free_calls_remaining: budget
                    .free_calls_remaining(&provider.config.id, provider.config.free_tier_calls),
                on_cooldown: self.cooldowns.is_cooling(&provider.config.id),
            })
            .collect()
    }

    pub(crate) fn links(&self, chain: Vec<ProviderProfile>) -> Vec<ChainLink> {
        chain
            .into_iter()
            .filter_map(|profile| {
                let provider = self.providers.iter().find(|p| p.config.id == profile.id)?;
                let timeout_ms = provider
                    .config
                    .timeout_ms
                    .unwrap_or(self.config.fallback.default_timeout_ms);
                Some(ChainLink {
                    profile,
                    adapter: Arc::clone(&provider.adapter),
                    timeout: Duration::from_millis(timeout_ms),
                })
            })
            .collect()
    }
}

#[async_trait]
impl AttemptObserver for Inner {
    async fn observe(&self, class: ComplexityClass, attempt: &Attempt) {
        let provider_id = attempt.profile.id.as_str();
        metrics::record_attempt(provider_id, attempt.tag());
        let (success, latency) = match &attempt.outcome {
            AttemptOutcome::Success(_) => (true, Some(attempt.elapsed)),
            AttemptOutcome::Failed(e) => {
                self.cooldowns.observe(provider_id, e.kind);
                (false, None)
            }
        };
        if let Err(e) = self
            .recorder
            .record_attempt(provider_id, class, success, latency)
            .await
        {
            warn!(provider = provider_id, error = %e, "provider stats update failed");
        }
    }
}
