// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engine assembly.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use dashmap::DashMap;
use switchyard_cache::{BatchCoalescer, ResponseCache, SingleFlight};
use switchyard_config::model::SwitchyardConfig;
use switchyard_config::validation::validate_config;
use switchyard_core::{EmbeddingAdapter, ProviderAdapter, SwitchyardError};
use switchyard_cost::pricing::baseline_cost;
use switchyard_cost::{BudgetTracker, CostLedger};
use switchyard_learning::FeedbackRecorder;
use switchyard_router::{ProviderSelector, QueryClassifier, TemplateRegistry};
use switchyard_storage::{Database, SqliteStore};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::cooldown::Cooldowns;
use crate::engine::{Inner, RegisteredProvider, RoutingEngine};
use crate::metrics;
use crate::workers::WorkerPool;

/// Collects adapters and storage, then validates and wires the engine.
///
/// Every enabled `[[providers]]` entry needs an adapter whose `name()`
/// matches its id.
pub struct EngineBuilder {
    config: SwitchyardConfig,
    providers: Vec<Arc<dyn ProviderAdapter>>,
    embedder: Option<Arc<dyn EmbeddingAdapter>>,
    database: Option<Database>,
}

impl EngineBuilder {
    pub fn new(config: SwitchyardConfig) -> Self {
        Self {
            config,
            providers: Vec::new(),
            embedder: None,
            database: None,
        }
    }

    pub fn provider(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.providers.push(adapter);
        self
    }

    /// Enables the semantic cache tier.
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingAdapter>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Use an already-open database instead of `storage.database_path`.
    pub fn database(mut self, db: Database) -> Self {
        self.database = Some(db);
        self
    }

    pub async fn build(self) -> Result<RoutingEngine, SwitchyardError> {
        let config = self.config;
        if let Err(errors) = validate_config(&config) {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            return Err(SwitchyardError::Config(messages.join("; ")));
        }

        let mut adapters = self.providers;
        let mut providers = Vec::new();
        for provider in config.providers.iter().filter(|p| p.enabled) {
            let Some(pos) = adapters.iter().position(|a| a.name() == provider.id) else {
                return Err(SwitchyardError::Config(format!(
                    "no adapter registered for provider `{}`",
                    provider.id
                )));
            };
            providers.push(RegisteredProvider {
                config: provider.clone(),
                adapter: adapters.swap_remove(pos),
            });
        }
        if let Some(stray) = adapters.first() {
            return Err(SwitchyardError::Config(format!(
                "adapter `{}` has no enabled [[providers]] entry",
                stray.name()
            )));
        }
        if providers.is_empty() {
            return Err(SwitchyardError::Config(
                "at least one enabled provider is required".to_string(),
            ));
        }

        let db = match self.database {
            Some(db) => db,
            None => Database::open_with(&config.storage).await?,
        };
        let store = SqliteStore::new(db.clone());
        let ledger = CostLedger::new(db);
        let budget = match BudgetTracker::from_ledger(&config.cost, &ledger).await {
            Ok(tracker) => tracker,
            Err(e) => {
                warn!(error = %e, "could not restore period spend, starting from zero");
                BudgetTracker::new(&config.cost)
            }
        };

        let shared = Arc::new(store.clone());
        let recorder = FeedbackRecorder::new(shared.clone(), shared.clone(), &config.learning);

        let mut cache = ResponseCache::new(&config.cache).with_repository(shared.clone());
        if let Some(embedder) = &self.embedder {
            cache = cache.with_embedder(Arc::clone(embedder));
        }

        metrics::register_metrics();

        let inner = Arc::new(Inner {
            classifier: QueryClassifier::new(&config.classifier),
            templates: TemplateRegistry::new(&config.templates),
            selector: ProviderSelector::new(&config.selector),
            cache,
            flights: SingleFlight::new(),
            batches: BatchCoalescer::new(
                Duration::from_millis(config.batching.effective_window_ms()),
                config.batching.max_batch_size,
            ),
            providers,
            embedder: self.embedder,
            recorder,
            decisions: shared,
            ledger,
            budget: Mutex::new(budget),
            cooldowns: Cooldowns::new(&config.fallback),
            workers: WorkerPool::new(&config.workers),
            sessions: DashMap::new(),
            last_sweep_ms: AtomicU64::new(0),
            started: Instant::now(),
            baseline_usd: baseline_cost(&config),
            store,
            config,
        });

        let warmer = Arc::clone(&inner);
        inner.workers.submit(None, "cache_warm", async move {
            match warmer.cache.warm().await {
                Ok(loaded) => debug!(loaded, "cache warmed"),
                Err(e) => warn!(error = %e, "cache warm failed"),
            }
        });

        info!(
            providers = inner.providers.len(),
            semantic_cache = inner.cache.has_semantic_tier(),
            budget_usd = ?inner.config.cost.period_budget_usd,
            "routing engine ready"
        );
        Ok(RoutingEngine { inner })
    }
}
