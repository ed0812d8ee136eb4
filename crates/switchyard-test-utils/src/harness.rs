// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end routing tests.
//!
//! `TestHarness` assembles a complete engine over scripted providers and a
//! temp SQLite database, and keeps handles to both for assertions.

use std::sync::Arc;

use switchyard_config::model::{ProviderConfig, SwitchyardConfig};
use switchyard_core::{
    ConversationContext, DecisionId, DecisionLog, ProviderTier, RoutingDecision, SwitchyardError,
};
use switchyard_engine::{EngineBuilder, RoutingEngine};
use switchyard_storage::{Database, SqliteStore};

use crate::mock_embedder::BagOfWordsEmbedder;
use crate::mock_provider::ScriptedProvider;

/// `[[providers]]` entry for a test provider.
pub fn provider_config(id: &str, tier: ProviderTier, cost_per_unit: f64) -> ProviderConfig {
    ProviderConfig {
        id: id.to_string(),
        tier,
        cost_per_unit,
        free_tier_calls: None,
        timeout_ms: None,
        enabled: true,
    }
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: SwitchyardConfig,
    providers: Vec<Arc<ScriptedProvider>>,
    semantic: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = SwitchyardConfig::default();
        // Background prefetch makes call counts racy; tests opt in.
        config.prediction.enabled = false;
        Self {
            config,
            providers: Vec::new(),
            semantic: false,
        }
    }

    /// Register a provider and its config entry.
    pub fn provider(mut self, config: ProviderConfig, provider: ScriptedProvider) -> Self {
        self.config.providers.push(config);
        self.providers.push(Arc::new(provider));
        self
    }

    /// Adjust the configuration before the engine is built.
    pub fn configure(mut self, f: impl FnOnce(&mut SwitchyardConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Enable the semantic cache tier with a [`BagOfWordsEmbedder`].
    pub fn with_embedder(mut self) -> Self {
        self.semantic = true;
        self
    }

    /// Set a per-period budget cap.
    pub fn with_budget(mut self, usd: f64) -> Self {
        self.config.cost.period_budget_usd = Some(usd);
        self
    }

    pub async fn build(mut self) -> Result<TestHarness, SwitchyardError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| SwitchyardError::Storage {
            source: Box::new(e),
        })?;
        self.config.storage.database_path = temp_dir
            .path()
            .join("switchyard.db")
            .to_string_lossy()
            .to_string();

        let embedder = self.semantic.then(|| Arc::new(BagOfWordsEmbedder::new()));
        let (engine, db) = assemble(&self.config, &self.providers, embedder.as_ref()).await?;

        Ok(TestHarness {
            engine,
            store: SqliteStore::new(db.clone()),
            db,
            providers: self.providers,
            embedder,
            config: self.config,
            _temp_dir: temp_dir,
        })
    }
}

async fn assemble(
    config: &SwitchyardConfig,
    providers: &[Arc<ScriptedProvider>],
    embedder: Option<&Arc<BagOfWordsEmbedder>>,
) -> Result<(RoutingEngine, Database), SwitchyardError> {
    let db = Database::open_with(&config.storage).await?;
    let mut builder = EngineBuilder::new(config.clone()).database(db.clone());
    for provider in providers {
        builder = builder.provider(provider.clone());
    }
    if let Some(embedder) = embedder {
        builder = builder.embedder(embedder.clone());
    }
    Ok((builder.build().await?, db))
}

/// A complete routing environment with scripted providers and temp storage.
pub struct TestHarness {
    pub engine: RoutingEngine,
    /// Direct access to the engine's database.
    pub db: Database,
    pub store: SqliteStore,
    pub providers: Vec<Arc<ScriptedProvider>>,
    pub embedder: Option<Arc<BagOfWordsEmbedder>>,
    pub config: SwitchyardConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub fn provider(&self, id: &str) -> Option<&Arc<ScriptedProvider>> {
        self.providers.iter().find(|p| p.id() == id)
    }

    /// Total calls across all providers.
    pub fn total_calls(&self) -> usize {
        self.providers.iter().map(|p| p.calls()).sum()
    }

    /// A context for `session` with no history.
    pub fn context(&self, session: &str) -> ConversationContext {
        ConversationContext::new(session)
    }

    pub async fn decision(&self, id: &DecisionId) -> Result<Option<RoutingDecision>, SwitchyardError> {
        self.store.get_decision(id).await
    }

    /// Shut the engine down and build a fresh one over the same database.
    pub async fn restart(&mut self) -> Result<(), SwitchyardError> {
        self.engine.shutdown().await;
        let (engine, db) = assemble(&self.config, &self.providers, self.embedder.as_ref()).await?;
        self.store = SqliteStore::new(db.clone());
        self.db = db;
        self.engine = engine;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::RoutePath;

    async fn harness() -> TestHarness {
        TestHarness::builder()
            .provider(
                provider_config("standard", ProviderTier::Standard, 0.002),
                ScriptedProvider::new("standard").with_cost(0.002),
            )
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn builder_creates_working_environment() {
        let h = harness().await;
        let result = h
            .engine
            .route("Explain how compound interest works over ten years", &h.context("s1"))
            .await;
        assert_eq!(result.path, RoutePath::Provider);
        assert_eq!(h.total_calls(), 1);
        let logged = h.decision(&result.decision_id).await.unwrap().unwrap();
        assert_eq!(logged.path, RoutePath::Provider);
    }

    #[tokio::test]
    async fn temp_db_is_unique_per_harness() {
        let h1 = harness().await;
        let h2 = harness().await;
        assert_ne!(h1.config.storage.database_path, h2.config.storage.database_path);
    }

    #[tokio::test]
    async fn restart_keeps_the_database() {
        let mut h = harness().await;
        let result = h
            .engine
            .route("Describe the water cycle in detail", &h.context("s1"))
            .await;
        h.restart().await.unwrap();
        assert!(h.decision(&result.decision_id).await.unwrap().is_some());
    }
}
