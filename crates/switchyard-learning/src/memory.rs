// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`StatsStore`] and [`DecisionLog`] for tests and ephemeral
//! deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use switchyard_core::{
    ComplexityClass, DecisionId, DecisionLog, Pattern, ProviderStats, RoutingDecision,
    StatsStore, SwitchyardError,
};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryStore {
    stats: RwLock<HashMap<(String, ComplexityClass), ProviderStats>>,
    patterns: RwLock<HashMap<String, Pattern>>,
    transitions: RwLock<HashMap<String, HashMap<String, u64>>>,
    decisions: RwLock<HashMap<String, RoutingDecision>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatsStore for InMemoryStore {
    async fn get_provider_stats(
        &self,
        provider_id: &str,
        class: ComplexityClass,
    ) -> Result<Option<ProviderStats>, SwitchyardError> {
        let stats = self.stats.read().await;
        Ok(stats.get(&(provider_id.to_string(), class)).cloned())
    }

    async fn put_provider_stats(&self, stats: &ProviderStats) -> Result<(), SwitchyardError> {
        self.stats
            .write()
            .await
            .insert((stats.provider_id.clone(), stats.class), stats.clone());
        Ok(())
    }

    async fn list_provider_stats(&self) -> Result<Vec<ProviderStats>, SwitchyardError> {
        let mut all: Vec<ProviderStats> = self.stats.read().await.values().cloned().collect();
        all.sort_by(|a, b| {
            (a.provider_id.as_str(), a.class.to_string())
                .cmp(&(b.provider_id.as_str(), b.class.to_string()))
        });
        Ok(all)
    }

    async fn get_pattern(&self, signature: &str) -> Result<Option<Pattern>, SwitchyardError> {
        Ok(self.patterns.read().await.get(signature).cloned())
    }

    async fn put_pattern(&self, pattern: &Pattern) -> Result<(), SwitchyardError> {
        self.patterns
            .write()
            .await
            .insert(pattern.signature.clone(), pattern.clone());
        Ok(())
    }

    async fn record_transition(&self, from: &str, to: &str) -> Result<(), SwitchyardError> {
        let mut transitions = self.transitions.write().await;
        *transitions
            .entry(from.to_string())
            .or_default()
            .entry(to.to_string())
            .or_insert(0) += 1;
        Ok(())
    }

    async fn transitions_from(&self, from: &str) -> Result<Vec<(String, u64)>, SwitchyardError> {
        let transitions = self.transitions.read().await;
        let mut out: Vec<(String, u64)> = transitions
            .get(from)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default();
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(out)
    }
}

#[async_trait]
impl DecisionLog for InMemoryStore {
    async fn record_decision(&self, decision: &RoutingDecision) -> Result<(), SwitchyardError> {
        self.decisions
            .write()
            .await
            .insert(decision.id.as_str().to_string(), decision.clone());
        Ok(())
    }

    async fn get_decision(
        &self,
        id: &DecisionId,
    ) -> Result<Option<RoutingDecision>, SwitchyardError> {
        Ok(self.decisions.read().await.get(id.as_str()).cloned())
    }

    async fn set_satisfaction(
        &self,
        id: &DecisionId,
        satisfaction: f64,
    ) -> Result<bool, SwitchyardError> {
        let mut decisions = self.decisions.write().await;
        match decisions.get_mut(id.as_str()) {
            Some(decision) if decision.satisfaction.is_none() => {
                decision.satisfaction = Some(satisfaction);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transitions_are_ordered_by_count() {
        let store = InMemoryStore::new();
        store.record_transition("a", "b").await.unwrap();
        store.record_transition("a", "c").await.unwrap();
        store.record_transition("a", "c").await.unwrap();
        let next = store.transitions_from("a").await.unwrap();
        assert_eq!(next, vec![("c".to_string(), 2), ("b".to_string(), 1)]);
        assert!(store.transitions_from("z").await.unwrap().is_empty());
    }
}
