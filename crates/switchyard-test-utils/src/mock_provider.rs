// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted provider adapter for deterministic testing.
//!
//! `ScriptedProvider` implements `ProviderAdapter` with a queue of scripted
//! outcomes, so tests can drive the fallback chain, cooldowns, and learning
//! without a network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use switchyard_core::{
    AdapterType, HealthStatus, PluginAdapter, ProviderAdapter, ProviderError, ProviderErrorKind,
    ProviderReply, ProviderRequest, SwitchyardError,
};

/// What one call does.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Answer with this text.
    Reply(String),
    /// Fail with this kind.
    Fail(ProviderErrorKind),
    /// Never answer.
    Hang,
}

/// A provider whose calls follow a script.
///
/// Scripted steps are consumed in order. Once the script runs out every
/// call follows the fallback behavior: answer with `"<id>: <query>"`, or
/// fail if [`ScriptedProvider::set_failing`] is active.
pub struct ScriptedProvider {
    id: String,
    usage_cost: f64,
    delay: Duration,
    script: Mutex<VecDeque<Step>>,
    failing: Mutex<Option<ProviderErrorKind>>,
    requests: Mutex<Vec<ProviderRequest>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    /// Create a provider that always answers and costs nothing.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            usage_cost: 0.0,
            delay: Duration::ZERO,
            script: Mutex::new(VecDeque::new()),
            failing: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Cost reported for every successful call.
    pub fn with_cost(mut self, usage_cost: f64) -> Self {
        self.usage_cost = usage_cost;
        self
    }

    /// Latency added to every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Pre-load the script.
    pub fn with_script(self, steps: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(VecDeque::from(steps)),
            ..self
        }
    }

    /// Fail every unscripted call with `kind`.
    pub fn failing(self, kind: ProviderErrorKind) -> Self {
        Self {
            failing: Mutex::new(Some(kind)),
            ..self
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn push_step(&self, step: Step) {
        self.script.lock().await.push_back(step);
    }

    /// Switch the fallback behavior between failing and answering.
    pub async fn set_failing(&self, kind: Option<ProviderErrorKind>) {
        *self.failing.lock().await = kind;
    }

    /// Calls received so far, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, oldest first.
    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }

    async fn next_step(&self, request: &ProviderRequest) -> Step {
        if let Some(step) = self.script.lock().await.pop_front() {
            return step;
        }
        match *self.failing.lock().await {
            Some(kind) => Step::Fail(kind),
            None => Step::Reply(format!("{}: {}", self.id, request.query)),
        }
    }
}

#[async_trait]
impl PluginAdapter for ScriptedProvider {
    fn name(&self) -> &str {
        &self.id
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, SwitchyardError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SwitchyardError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedProvider {
    async fn call(&self, request: &ProviderRequest) -> Result<ProviderReply, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request.clone());
        let step = self.next_step(request).await;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match step {
            Step::Reply(text) => Ok(ProviderReply {
                text,
                usage_cost: self.usage_cost,
                latency: self.delay,
            }),
            Step::Fail(kind) => Err(ProviderError::new(kind, format!("{} scripted failure", self.id))),
            Step::Hang => std::future::pending().await,
        }
    }
}
