// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fallback chain execution.
//!
//! The chain is a lazy stream of tagged attempts: a provider is only called
//! once every provider before it has failed. Each attempt is reported to an
//! [`AttemptObserver`] as soon as it finishes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt, stream};
use switchyard_core::{
    ComplexityClass, ProviderAdapter, ProviderError, ProviderErrorKind, ProviderProfile,
    ProviderReply, ProviderRequest,
};
use tokio::time::Instant;
use tracing::{debug, warn};

/// One provider in a chain.
#[derive(Clone)]
pub struct ChainLink {
    pub profile: ProviderProfile,
    pub adapter: Arc<dyn ProviderAdapter>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success(ProviderReply),
    Failed(ProviderError),
}

/// A finished provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub profile: ProviderProfile,
    pub outcome: AttemptOutcome,
    pub elapsed: Duration,
}

impl Attempt {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Success(_))
    }

    /// Outcome tag: `success` or the error kind.
    pub fn tag(&self) -> &'static str {
        match &self.outcome {
            AttemptOutcome::Success(_) => "success",
            AttemptOutcome::Failed(e) => kind_tag(e.kind),
        }
    }
}

pub(crate) fn kind_tag(kind: ProviderErrorKind) -> &'static str {
    match kind {
        ProviderErrorKind::Timeout => "timeout",
        ProviderErrorKind::RateLimited => "rate_limited",
        ProviderErrorKind::AuthError => "auth_error",
        ProviderErrorKind::ServerError => "server_error",
    }
}

/// Receives each attempt as it completes.
#[async_trait]
pub trait AttemptObserver: Send + Sync {
    async fn observe(&self, class: ComplexityClass, attempt: &Attempt);
}

/// Everything the chain produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutcome {
    pub attempts: Vec<Attempt>,
}

impl ChainOutcome {
    /// The successful attempt, always the last one when present.
    pub fn success(&self) -> Option<(&ProviderProfile, &ProviderReply)> {
        self.attempts.last().and_then(|a| match &a.outcome {
            AttemptOutcome::Success(reply) => Some((&a.profile, reply)),
            AttemptOutcome::Failed(_) => None,
        })
    }
}

/// Lazy stream of attempts over `chain`.
pub fn attempts<'a>(
    chain: Vec<ChainLink>,
    request: &'a ProviderRequest,
) -> impl Stream<Item = Attempt> + Send + 'a {
    stream::iter(chain).then(move |link| async move {
        let started = Instant::now();
        let outcome = match tokio::time::timeout(link.timeout, link.adapter.call(request)).await {
            Ok(Ok(reply)) => AttemptOutcome::Success(reply),
            Ok(Err(e)) => AttemptOutcome::Failed(e),
            Err(_) => AttemptOutcome::Failed(ProviderError::new(
                ProviderErrorKind::Timeout,
                format!("no reply within {}ms", link.timeout.as_millis()),
            )),
        };
        Attempt {
            profile: link.profile,
            outcome,
            elapsed: started.elapsed(),
        }
    })
}

/// Walk `chain` until a provider succeeds or the chain runs out.
pub async fn execute(
    chain: Vec<ChainLink>,
    request: &ProviderRequest,
    class: ComplexityClass,
    observer: &dyn AttemptObserver,
) -> ChainOutcome {
    let mut stream = std::pin::pin!(attempts(chain, request));
    let mut outcome = ChainOutcome {
        attempts: Vec::new(),
    };

    while let Some(attempt) = stream.next().await {
        observer.observe(class, &attempt).await;
        let done = attempt.is_success();
        match &attempt.outcome {
            AttemptOutcome::Success(_) => debug!(
                provider = %attempt.profile.id,
                elapsed_ms = attempt.elapsed.as_millis() as u64,
                "provider answered"
            ),
            AttemptOutcome::Failed(e) => warn!(
                provider = %attempt.profile.id,
                kind = %e.kind,
                error = %e.message,
                "provider attempt failed, advancing"
            ),
        }
        outcome.attempts.push(attempt);
        if done {
            break;
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use switchyard_core::{
        AdapterType, BudgetHint, ConversationContext, HealthStatus, PluginAdapter,
        ProviderTier, SwitchyardError,
    };

    enum Behavior {
        Reply,
        Fail(ProviderErrorKind),
        Hang,
    }

    struct StubProvider {
        id: &'static str,
        behavior: Behavior,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PluginAdapter for StubProvider {
        fn name(&self) -> &str {
            self.id
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
    impl ProviderAdapter for StubProvider {
        async fn call(&self, _request: &ProviderRequest) -> Result<ProviderReply, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Reply => Ok(ProviderReply {
                    text: format!("answer from {}", self.id),
                    usage_cost: 0.01,
                    latency: Duration::from_millis(5),
                }),
                Behavior::Fail(kind) => Err(ProviderError::new(kind, "scripted")),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(ProviderError::new(ProviderErrorKind::ServerError, "unreachable"))
                }
            }
        }
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<(String, &'static str)>>);

    #[async_trait]
    impl AttemptObserver for Recording {
        async fn observe(&self, _class: ComplexityClass, attempt: &Attempt) {
            self.0
                .lock()
                .unwrap()
                .push((attempt.profile.id.clone(), attempt.tag()));
        }
    }

    fn link(id: &'static str, behavior: Behavior) -> (ChainLink, Arc<StubProvider>) {
        let provider = Arc::new(StubProvider {
            id,
            behavior,
            calls: AtomicUsize::new(0),
        });
        let link = ChainLink {
            profile: ProviderProfile {
                id: id.to_string(),
                tier: ProviderTier::Standard,
                cost_per_unit: 0.01,
                success_rate: 0.9,
                avg_latency_ms: 0.0,
                satisfaction: 0.8,
                free_calls_remaining: None,
                on_cooldown: false,
            },
            adapter: provider.clone(),
            timeout: Duration::from_millis(100),
        };
        (link, provider)
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            query: "question".into(),
            context: ConversationContext::new("s"),
            hint: BudgetHint {
                class: ComplexityClass::Standard,
                max_cost_usd: None,
                max_tokens: 1024,
            },
            batch: Vec::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_advances_to_next_provider() {
        let (a, _) = link("a", Behavior::Hang);
        let (b, _) = link("b", Behavior::Reply);
        let observer = Recording::default();

        let outcome = execute(vec![a, b], &request(), ComplexityClass::Standard, &observer).await;

        let (profile, reply) = outcome.success().unwrap();
        assert_eq!(profile.id, "b");
        assert_eq!(reply.text, "answer from b");
        assert_eq!(
            *observer.0.lock().unwrap(),
            vec![("a".to_string(), "timeout"), ("b".to_string(), "success")]
        );
    }

    #[tokio::test]
    async fn stops_at_first_success() {
        let (a, a_calls) = link("a", Behavior::Reply);
        let (b, b_calls) = link("b", Behavior::Reply);
        let outcome = execute(
            vec![a, b],
            &request(),
            ComplexityClass::Standard,
            &Recording::default(),
        )
        .await;
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(a_calls.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exhausted_chain_has_no_success() {
        let (a, _) = link("a", Behavior::Fail(ProviderErrorKind::RateLimited));
        let (b, _) = link("b", Behavior::Fail(ProviderErrorKind::ServerError));
        let observer = Recording::default();
        let outcome = execute(vec![a, b], &request(), ComplexityClass::Standard, &observer).await;
        assert!(outcome.success().is_none());
        let tags: Vec<&str> = outcome.attempts.iter().map(Attempt::tag).collect();
        assert_eq!(tags, vec!["rate_limited", "server_error"]);
    }

    #[tokio::test]
    async fn empty_chain_yields_nothing() {
        let outcome = execute(
            Vec::new(),
            &request(),
            ComplexityClass::Standard,
            &Recording::default(),
        )
        .await;
        assert!(outcome.attempts.is_empty());
        assert!(outcome.success().is_none());
    }
}
