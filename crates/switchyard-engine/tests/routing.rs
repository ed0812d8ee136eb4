// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end routing through local, cache, provider, and degraded paths.

use std::time::Duration;

use futures::future::join_all;
use switchyard_core::{
    ComplexityClass, ConversationContext, DecisionState, ProviderErrorKind, ProviderTier,
    RoutePath, Urgency,
};
use switchyard_engine::{CancellationToken, ReportPeriod, RoutingEngine};
use switchyard_test_utils::{ScriptedProvider, Step, TestHarness, provider_config};

const APOLOGY: &str = "Sorry, I can't answer that right now. Please try again in a moment.";

async fn single_provider(provider: ScriptedProvider) -> TestHarness {
    let id = provider.id().to_string();
    TestHarness::builder()
        .provider(provider_config(&id, ProviderTier::Standard, 0.002), provider)
        .build()
        .await
        .unwrap()
}

/// Wait until every background task has finished.
async fn settle(engine: &RoutingEngine) {
    for _ in 0..200 {
        if engine.pending_background_tasks() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("background tasks did not settle");
}

#[tokio::test]
async fn greeting_is_answered_locally() {
    let h = single_provider(ScriptedProvider::new("std").with_cost(0.002)).await;

    let result = h.engine.route("Hello!", &h.context("s1")).await;

    assert_eq!(result.path, RoutePath::Local);
    assert_eq!(result.state, DecisionState::Succeeded);
    assert_eq!(result.text, "Hello! How can I help you today?");
    assert_eq!(result.cost_usd, 0.0);
    assert_eq!(h.total_calls(), 0);
}

#[tokio::test]
async fn unreadable_input_asks_for_clarification() {
    let h = single_provider(ScriptedProvider::new("std")).await;

    let result = h.engine.route("  ?!  ", &h.context("s1")).await;

    assert!(result.needs_clarification);
    assert_eq!(result.path, RoutePath::Local);
    assert!(result.text.contains("rephrase"));
    assert_eq!(h.total_calls(), 0);
}

#[tokio::test]
async fn repeated_query_is_served_from_cache() {
    let h = single_provider(ScriptedProvider::new("std").with_cost(0.002)).await;
    let ctx = h.context("s1");

    let first = h.engine.route("What is the capital of France?", &ctx).await;
    let second = h.engine.route("what is the capital of france", &ctx).await;

    assert_eq!(first.path, RoutePath::Provider);
    assert_eq!(first.provider_id.as_deref(), Some("std"));
    assert_eq!(first.cost_usd, 0.002);
    assert_eq!(second.path, RoutePath::Cache);
    assert_eq!(second.text, first.text);
    assert_eq!(second.cost_usd, 0.0);
    assert_eq!(h.total_calls(), 1);
}

#[tokio::test]
async fn paraphrase_hits_the_semantic_tier() {
    let h = TestHarness::builder()
        .provider(
            provider_config("std", ProviderTier::Standard, 0.002),
            ScriptedProvider::new("std").with_cost(0.002),
        )
        .with_embedder()
        .build()
        .await
        .unwrap();
    let ctx = h.context("s1");

    let first = h.engine.route("How do I reset my password?", &ctx).await;
    let second = h.engine.route("how can I reset the password", &ctx).await;

    assert_eq!(first.path, RoutePath::Provider);
    assert_eq!(second.path, RoutePath::Cache);
    assert_eq!(second.text, first.text);
    assert_eq!(h.total_calls(), 1);
}

#[tokio::test]
async fn failed_provider_falls_through_to_the_next() {
    let h = TestHarness::builder()
        .provider(
            provider_config("cheap", ProviderTier::Standard, 0.001),
            ScriptedProvider::new("cheap").failing(ProviderErrorKind::ServerError),
        )
        .provider(
            provider_config("backup", ProviderTier::Standard, 0.002),
            ScriptedProvider::new("backup").with_cost(0.002),
        )
        .build()
        .await
        .unwrap();

    let result = h
        .engine
        .route("Which planet has the most moons?", &h.context("s1"))
        .await;

    assert_eq!(result.path, RoutePath::Provider);
    assert_eq!(result.provider_id.as_deref(), Some("backup"));
    assert_eq!(result.text, "backup: Which planet has the most moons?");
    assert_eq!(h.provider("cheap").unwrap().calls(), 1);
    assert_eq!(h.provider("backup").unwrap().calls(), 1);
}

#[tokio::test]
async fn hanging_provider_times_out_and_falls_through() {
    let mut slow = provider_config("slow", ProviderTier::Standard, 0.001);
    slow.timeout_ms = Some(50);
    let h = TestHarness::builder()
        .provider(slow, ScriptedProvider::new("slow").with_script(vec![Step::Hang]))
        .provider(
            provider_config("backup", ProviderTier::Standard, 0.002),
            ScriptedProvider::new("backup"),
        )
        .build()
        .await
        .unwrap();

    let result = h
        .engine
        .route("How far away is the moon?", &h.context("s1"))
        .await;

    assert_eq!(result.provider_id.as_deref(), Some("backup"));
    assert_eq!(result.state, DecisionState::Succeeded);
}

#[tokio::test]
async fn rate_limited_provider_cools_down() {
    let h = TestHarness::builder()
        .provider(
            provider_config("cheap", ProviderTier::Standard, 0.001),
            ScriptedProvider::new("cheap")
                .with_script(vec![Step::Fail(ProviderErrorKind::RateLimited)]),
        )
        .provider(
            provider_config("backup", ProviderTier::Standard, 0.002),
            ScriptedProvider::new("backup"),
        )
        .build()
        .await
        .unwrap();
    let ctx = h.context("s1");

    let first = h.engine.route("Who painted the Mona Lisa?", &ctx).await;
    let second = h.engine.route("Who wrote the Odyssey?", &ctx).await;

    assert_eq!(first.provider_id.as_deref(), Some("backup"));
    assert_eq!(second.provider_id.as_deref(), Some("backup"));
    assert_eq!(h.provider("cheap").unwrap().calls(), 1);
    let profiles = h.engine.provider_profiles(second.class).await;
    let cheap = profiles.iter().find(|p| p.id == "cheap").unwrap();
    assert!(cheap.on_cooldown);
}

#[tokio::test]
async fn exhausted_chain_serves_an_apology() {
    let h = single_provider(ScriptedProvider::new("std").failing(ProviderErrorKind::ServerError))
        .await;

    let result = h
        .engine
        .route("What is the boiling point of water?", &h.context("s1"))
        .await;

    assert_eq!(result.path, RoutePath::Degraded);
    assert_eq!(result.state, DecisionState::Degraded);
    assert_eq!(result.text, APOLOGY);
    assert_eq!(result.cost_usd, 0.0);
    let logged = h.decision(&result.decision_id).await.unwrap().unwrap();
    assert_eq!(logged.state, DecisionState::Degraded);
}

#[tokio::test]
async fn exhausted_chain_without_apology_fails() {
    let h = TestHarness::builder()
        .provider(
            provider_config("std", ProviderTier::Standard, 0.002),
            ScriptedProvider::new("std").failing(ProviderErrorKind::ServerError),
        )
        .configure(|c| c.templates.apology = None)
        .build()
        .await
        .unwrap();

    let result = h
        .engine
        .route("What is the boiling point of water?", &h.context("s1"))
        .await;

    assert_eq!(result.state, DecisionState::Failed);
    assert_eq!(result.path, RoutePath::Degraded);
    assert!(result.text.is_empty());
}

#[tokio::test]
async fn concurrent_identical_queries_call_upstream_once() {
    let h = single_provider(
        ScriptedProvider::new("std")
            .with_cost(0.002)
            .with_delay(Duration::from_millis(100)),
    )
    .await;
    let contexts: Vec<ConversationContext> =
        (0..5).map(|i| h.context(&format!("s{i}"))).collect();

    let results = join_all(
        contexts
            .iter()
            .map(|ctx| h.engine.route("How many bones are in the human body?", ctx)),
    )
    .await;

    assert_eq!(h.total_calls(), 1);
    assert!(results.iter().all(|r| r.path == RoutePath::Provider));
    assert!(results.iter().all(|r| r.text == results[0].text));
    assert_eq!(results.iter().filter(|r| !r.coalesced).count(), 1);
    let charged: f64 = results.iter().map(|r| r.cost_usd).sum();
    assert!((charged - 0.002).abs() < 1e-9);

    let report = h.engine.get_cost_report(ReportPeriod::All).await.unwrap();
    assert!((report.total_spend_usd - 0.002).abs() < 1e-9);
    assert_eq!(report.decisions(), 5);
}

#[tokio::test]
async fn critical_query_does_not_join_a_lower_class_flight() {
    let h = TestHarness::builder()
        .provider(
            provider_config("free", ProviderTier::Free, 0.0),
            ScriptedProvider::new("free").with_delay(Duration::from_millis(100)),
        )
        .provider(
            provider_config("frontier", ProviderTier::Premium, 0.02),
            ScriptedProvider::new("frontier")
                .with_cost(0.02)
                .with_delay(Duration::from_millis(100)),
        )
        .build()
        .await
        .unwrap();
    let normal_ctx = h.context("s1");
    let critical_ctx = h.context("s2").with_urgency(Urgency::Critical);
    let question = "What is the capital of Peru?";

    let (normal, critical) = tokio::join!(h.engine.route(question, &normal_ctx), async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        h.engine.route(question, &critical_ctx).await
    });

    assert_ne!(normal.class, ComplexityClass::Critical);
    assert_eq!(normal.provider_id.as_deref(), Some("free"));
    assert_eq!(critical.class, ComplexityClass::Critical);
    assert_eq!(critical.path, RoutePath::Provider);
    assert_eq!(critical.provider_id.as_deref(), Some("frontier"));
    assert!(!critical.coalesced);
    assert_eq!(h.provider("frontier").unwrap().calls(), 1);
}

#[tokio::test]
async fn same_intent_queries_share_one_batched_call() {
    let h = single_provider(ScriptedProvider::new("std").with_cost(0.003)).await;
    let ctx = h.context("s1").batchable(true);

    let results = join_all([
        h.engine.route("How to reset password?", &ctx),
        h.engine.route("reset password how", &ctx),
        h.engine.route("password reset how please", &ctx),
    ])
    .await;

    let provider = h.provider("std").unwrap();
    assert_eq!(provider.calls(), 1);
    assert_eq!(provider.requests().await[0].batch.len(), 2);
    assert!(results.iter().all(|r| r.path == RoutePath::Provider));
    assert_eq!(results.iter().filter(|r| r.coalesced).count(), 2);
    for r in &results {
        assert!((r.cost_usd - 0.001).abs() < 1e-9, "share was {}", r.cost_usd);
    }
}

#[tokio::test]
async fn cancelled_query_logs_failure_and_still_fills_the_cache() {
    let h = single_provider(
        ScriptedProvider::new("std").with_delay(Duration::from_millis(200)),
    )
    .await;
    let ctx = h.context("s1");
    let token = CancellationToken::new();

    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        })
    };
    let outcome = h
        .engine
        .route_cancellable("What is the tallest mountain on Earth?", &ctx, &token)
        .await;
    canceller.await.unwrap();
    assert!(matches!(
        outcome,
        Err(switchyard_core::SwitchyardError::Cancelled)
    ));

    // The upstream call keeps running for later callers.
    tokio::time::sleep(Duration::from_millis(400)).await;
    let later = h
        .engine
        .route("What is the tallest mountain on Earth?", &ctx)
        .await;
    assert_eq!(later.path, RoutePath::Cache);
    assert_eq!(h.total_calls(), 1);

    let report = h.engine.get_cost_report(ReportPeriod::All).await.unwrap();
    assert_eq!(report.decisions_by_path.get("degraded"), Some(&1));
    assert_eq!(report.decisions_by_path.get("cache"), Some(&1));
}

#[tokio::test]
async fn uncancelled_token_routes_normally() {
    let h = single_provider(ScriptedProvider::new("std")).await;
    let token = CancellationToken::new();

    let result = h
        .engine
        .route_cancellable("Name the largest ocean", &h.context("s1"), &token)
        .await
        .unwrap();

    assert_eq!(result.path, RoutePath::Provider);
}

#[tokio::test]
async fn likely_follow_up_is_prefetched() {
    let h = TestHarness::builder()
        .provider(
            provider_config("std", ProviderTier::Standard, 0.002),
            ScriptedProvider::new("std").with_cost(0.002),
        )
        .configure(|c| {
            c.prediction.enabled = true;
            c.cache.context_turns_in_key = 1;
        })
        .build()
        .await
        .unwrap();
    let opener = "What are your store opening hours?";
    let follow_up = "Do you offer free shipping options?";

    // Teach the transition opener -> follow-up.
    let first = h.context("s1");
    h.engine.route(opener, &first).await;
    settle(&h.engine).await;
    let with_turn = first
        .clone()
        .with_turns(vec!["I have a question about delivery".to_string()]);
    h.engine.route(follow_up, &with_turn).await;
    settle(&h.engine).await;

    // A new session asks the opener; the follow-up is fetched ahead of time.
    let second = h.context("s2");
    h.engine.route(opener, &second).await;
    settle(&h.engine).await;

    let calls_before = h.total_calls();
    let result = h
        .engine
        .route(follow_up, &second.clone().with_turns(vec![opener.to_string()]))
        .await;
    assert_eq!(result.path, RoutePath::Predictive);
    assert_eq!(result.cost_usd, 0.0);
    assert_eq!(h.total_calls(), calls_before);
}

#[tokio::test]
async fn ended_session_drops_prefetch_state() {
    let h = TestHarness::builder()
        .provider(
            provider_config("std", ProviderTier::Standard, 0.002),
            ScriptedProvider::new("std").with_delay(Duration::from_millis(50)),
        )
        .configure(|c| c.prediction.enabled = true)
        .build()
        .await
        .unwrap();
    let ctx = h.context("s1");

    h.engine.route("What are your store opening hours?", &ctx).await;
    h.engine.end_session(&ctx.session_id);
    settle(&h.engine).await;
    h.engine.shutdown().await;
    assert_eq!(h.engine.pending_background_tasks(), 0);
}

#[tokio::test]
async fn idle_sessions_are_forgotten() {
    let h = TestHarness::builder()
        .provider(
            provider_config("std", ProviderTier::Standard, 0.002),
            ScriptedProvider::new("std"),
        )
        .configure(|c| c.engine.session_idle_ms = 30)
        .build()
        .await
        .unwrap();

    h.engine
        .route("What causes ocean tides?", &h.context("s1"))
        .await;
    settle(&h.engine).await;
    assert_eq!(h.engine.active_sessions(), 1);

    tokio::time::sleep(Duration::from_millis(80)).await;
    h.engine
        .route("Why do leaves change color in autumn?", &h.context("s2"))
        .await;
    assert_eq!(h.engine.active_sessions(), 1);

    h.engine.end_session(&h.context("s2").session_id);
    assert_eq!(h.engine.active_sessions(), 0);
}
