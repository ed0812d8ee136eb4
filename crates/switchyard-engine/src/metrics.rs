// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade; without an installed recorder every call is a
//! no-op.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use switchyard_core::RoutePath;

/// Register all Switchyard metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("switchyard_route_total", "Routing decisions by path");
    describe_counter!(
        "switchyard_provider_attempts_total",
        "Provider calls by provider and outcome"
    );
    describe_gauge!("switchyard_spend_usd_total", "Cumulative upstream spend in USD");
    describe_counter!("switchyard_prefetch_total", "Predicted answers stored");
    describe_histogram!(
        "switchyard_route_latency_seconds",
        "End-to-end route latency in seconds"
    );
}

pub fn record_route(path: RoutePath) {
    metrics::counter!("switchyard_route_total", "path" => path.to_string()).increment(1);
}

pub fn record_attempt(provider: &str, outcome: &'static str) {
    metrics::counter!(
        "switchyard_provider_attempts_total",
        "provider" => provider.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_spend(provider: &str, usd: f64) {
    metrics::gauge!("switchyard_spend_usd_total", "provider" => provider.to_string()).increment(usd);
}

pub fn record_prefetch() {
    metrics::counter!("switchyard_prefetch_total").increment(1);
}

pub fn record_latency(seconds: f64) {
    metrics::histogram!("switchyard_route_latency_seconds").record(seconds);
}
