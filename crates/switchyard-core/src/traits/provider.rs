// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for external inference services.

use async_trait::async_trait;

use crate::traits::adapter::PluginAdapter;
use crate::types::{ProviderError, ProviderReply, ProviderRequest};

/// Uniform contract every external inference provider exposes.
///
/// Failures are reported as a tagged [`ProviderError`] so the fallback chain
/// can react to the kind (timeout, rate limit, auth, server) without
/// inspecting messages.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Answers one query (plus any batched same-intent queries).
    async fn call(&self, request: &ProviderRequest) -> Result<ProviderReply, ProviderError>;
}
