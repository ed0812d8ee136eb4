// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait for the semantic cache tier.

use async_trait::async_trait;

use crate::error::SwitchyardError;
use crate::traits::adapter::PluginAdapter;

/// Converts text into a vector for similarity lookup.
#[async_trait]
pub trait EmbeddingAdapter: PluginAdapter {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SwitchyardError>;
}
