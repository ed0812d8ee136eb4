// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter and repository trait definitions.
//!
//! Adapters extend the [`PluginAdapter`] base trait and use `#[async_trait]`
//! for dynamic dispatch. Repositories are the injected state stores the
//! engine reads and writes; SQLite and in-memory implementations live in
//! other crates.

pub mod adapter;
pub mod embedding;
pub mod provider;
pub mod store;

pub use adapter::PluginAdapter;
pub use embedding::EmbeddingAdapter;
pub use provider::ProviderAdapter;
pub use store::{CacheRepository, DecisionLog, StatsStore};
