// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Switchyard integration tests.
//!
//! Provides scripted adapters and a test harness for fast, deterministic,
//! CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`ScriptedProvider`] - Provider adapter driven by a queue of scripted outcomes
//! - [`BagOfWordsEmbedder`] - Deterministic embedder for the semantic cache tier
//! - [`TestHarness`] - Engine over a temp SQLite database

pub mod harness;
pub mod mock_embedder;
pub mod mock_provider;

pub use harness::{TestHarness, TestHarnessBuilder, provider_config};
pub use mock_embedder::BagOfWordsEmbedder;
pub use mock_provider::{ScriptedProvider, Step};
