// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Online learning for Switchyard.
//!
//! Provider statistics are keyed by (provider, complexity class) and move by
//! exponential moving average; pattern statistics track decaying frequency,
//! success and complexity per topic signature. All transitions live in
//! [`ema`] as pure functions, and [`FeedbackRecorder`] applies them under
//! per-key locks.

pub mod ema;
pub mod locks;
pub mod memory;
pub mod recorder;

pub use ema::{Observation, PatternSighting};
pub use locks::KeyedLocks;
pub use memory::InMemoryStore;
pub use recorder::{FeedbackOutcome, FeedbackRecorder, Prediction};
