// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response reuse for Switchyard: the exact and semantic response cache,
//! single-flight deduplication of identical in-flight queries, and batch
//! coalescing of similar non-urgent queries.

pub mod batch;
pub mod inflight;
pub mod similarity;
pub mod store;

pub use batch::{BatchCoalescer, BatchKey, BatchReply};
pub use inflight::SingleFlight;
pub use similarity::cosine_similarity;
pub use store::{CacheHit, ResponseCache, is_time_sensitive};
