// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic bag-of-words embedder.
//!
//! Content words are hashed into a fixed number of buckets and the vector is
//! L2-normalized, so texts with the same content words embed identically and
//! partial overlap gives a proportionally lower cosine similarity.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use switchyard_core::text::{normalize, strip_stopwords};
use switchyard_core::{
    AdapterType, EmbeddingAdapter, HealthStatus, PluginAdapter, SwitchyardError,
};

const DIMENSIONS: usize = 256;

pub struct BagOfWordsEmbedder {
    calls: AtomicUsize,
    broken: AtomicBool,
}

impl BagOfWordsEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            broken: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every later call fail.
    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMENSIONS];
        for word in strip_stopwords(&normalize(text)).split_whitespace() {
            v[bucket(word)] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

impl Default for BagOfWordsEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

/// FNV-1a.
fn bucket(word: &str) -> usize {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in word.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    (hash % DIMENSIONS as u64) as usize
}

#[async_trait]
impl PluginAdapter for BagOfWordsEmbedder {
    fn name(&self) -> &str {
        "bag-of-words"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, SwitchyardError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SwitchyardError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for BagOfWordsEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SwitchyardError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken.load(Ordering::SeqCst) {
            return Err(SwitchyardError::Internal("embedder offline".to_string()));
        }
        Ok(Self::vector(text))
    }
}
