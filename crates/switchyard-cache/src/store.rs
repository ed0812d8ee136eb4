// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two-tier response cache.
//!
//! The exact tier keys entries by the SHA-256 cache key of the normalized
//! query. The semantic tier, enabled when an embedding adapter is supplied,
//! scans stored embeddings for the closest entry above the similarity
//! threshold. Both tiers refuse entries computed for a less demanding class
//! than the query's. Entries are written through to the cache repository and
//! warmed back into memory at startup.

use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use switchyard_config::model::CacheConfig;
use switchyard_core::text::cache_key;
use switchyard_core::{
    CacheEntry, CacheRepository, EmbeddingAdapter, EntryOrigin, Query, SwitchyardError, Urgency,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::similarity::cosine_similarity;

/// Words that mark an answer as likely to go stale quickly.
const TIME_WORDS: &[&str] = &[
    "today", "now", "latest", "current", "currently", "tonight", "tomorrow", "yesterday",
    "recent", "live",
];

/// Whether normalized text asks about something time-sensitive.
pub fn is_time_sensitive(normalized: &str) -> bool {
    normalized.split_whitespace().any(|w| TIME_WORDS.contains(&w))
}

/// A cache lookup result.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    pub entry: CacheEntry,
    /// Similarity for semantic hits; `None` for exact hits.
    pub similarity: Option<f32>,
}

impl CacheHit {
    pub fn is_exact(&self) -> bool {
        self.similarity.is_none()
    }
}

/// In-memory LRU response cache with optional write-through persistence.
pub struct ResponseCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    config: CacheConfig,
    repo: Option<Arc<dyn CacheRepository>>,
    embedder: Option<Arc<dyn EmbeddingAdapter>>,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            config: config.clone(),
            repo: None,
            embedder: None,
        }
    }

    pub fn with_repository(mut self, repo: Arc<dyn CacheRepository>) -> Self {
        self.repo = Some(repo);
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingAdapter>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn has_semantic_tier(&self) -> bool {
        self.embedder.is_some()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// TTL for an answer to `query`.
    pub fn ttl_for(&self, query: &Query) -> u64 {
        if query.urgency != Urgency::Normal
            || query.is_critical()
            || is_time_sensitive(&query.normalized)
        {
            self.config.volatile_ttl_secs
        } else {
            self.config.standard_ttl_secs
        }
    }

    /// Embed text for the semantic tier. Failures disable the tier for this
    /// call only.
    pub async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed(text).await {
            Ok(v) if !v.is_empty() => Some(v),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "embedding failed, semantic cache skipped");
                None
            }
        }
    }

    /// Build an entry answering `query`.
    pub fn entry_for(
        &self,
        query: &Query,
        response: &str,
        origin: EntryOrigin,
        embedding: Option<Vec<f32>>,
    ) -> CacheEntry {
        let now = Utc::now();
        CacheEntry {
            key: query.hash.clone(),
            response: response.to_string(),
            class: query.class,
            origin,
            pattern: query.signature.clone(),
            embedding,
            created_at: now,
            ttl_secs: self.ttl_for(query),
            hit_count: 0,
            last_access: now,
        }
    }

    pub async fn lookup(&self, query: &Query, embedding: Option<&[f32]>) -> Option<CacheHit> {
        self.lookup_at(query, embedding, Utc::now()).await
    }

    /// Exact tier first, then semantic. Hits refresh recency.
    pub async fn lookup_at(
        &self,
        query: &Query,
        embedding: Option<&[f32]>,
        now: DateTime<Utc>,
    ) -> Option<CacheHit> {
        let bare = cache_key(&query.normalized, &[], 0);
        let mut entries = self.entries.lock().await;

        for key in [&query.hash, &bare] {
            let exact = key == &query.hash;
            if let Some(entry) = entries.get_mut(key) {
                // Context-free keys only ever serve predictions.
                let usable = exact || entry.origin == EntryOrigin::Predicted;
                if usable && entry.is_live(now) && entry.serves(query.class) {
                    entry.hit_count += 1;
                    entry.last_access = now;
                    debug!(key = %key, origin = %entry.origin, "exact cache hit");
                    return Some(CacheHit {
                        entry: entry.clone(),
                        similarity: None,
                    });
                }
            }
        }

        let embedding = embedding?;
        let (key, similarity) = Self::nearest(
            &entries,
            query,
            embedding,
            self.config.semantic_threshold,
            |e| e.is_live(now),
        )?;
        let entry = entries.get_mut(&key)?;
        entry.hit_count += 1;
        entry.last_access = now;
        debug!(key = %key, similarity, "semantic cache hit");
        Some(CacheHit {
            entry: entry.clone(),
            similarity: Some(similarity),
        })
    }

    /// Whether `key` holds a live entry. Does not touch recency.
    pub async fn contains_live(&self, key: &str) -> bool {
        let now = Utc::now();
        self.entries
            .lock()
            .await
            .peek(key)
            .is_some_and(|e| e.is_live(now))
    }

    /// An expired exact entry still within the stale grace period.
    pub async fn stale_at(&self, query: &Query, now: DateTime<Utc>) -> Option<CacheEntry> {
        let grace = Duration::seconds(self.config.stale_grace_secs.min(i64::MAX as u64) as i64);
        let entries = self.entries.lock().await;
        entries
            .peek(&query.hash)
            .filter(|e| e.serves(query.class) && now < e.expires_at() + grace)
            .cloned()
    }

    /// Best semantic match for a degraded answer, accepting entries within
    /// the stale grace period.
    pub async fn degraded_match_at(
        &self,
        query: &Query,
        embedding: &[f32],
        now: DateTime<Utc>,
    ) -> Option<CacheHit> {
        let grace = Duration::seconds(self.config.stale_grace_secs.min(i64::MAX as u64) as i64);
        let entries = self.entries.lock().await;
        let (key, similarity) = Self::nearest(
            &entries,
            query,
            embedding,
            self.config.degraded_similarity,
            |e| now < e.expires_at() + grace,
        )?;
        entries.peek(&key).map(|entry| CacheHit {
            entry: entry.clone(),
            similarity: Some(similarity),
        })
    }

    fn nearest(
        entries: &LruCache<String, CacheEntry>,
        query: &Query,
        embedding: &[f32],
        threshold: f32,
        fresh: impl Fn(&CacheEntry) -> bool,
    ) -> Option<(String, f32)> {
        entries
            .iter()
            .filter_map(|(k, e)| {
                if !e.serves(query.class) || !fresh(e) {
                    return None;
                }
                let stored = e.embedding.as_deref()?;
                let sim = cosine_similarity(embedding, stored);
                (sim >= threshold).then(|| (k.clone(), sim))
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Store an entry and write it through to the repository.
    pub async fn insert(&self, entry: CacheEntry) {
        let evicted = {
            let mut entries = self.entries.lock().await;
            entries
                .push(entry.key.clone(), entry.clone())
                .filter(|(k, _)| *k != entry.key)
        };

        let Some(repo) = &self.repo else {
            return;
        };
        if let Err(e) = repo.save_entry(&entry).await {
            warn!(error = %e, key = %entry.key, "cache write-through failed");
        }
        if let Some((key, _)) = evicted {
            debug!(key = %key, "cache entry evicted (lru)");
            if let Err(e) = repo.delete_entry(&key).await {
                warn!(error = %e, key = %key, "cache eviction write-through failed");
            }
        }
    }

    /// Drop every entry backed by `signature`.
    pub async fn evict_pattern(&self, signature: &str) -> usize {
        let removed = {
            let mut entries = self.entries.lock().await;
            let keys: Vec<String> = entries
                .iter()
                .filter(|(_, e)| e.pattern.as_deref() == Some(signature))
                .map(|(k, _)| k.clone())
                .collect();
            for key in &keys {
                entries.pop(key);
            }
            keys.len()
        };
        if let Some(repo) = &self.repo {
            if let Err(e) = repo.delete_by_pattern(signature).await {
                warn!(error = %e, signature, "pattern eviction write-through failed");
            }
        }
        if removed > 0 {
            info!(signature, removed, "evicted entries of an unreliable pattern");
        }
        removed
    }

    /// Load live persisted entries into memory. Returns the number loaded.
    pub async fn warm(&self) -> Result<usize, SwitchyardError> {
        let Some(repo) = &self.repo else {
            return Ok(0);
        };
        let loaded = repo.load_live_entries(Utc::now()).await?;
        let count = loaded.len();
        let mut entries = self.entries.lock().await;
        // Rows arrive most recently used first; insert oldest first.
        for entry in loaded.into_iter().rev() {
            entries.push(entry.key.clone(), entry);
        }
        info!(count, "cache warmed from storage");
        Ok(count)
    }
}
