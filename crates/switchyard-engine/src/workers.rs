// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded pool for background work (prefetch, cache warming).
//!
//! At most `max_concurrency` tasks run at once and at most `max_pending` are
//! accepted; extra submissions are dropped. Each task is tied to a
//! cancellation token: a per-session child token cancelled by
//! [`WorkerPool::end_session`], or the pool's root token cancelled at
//! shutdown.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use switchyard_config::model::WorkerConfig;
use switchyard_core::SessionId;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

pub struct WorkerPool {
    permits: Arc<Semaphore>,
    pending: Arc<AtomicUsize>,
    max_pending: usize,
    tracker: TaskTracker,
    root: CancellationToken,
    sessions: DashMap<String, CancellationToken>,
}

/// Releases a pending slot when the task ends, however it ends.
struct PendingSlot(Arc<AtomicUsize>);

impl Drop for PendingSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WorkerPool {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
            pending: Arc::new(AtomicUsize::new(0)),
            max_pending: config.max_pending.max(1),
            tracker: TaskTracker::new(),
            root: CancellationToken::new(),
            sessions: DashMap::new(),
        }
    }

    /// Tasks accepted and not yet finished.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }

    fn token_for(&self, session: Option<&SessionId>) -> CancellationToken {
        match session {
            Some(id) => self
                .sessions
                .entry(id.as_str().to_string())
                .or_insert_with(|| self.root.child_token())
                .clone(),
            None => self.root.child_token(),
        }
    }

    /// Submit a background task. Returns `false` when it was dropped.
    pub fn submit<F>(&self, session: Option<&SessionId>, label: &'static str, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.root.is_cancelled() {
            debug!(label, "worker pool shut down, task dropped");
            return false;
        }
        if self.pending.fetch_add(1, Ordering::SeqCst) >= self.max_pending {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            debug!(label, max_pending = self.max_pending, "worker pool saturated, task dropped");
            return false;
        }

        let slot = PendingSlot(Arc::clone(&self.pending));
        let token = self.token_for(session);
        let permits = Arc::clone(&self.permits);
        self.tracker.spawn(async move {
            let _slot = slot;
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(label, "background task cancelled");
                }
                _ = async {
                    // The semaphore closes only at shutdown.
                    if let Ok(_permit) = permits.acquire_owned().await {
                        task.await;
                    }
                } => {}
            }
        });
        true
    }

    /// Cancel every background task owned by `session`.
    pub fn end_session(&self, session: &SessionId) {
        if let Some((_, token)) = self.sessions.remove(session.as_str()) {
            token.cancel();
            debug!(session = session.as_str(), "session tasks cancelled");
        }
    }

    /// Cancel all tasks and wait for them to stop.
    pub async fn shutdown(&self) {
        self.root.cancel();
        self.permits.close();
        self.tracker.close();
        self.tracker.wait().await;
        self.sessions.clear();
        info!("worker pool stopped");
    }
}
