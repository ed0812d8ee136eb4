// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batch coalescing for similar non-urgent queries.
//!
//! The first query for a [`BatchKey`] opens a batch and a flush task. Queries
//! arriving with the same key join until the window closes or the batch is
//! full. The flush runs once for all members and every member receives a
//! clone of its output.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use switchyard_core::{ComplexityClass, SwitchyardError};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::Instant;
use tracing::debug;

/// Queries coalesce only when both the pattern signature and class match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchKey {
    pub signature: String,
    pub class: ComplexityClass,
}

/// What one batch member receives.
#[derive(Debug, Clone)]
pub struct BatchReply<T> {
    pub value: T,
    /// Number of members in the batch.
    pub members: usize,
    /// This member's arrival position; position 0 opened the batch.
    pub position: usize,
}

struct Member<T> {
    text: String,
    reply: oneshot::Sender<BatchReply<T>>,
}

struct OpenBatch<T> {
    id: u64,
    joined: usize,
    tx: mpsc::UnboundedSender<Member<T>>,
}

type OpenBatches<T> = Arc<Mutex<HashMap<BatchKey, OpenBatch<T>>>>;

pub struct BatchCoalescer<T> {
    open: OpenBatches<T>,
    window: Duration,
    max_size: usize,
    next_id: AtomicU64,
}

impl<T> BatchCoalescer<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(window: Duration, max_size: usize) -> Self {
        Self {
            open: Arc::new(Mutex::new(HashMap::new())),
            window,
            max_size: max_size.max(1),
            next_id: AtomicU64::new(0),
        }
    }

    /// Number of batches still accepting members.
    pub async fn open_batches(&self) -> usize {
        self.open.lock().await.len()
    }

    /// Submit `text` under `key`. `flush` runs only if this call opens the
    /// batch; it receives every member's text in arrival order.
    pub async fn submit<F, Fut>(
        &self,
        key: BatchKey,
        text: String,
        flush: F,
    ) -> Result<BatchReply<T>, SwitchyardError>
    where
        F: FnOnce(Vec<String>) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let mut member = Member { text, reply };

        {
            let mut open = self.open.lock().await;
            if let Some(batch) = open.get_mut(&key) {
                match batch.tx.send(member) {
                    Ok(()) => {
                        batch.joined += 1;
                        if batch.joined >= self.max_size {
                            open.remove(&key);
                        }
                        drop(open);
                        return Self::await_reply(rx).await;
                    }
                    // Flush task already gone; open a fresh batch.
                    Err(mpsc::error::SendError(returned)) => member = returned,
                }
            }

            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let (tx, members) = mpsc::unbounded_channel();
            let _ = tx.send(member);
            if self.max_size > 1 {
                open.insert(
                    key.clone(),
                    OpenBatch {
                        id,
                        joined: 1,
                        tx,
                    },
                );
            }
            debug!(signature = %key.signature, class = %key.class, "batch opened");
            tokio::spawn(run_batch(
                Arc::clone(&self.open),
                key,
                id,
                Instant::now() + self.window,
                self.max_size,
                members,
                flush,
            ));
        }

        Self::await_reply(rx).await
    }

    async fn await_reply(
        rx: oneshot::Receiver<BatchReply<T>>,
    ) -> Result<BatchReply<T>, SwitchyardError> {
        rx.await
            .map_err(|_| SwitchyardError::Internal("batch flush task ended without a reply".into()))
    }
}

async fn run_batch<T, F, Fut>(
    open: OpenBatches<T>,
    key: BatchKey,
    id: u64,
    deadline: Instant,
    max_size: usize,
    mut rx: mpsc::UnboundedReceiver<Member<T>>,
    flush: F,
) where
    T: Clone + Send + 'static,
    F: FnOnce(Vec<String>) -> Fut,
    Fut: Future<Output = T>,
{
    let mut members = Vec::new();
    loop {
        tokio::select! {
            biased;
            next = rx.recv() => match next {
                Some(member) => {
                    members.push(member);
                    if members.len() >= max_size {
                        break;
                    }
                }
                None => break,
            },
            _ = tokio::time::sleep_until(deadline) => break,
        }
    }

    // Seal the batch, then collect anyone who joined before the seal.
    {
        let mut open = open.lock().await;
        if open.get(&key).is_some_and(|b| b.id == id) {
            open.remove(&key);
        }
    }
    while let Ok(member) = rx.try_recv() {
        members.push(member);
    }

    let count = members.len();
    let (texts, replies): (Vec<String>, Vec<_>) =
        members.into_iter().map(|m| (m.text, m.reply)).unzip();
    debug!(signature = %key.signature, members = count, "flushing batch");

    let value = flush(texts).await;
    for (position, reply) in replies.into_iter().enumerate() {
        let _ = reply.send(BatchReply {
            value: value.clone(),
            members: count,
            position,
        });
    }
}
