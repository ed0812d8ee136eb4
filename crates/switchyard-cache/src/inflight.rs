// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-flight deduplication of identical concurrent work.
//!
//! The first caller for a key spawns the work; later callers for the same key
//! await the same shared result. The work runs on its own task so a caller
//! that gives up does not abort it for the others.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use switchyard_core::SwitchyardError;

type Flight<T> = Shared<BoxFuture<'static, Result<T, String>>>;

/// Deduplicates concurrent work by key.
pub struct SingleFlight<T> {
    flights: Arc<DashMap<String, Flight<T>>>,
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            flights: Arc::new(DashMap::new()),
        }
    }

    /// Number of keys currently in flight.
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    /// Run `work` under `key`, or join the flight already running for it.
    ///
    /// Returns the result and whether this caller joined an existing flight.
    /// `work` is dropped unpolled when joining.
    pub async fn run<F>(&self, key: &str, work: F) -> Result<(T, bool), SwitchyardError>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let (flight, joined) = match self.flights.entry(key.to_string()) {
            Entry::Occupied(existing) => (existing.get().clone(), true),
            Entry::Vacant(slot) => {
                let flights = Arc::clone(&self.flights);
                let owned_key = key.to_string();
                let handle = tokio::spawn(async move {
                    let out = work.await;
                    flights.remove(&owned_key);
                    out
                });
                let flight = async move { handle.await.map_err(|e| e.to_string()) }
                    .boxed()
                    .shared();
                slot.insert(flight.clone());
                (flight, false)
            }
        };

        flight
            .await
            .map(|value| (value, joined))
            .map_err(|e| SwitchyardError::Internal(format!("shared request failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_callers_share_one_execution() {
        let flights = SingleFlight::<String>::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let work = |runs: Arc<AtomicUsize>| async move {
            runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            "answer".to_string()
        };

        let (a, b, c) = tokio::join!(
            flights.run("k", work(Arc::clone(&runs))),
            flights.run("k", work(Arc::clone(&runs))),
            flights.run("k", work(Arc::clone(&runs))),
        );
        let results = [a.unwrap(), b.unwrap(), c.unwrap()];

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|(v, _)| v == "answer"));
        assert_eq!(results.iter().filter(|(_, joined)| !joined).count(), 1);
    }

    #[tokio::test]
    async fn completed_flight_is_removed() {
        let flights = SingleFlight::<u32>::new();
        let (first, joined) = flights.run("k", async { 1 }).await.unwrap();
        assert_eq!((first, joined), (1, false));
        assert_eq!(flights.in_flight(), 0);

        let (second, joined) = flights.run("k", async { 2 }).await.unwrap();
        assert_eq!((second, joined), (2, false));
    }

    #[tokio::test]
    async fn distinct_keys_run_independently() {
        let flights = SingleFlight::<u32>::new();
        let (a, b) = tokio::join!(flights.run("a", async { 1 }), flights.run("b", async { 2 }));
        assert_eq!(a.unwrap(), (1, false));
        assert_eq!(b.unwrap(), (2, false));
    }

    #[tokio::test]
    async fn panicking_work_surfaces_internal_error() {
        async fn explode() -> u32 {
            panic!("boom")
        }

        let flights = SingleFlight::<u32>::new();
        let result = flights.run("k", explode()).await;
        assert!(matches!(result, Err(SwitchyardError::Internal(_))));
    }
}
