//! In-process counter table.
//!
//! Only correct when a single server instance handles all traffic: counts
//! are not shared and vanish on restart. DashMap's per-entry lock makes
//! each hit atomic for concurrent requests from the same identity.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use super::{CounterStore, Hit, LimiterError};

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u64,
    started: Instant,
}

#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    windows: DashMap<String, Window>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked identities.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Drop every window that has fully elapsed. Returns how many were removed.
    pub fn sweep(&self, window: Duration) -> usize {
        let before = self.windows.len();
        let now = Instant::now();
        self.windows
            .retain(|_, w| now.duration_since(w.started) < window);
        before.saturating_sub(self.windows.len())
    }

    /// Periodically sweep expired windows until shutdown.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        window: Duration,
        every: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval(every);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = self.sweep(window);
                        if removed > 0 {
                            tracing::debug!(removed, remaining = self.len(), "Swept expired rate limit windows");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Rate limit sweeper stopping");
                        break;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn hit(&self, identity: &str, window: Duration) -> Result<Hit, LimiterError> {
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(identity.to_string())
            .or_insert(Window {
                count: 0,
                started: now,
            });

        if now.duration_since(entry.started) >= window {
            entry.count = 0;
            entry.started = now;
        }
        entry.count = entry.count.saturating_add(1);

        let elapsed = now.duration_since(entry.started);
        Ok(Hit {
            count: entry.count,
            reset_after: window.saturating_sub(elapsed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(15 * 60);

    #[tokio::test(start_paused = true)]
    async fn test_counts_within_window() {
        let store = MemoryCounterStore::new();

        for expected in 1..=3 {
            let hit = store.hit("1.2.3.4", WINDOW).await.unwrap();
            assert_eq!(hit.count, expected);
            assert_eq!(hit.reset_after, WINDOW);
        }

        time::advance(Duration::from_secs(60)).await;
        let hit = store.hit("1.2.3.4", WINDOW).await.unwrap();
        assert_eq!(hit.count, 4);
        assert_eq!(hit.reset_after, WINDOW - Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resets_after_window() {
        let store = MemoryCounterStore::new();
        store.hit("1.2.3.4", WINDOW).await.unwrap();
        store.hit("1.2.3.4", WINDOW).await.unwrap();

        time::advance(WINDOW).await;
        let hit = store.hit("1.2.3.4", WINDOW).await.unwrap();
        assert_eq!(hit.count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_expired_only() {
        let store = MemoryCounterStore::new();
        store.hit("old", WINDOW).await.unwrap();
        time::advance(Duration::from_secs(600)).await;
        store.hit("new", WINDOW).await.unwrap();
        time::advance(Duration::from_secs(300)).await;

        assert_eq!(store.sweep(WINDOW), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.hit("new", WINDOW).await.unwrap().count, 2);
    }

    #[tokio::test]
    async fn test_concurrent_hits_are_serialized() {
        let store = Arc::new(MemoryCounterStore::new());
        let mut tasks = Vec::new();
        for _ in 0..64 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.hit("same", WINDOW).await.unwrap().count
            }));
        }

        let mut counts = Vec::new();
        for task in tasks {
            counts.push(task.await.unwrap());
        }
        counts.sort_unstable();
        assert_eq!(counts, (1..=64).collect::<Vec<u64>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_on_shutdown() {
        let store = Arc::new(MemoryCounterStore::new());
        let (tx, rx) = broadcast::channel(1);
        let handle = store
            .clone()
            .spawn_sweeper(WINDOW, Duration::from_secs(60), rx);

        store.hit("a", WINDOW).await.unwrap();
        time::advance(WINDOW + Duration::from_secs(60)).await;
        for _ in 0..10 {
            if store.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(store.is_empty());

        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
