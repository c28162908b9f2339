//! Collection provisioning with deduplicated readiness checks.
//!
//! A collection may not exist yet, or may exist but still be warming up.
//! The coordinator guarantees at most one create+poll sequence per
//! collection name at any time: concurrent callers share the in-flight
//! attempt, a completed attempt answers from cache, and a failed attempt
//! is evicted so the next caller starts fresh.

use super::VectorIndex;
use crate::error::{BlikkError, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Default interval between readiness polls.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default poll budget (~5 minutes at the default interval).
const MAX_POLLS: usize = 150;

type Attempt = Shared<BoxFuture<'static, std::result::Result<(), String>>>;
type AttemptMap = Arc<Mutex<HashMap<String, Attempt>>>;

/// Ensures collections exist and are ready before pipelines touch them.
pub struct Provisioner {
    index: Arc<dyn VectorIndex>,
    dimension: usize,
    metric: String,
    poll_interval: Duration,
    max_polls: usize,
    attempts: AttemptMap,
}

impl Provisioner {
    /// Create a provisioner for collections of the given dimension and metric.
    pub fn new(index: Arc<dyn VectorIndex>, dimension: usize, metric: &str) -> Self {
        Self {
            index,
            dimension,
            metric: metric.to_string(),
            poll_interval: POLL_INTERVAL,
            max_polls: MAX_POLLS,
            attempts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Override the poll cadence. Tests use millisecond intervals.
    pub fn with_poll(mut self, interval: Duration, max_polls: usize) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    /// Ensure the named collection exists and is ready.
    ///
    /// All callers that arrive while an attempt is in flight observe that
    /// single attempt's outcome.
    #[instrument(skip(self))]
    pub async fn ensure_ready(&self, name: &str) -> Result<()> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            if let Some(existing) = attempts.get(name) {
                existing.clone()
            } else {
                let shared = self.start_attempt(name);
                attempts.insert(name.to_string(), shared.clone());
                shared
            }
        };

        attempt.await.map_err(BlikkError::Provision)
    }

    /// Drop any cached attempt for a name (used when a collection is deleted).
    pub fn forget(&self, name: &str) {
        self.attempts.lock().unwrap().remove(name);
    }

    fn start_attempt(&self, name: &str) -> Attempt {
        let index = self.index.clone();
        let attempts = self.attempts.clone();
        let name = name.to_string();
        let dimension = self.dimension;
        let metric = self.metric.clone();
        let poll_interval = self.poll_interval;
        let max_polls = self.max_polls;

        let task = tokio::spawn(async move {
            let outcome =
                create_and_poll(&*index, &name, dimension, &metric, poll_interval, max_polls)
                    .await;
            if let Err(e) = &outcome {
                warn!("Provisioning '{}' failed: {}", name, e);
                // Evict before the outcome becomes observable so a new
                // caller never awaits a poisoned attempt.
                attempts.lock().unwrap().remove(&name);
            }
            outcome
        });

        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(format!("Provisioning task aborted: {}", e)),
            }
        }
        .boxed()
        .shared()
    }
}

async fn create_and_poll(
    index: &dyn VectorIndex,
    name: &str,
    dimension: usize,
    metric: &str,
    poll_interval: Duration,
    max_polls: usize,
) -> std::result::Result<(), String> {
    let existing = index.list_indexes().await.map_err(|e| e.to_string())?;

    if !existing.iter().any(|n| n == name) {
        info!("Creating collection '{}' ({} dims, {})", name, dimension, metric);
        index
            .create_index(name, dimension, metric)
            .await
            .map_err(|e| e.to_string())?;
    }

    for poll in 0..max_polls {
        match index.describe_index(name).await {
            Ok(status) if status.ready => {
                debug!("Collection '{}' ready after {} polls", name, poll);
                return Ok(());
            }
            Ok(_) => debug!("Collection '{}' not ready yet (poll {})", name, poll),
            // A freshly created collection may not be visible yet.
            Err(e) => debug!("Describe '{}' failed (poll {}): {}", name, poll, e),
        }
        tokio::time::sleep(poll_interval).await;
    }

    Err(format!(
        "Collection '{}' not ready after {} polls",
        name, max_polls
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::{IndexStatus, QueryMatch, VectorRecord};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store double that counts control-plane calls and becomes ready
    /// after a configurable number of describes.
    struct CountingIndex {
        creates: AtomicUsize,
        describes: AtomicUsize,
        ready_after: usize,
    }

    impl CountingIndex {
        fn new(ready_after: usize) -> Self {
            Self {
                creates: AtomicUsize::new(0),
                describes: AtomicUsize::new(0),
                ready_after,
            }
        }
    }

    #[async_trait]
    impl VectorIndex for CountingIndex {
        async fn create_index(&self, _: &str, _: usize, _: &str) -> crate::Result<()> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn describe_index(&self, name: &str) -> crate::Result<IndexStatus> {
            let seen = self.describes.fetch_add(1, Ordering::SeqCst) + 1;
            if seen >= self.ready_after {
                Ok(IndexStatus { ready: true, host: None })
            } else {
                Err(BlikkError::VectorStore(format!("{} not visible yet", name)))
            }
        }

        async fn list_indexes(&self) -> crate::Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn delete_index(&self, _: &str) -> crate::Result<()> {
            Ok(())
        }

        async fn upsert(&self, _: &str, _: &str, _: &[VectorRecord]) -> crate::Result<usize> {
            unreachable!("provisioning never writes records")
        }

        async fn query(
            &self,
            _: &str,
            _: &str,
            _: &[f32],
            _: usize,
        ) -> crate::Result<Vec<QueryMatch>> {
            unreachable!("provisioning never queries")
        }

        async fn fetch(&self, _: &str, _: &str, _: &[String]) -> crate::Result<Vec<VectorRecord>> {
            unreachable!("provisioning never fetches")
        }

        async fn list_namespaces(&self, _: &str) -> crate::Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    fn test_provisioner(store: Arc<CountingIndex>, max_polls: usize) -> Provisioner {
        Provisioner::new(store, 8, "cosine").with_poll(Duration::from_millis(1), max_polls)
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_attempt() {
        let store = Arc::new(CountingIndex::new(3));
        let provisioner = Arc::new(test_provisioner(store.clone(), 50));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let p = provisioner.clone();
                tokio::spawn(async move { p.ensure_ready("demo").await })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ready_outcome_is_cached() {
        let store = Arc::new(CountingIndex::new(1));
        let provisioner = test_provisioner(store.clone(), 50);

        provisioner.ensure_ready("demo").await.unwrap();
        let describes_after_first = store.describes.load(Ordering::SeqCst);
        provisioner.ensure_ready("demo").await.unwrap();

        assert_eq!(store.creates.load(Ordering::SeqCst), 1);
        assert_eq!(store.describes.load(Ordering::SeqCst), describes_after_first);
    }

    #[tokio::test]
    async fn test_failed_attempt_is_evicted_and_retried() {
        // Never becomes ready within the budget.
        let store = Arc::new(CountingIndex::new(usize::MAX));
        let provisioner = test_provisioner(store.clone(), 2);

        let first = provisioner.ensure_ready("demo").await;
        assert!(matches!(first, Err(BlikkError::Provision(_))));
        assert_eq!(store.creates.load(Ordering::SeqCst), 1);

        // The failed attempt was evicted; this one starts from scratch.
        let second = provisioner.ensure_ready("demo").await;
        assert!(second.is_err());
        assert_eq!(store.creates.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_forget_drops_cached_attempt() {
        let store = Arc::new(CountingIndex::new(1));
        let provisioner = test_provisioner(store.clone(), 50);

        provisioner.ensure_ready("demo").await.unwrap();
        provisioner.forget("demo");
        provisioner.ensure_ready("demo").await.unwrap();

        assert_eq!(store.creates.load(Ordering::SeqCst), 2);
    }
}
