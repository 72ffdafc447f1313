//! Batch orchestrator — runs many independent items concurrently.
//!
//! Every item runs in its own task on a [`JoinSet`]. Results are written to
//! the slot of the item that produced them, so output order matches input
//! order whatever order the tasks finish in. A task that panics, or is still
//! running when the batch deadline expires, leaves its slot empty; empty slots
//! are then filled with a failure result built from the item itself. The
//! output always has exactly one entry per input item.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info, warn};

use pleasance_core::config::BatchConfig;
use pleasance_core::types::{GenerationItem, ReviewItem, ReviewVerdict, SectionResult, Subject};

use crate::generator::{ContentGenerator, REVIEW_FAILED};

/// Failure note for items cut off by the batch deadline.
pub const DEADLINE_EXCEEDED: &str = "batch deadline exceeded";

/// Failure note for items whose task panicked.
pub const ITEM_PANICKED: &str = "item processing panicked";

/// How many items of one batch may be in flight at once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Concurrency {
    #[default]
    Unbounded,
    Bounded(usize),
}

impl Concurrency {
    /// `0` means no cap.
    pub fn from_limit(limit: usize) -> Self {
        match limit {
            0 => Self::Unbounded,
            n => Self::Bounded(n),
        }
    }
}

// ─────────────────────────────────────────────
// BatchOrchestrator
// ─────────────────────────────────────────────

pub struct BatchOrchestrator {
    generator: Arc<ContentGenerator>,
    concurrency: Concurrency,
    deadline: Option<Duration>,
}

impl BatchOrchestrator {
    pub fn new(generator: Arc<ContentGenerator>) -> Self {
        Self {
            generator,
            concurrency: Concurrency::Unbounded,
            deadline: None,
        }
    }

    pub fn from_config(generator: Arc<ContentGenerator>, config: &BatchConfig) -> Self {
        Self::new(generator)
            .with_concurrency(Concurrency::from_limit(config.concurrency))
            .with_deadline(config.deadline_secs.map(Duration::from_secs))
    }

    /// A cap of zero permits would stall every task, so it means no cap.
    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = match concurrency {
            Concurrency::Bounded(0) => Concurrency::Unbounded,
            other => other,
        };
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn generator(&self) -> &Arc<ContentGenerator> {
        &self.generator
    }

    /// Generate every item; one [`SectionResult`] per item, in input order.
    pub async fn generate_batch(&self, items: Vec<GenerationItem>) -> Vec<SectionResult> {
        let results = self
            .run_isolated(
                items,
                |generator, item| async move { generator.generate_section(&item).await },
                |item, reason| SectionResult::failed(item, reason),
            )
            .await;

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        info!(
            items = results.len(),
            succeeded,
            failed = results.len() - succeeded,
            "Generation batch finished"
        );
        results
    }

    /// Generate every configured section for every subject.
    pub async fn generate_all(&self, subjects: &[Subject]) -> Vec<SectionResult> {
        let keys: Vec<&str> = self.generator.prompts().section_keys().collect();
        let items = subjects
            .iter()
            .flat_map(|subject| keys.iter().map(|key| subject.generation_item(*key)))
            .collect();
        self.generate_batch(items).await
    }

    /// Review every item; one [`ReviewVerdict`] per item, in input order.
    pub async fn review_batch(&self, items: Vec<ReviewItem>) -> Vec<ReviewVerdict> {
        let verdicts = self
            .run_isolated(
                items,
                |generator, item| async move { generator.review_section(&item).await },
                |item, reason| ReviewVerdict::fail_open(item, format!("{REVIEW_FAILED}: {reason}")),
            )
            .await;

        let approved = verdicts.iter().filter(|v| v.approved).count();
        let degraded = verdicts.iter().filter(|v| v.is_degraded()).count();
        info!(items = verdicts.len(), approved, degraded, "Review batch finished");
        verdicts
    }

    /// Run `work` on each item in its own task and collect results by slot.
    async fn run_isolated<I, R, W, Fut, F>(&self, items: Vec<I>, work: W, on_fault: F) -> Vec<R>
    where
        I: Clone + Send + 'static,
        R: Send + 'static,
        W: Fn(Arc<ContentGenerator>, I) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
        F: Fn(&I, &str) -> R,
    {
        let semaphore = match self.concurrency {
            Concurrency::Bounded(n) => Some(Arc::new(Semaphore::new(n))),
            Concurrency::Unbounded => None,
        };

        let mut join_set = JoinSet::new();
        let mut task_slots = HashMap::with_capacity(items.len());

        for (slot, item) in items.iter().cloned().enumerate() {
            let task = work(Arc::clone(&self.generator), item);
            let semaphore = semaphore.clone();
            let handle = join_set.spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                (slot, task.await)
            });
            task_slots.insert(handle.id(), slot);
        }

        let mut results: Vec<Option<R>> = items.iter().map(|_| None).collect();
        let mut faults: HashMap<usize, &'static str> = HashMap::new();
        let deadline = self.deadline.map(|d| Instant::now() + d);

        loop {
            let next = match deadline {
                Some(at) => match tokio::time::timeout_at(at, join_set.join_next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(outstanding = join_set.len(), "Batch deadline exceeded, aborting");
                        join_set.abort_all();
                        break;
                    }
                },
                None => join_set.join_next().await,
            };

            match next {
                None => break,
                Some(Ok((slot, result))) => results[slot] = Some(result),
                Some(Err(e)) => {
                    let slot = task_slots.get(&e.id()).copied();
                    if e.is_panic() {
                        error!(slot = ?slot, "Batch item panicked");
                    } else {
                        warn!(slot = ?slot, "Batch item cancelled: {}", e);
                    }
                    if let Some(slot) = slot {
                        faults.insert(slot, ITEM_PANICKED);
                    }
                }
            }
        }

        results
            .into_iter()
            .zip(&items)
            .enumerate()
            .map(|(slot, (result, item))| {
                result.unwrap_or_else(|| {
                    on_fault(item, faults.get(&slot).copied().unwrap_or(DEADLINE_EXCEEDED))
                })
            })
            .collect()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::tests::generator;
    use async_trait::async_trait;
    use pleasance_providers::{CompletionBackend, CompletionParams};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend whose behaviour is steered by markers in the prompt:
    /// `PANIC` panics, `SLOW` hangs for ten seconds, `WAIT` takes 50 ms.
    #[derive(Default)]
    struct MarkerBackend {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl CompletionBackend for MarkerBackend {
        async fn call_model(
            &self,
            prompt: &str,
            _model: &str,
            _params: &CompletionParams,
        ) -> Option<String> {
            if prompt.contains("PANIC") {
                panic!("backend blew up");
            }
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let delay = if prompt.contains("SLOW") {
                Duration::from_secs(10)
            } else if prompt.contains("WAIT") {
                Duration::from_millis(50)
            } else {
                Duration::from_millis(5)
            };
            tokio::time::sleep(delay).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Some(r#"{"approved": true, "issues": []}"#.to_string())
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    fn orchestrator(backend: Arc<MarkerBackend>) -> BatchOrchestrator {
        BatchOrchestrator::new(Arc::new(generator(backend)))
    }

    fn items(names: &[&str]) -> Vec<GenerationItem> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Subject::new(format!("k-{i}"), *name).generation_item("appeal"))
            .collect()
    }

    #[tokio::test]
    async fn test_results_follow_input_order() {
        let batch = orchestrator(Arc::new(MarkerBackend::default()));
        // The first item finishes last.
        let results = batch.generate_batch(items(&["WAIT", "b", "c", "d"])).await;

        assert_eq!(results.len(), 4);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.subject_id, format!("k-{i}"));
            assert_eq!(result.section_key, "appeal");
            assert!(result.is_success());
        }
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let batch = orchestrator(Arc::new(MarkerBackend::default()));
        assert!(batch.generate_batch(Vec::new()).await.is_empty());
        assert!(batch.review_batch(Vec::new()).await.is_empty());
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let batch = orchestrator(Arc::new(MarkerBackend::default()));
        let results = batch.generate_batch(items(&["a", "PANIC", "c"])).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_success());
        assert!(results[2].is_success());
        assert_eq!(results[1].subject_id, "k-1");
        assert_eq!(results[1].content, None);
        assert_eq!(results[1].error.as_deref(), Some(ITEM_PANICKED));
    }

    #[tokio::test]
    async fn test_deadline_fills_outstanding_slots() {
        let batch = orchestrator(Arc::new(MarkerBackend::default()))
            .with_deadline(Some(Duration::from_millis(200)));
        let results = batch.generate_batch(items(&["a", "SLOW", "c"])).await;

        assert!(results[0].is_success());
        assert!(results[2].is_success());
        assert_eq!(results[1].subject_id, "k-1");
        assert_eq!(results[1].error.as_deref(), Some(DEADLINE_EXCEEDED));
    }

    #[tokio::test]
    async fn test_bounded_concurrency() {
        let backend = Arc::new(MarkerBackend::default());
        let batch = orchestrator(backend.clone()).with_concurrency(Concurrency::Bounded(2));
        let results = batch
            .generate_batch(items(&["WAIT", "WAIT", "WAIT", "WAIT", "WAIT"]))
            .await;

        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.is_success()));
        assert!(backend.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_zero_cap_runs_unbounded() {
        let backend = Arc::new(MarkerBackend::default());
        let batch = orchestrator(backend.clone()).with_concurrency(Concurrency::Bounded(0));
        assert_eq!(batch.concurrency, Concurrency::Unbounded);

        let results = tokio::time::timeout(
            Duration::from_secs(5),
            batch.generate_batch(items(&["WAIT", "WAIT", "WAIT"])),
        )
        .await
        .unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(SectionResult::is_success));
        assert_eq!(backend.peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_generate_all_expands_sections() {
        let batch = orchestrator(Arc::new(MarkerBackend::default()));
        let subjects = [Subject::new("k-1", "Rope"), Subject::new("k-2", "Wax")];
        let results = batch.generate_all(&subjects).await;

        let pairs: Vec<_> = results
            .iter()
            .map(|r| (r.subject_id.as_str(), r.section_key.as_str()))
            .collect();
        assert_eq!(
            pairs,
            [
                ("k-1", "appeal"),
                ("k-1", "howTo"),
                ("k-1", "variations"),
                ("k-2", "appeal"),
                ("k-2", "howTo"),
                ("k-2", "variations"),
            ]
        );
    }

    #[tokio::test]
    async fn test_review_batch_fails_open_on_panic() {
        let batch = orchestrator(Arc::new(MarkerBackend::default()));
        let review = |id: &str, content: &str| ReviewItem {
            subject_id: id.into(),
            subject_name: "Rope".into(),
            section_key: "howTo".into(),
            content: content.into(),
        };
        let verdicts = batch
            .review_batch(vec![review("k-1", "fine"), review("k-2", "PANIC")])
            .await;

        assert_eq!(verdicts.len(), 2);
        assert!(verdicts[0].approved);
        assert!(!verdicts[0].is_degraded());
        assert!(verdicts[1].approved);
        assert!(verdicts[1].is_degraded());
        assert_eq!(verdicts[1].subject_id, "k-2");
        assert_eq!(verdicts[1].section_key, "howTo");
    }

    #[test]
    fn test_concurrency_from_limit() {
        assert_eq!(Concurrency::from_limit(0), Concurrency::Unbounded);
        assert_eq!(Concurrency::from_limit(4), Concurrency::Bounded(4));
    }
}
