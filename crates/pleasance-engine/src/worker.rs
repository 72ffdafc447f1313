//! Queue worker — drains the content API's generation queue.
//!
//! One batch: fetch unprocessed subjects, generate every section for them,
//! push what was written, and mark the subjects that got at least one section
//! as processed. Subjects with no successful section stay in the queue.

use std::ops::AddAssign;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use pleasance_catalog::CatalogClient;
use pleasance_core::types::{ReviewVerdict, SectionResult};

use crate::batch::BatchOrchestrator;

/// Pause between consecutive batches in [`QueueWorker::run_until_empty`].
pub const BATCH_PAUSE: Duration = Duration::from_secs(1);

/// What one or more batches did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Subjects taken from the queue.
    pub fetched: usize,
    /// Sections written.
    pub generated: usize,
    /// Sections that failed.
    pub failed: usize,
    /// Sections the content API accepted.
    pub pushed: usize,
    /// Subjects marked processed.
    pub marked: usize,
}

impl AddAssign for BatchReport {
    fn add_assign(&mut self, other: Self) {
        self.fetched += other.fetched;
        self.generated += other.generated;
        self.failed += other.failed;
        self.pushed += other.pushed;
        self.marked += other.marked;
    }
}

pub struct QueueWorker {
    catalog: CatalogClient,
    orchestrator: Arc<BatchOrchestrator>,
    pause: Duration,
}

impl QueueWorker {
    pub fn new(catalog: CatalogClient, orchestrator: Arc<BatchOrchestrator>) -> Self {
        Self {
            catalog,
            orchestrator,
            pause: BATCH_PAUSE,
        }
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Process one batch of up to `limit` subjects.
    pub async fn process_batch(&self, limit: usize) -> Result<BatchReport> {
        let queue = self
            .catalog
            .fetch_queue(false, limit)
            .await
            .context("Failed to fetch generation queue")?;

        if queue.is_empty() {
            info!("Queue empty");
            return Ok(BatchReport::default());
        }
        info!(subjects = queue.len(), "Processing batch");

        let results = self.orchestrator.generate_all(&queue).await;

        let (written, failed): (Vec<SectionResult>, Vec<SectionResult>) =
            results.into_iter().partition(SectionResult::is_success);
        for section in &failed {
            warn!(
                subject = %section.subject_id,
                section = %section.section_key,
                error = section.error.as_deref().unwrap_or_default(),
                "Section not generated"
            );
        }

        let mut report = BatchReport {
            fetched: queue.len(),
            generated: written.len(),
            failed: failed.len(),
            ..Default::default()
        };

        if written.is_empty() {
            warn!("No sections generated in this batch, nothing to push");
            return Ok(report);
        }

        let summary = self
            .catalog
            .push_sections(&written)
            .await
            .context("Failed to push sections")?;
        report.pushed = summary.upserted;
        if summary.failed > 0 {
            warn!(
                upserted = summary.upserted,
                failed = summary.failed,
                "Content API rejected some sections"
            );
        }

        let done: Vec<String> = queue
            .iter()
            .filter(|subject| written.iter().any(|s| s.subject_id == subject.id))
            .map(|subject| subject.id.clone())
            .collect();
        self.catalog
            .mark_processed(&done)
            .await
            .context("Failed to mark subjects processed")?;
        report.marked = done.len();

        info!(
            generated = report.generated,
            failed = report.failed,
            pushed = report.pushed,
            marked = report.marked,
            "Batch complete"
        );
        Ok(report)
    }

    /// Generate sections for up to `limit` queued subjects without pushing
    /// or marking anything.
    pub async fn generate_unpushed(&self, limit: usize) -> Result<Vec<SectionResult>> {
        let queue = self
            .catalog
            .fetch_queue(false, limit)
            .await
            .context("Failed to fetch generation queue")?;
        Ok(self.orchestrator.generate_all(&queue).await)
    }

    /// Keep processing batches until the queue is empty or a batch makes no progress.
    pub async fn run_until_empty(&self, limit: usize) -> Result<BatchReport> {
        let mut total = BatchReport::default();
        loop {
            let report = self.process_batch(limit).await?;
            total += report;
            if report.fetched == 0 {
                break;
            }
            if report.marked == 0 {
                warn!("Batch made no progress, stopping");
                break;
            }
            tokio::time::sleep(self.pause).await;
        }
        info!(
            subjects = total.marked,
            sections = total.generated,
            "Queue drained"
        );
        Ok(total)
    }

    /// Review the existing sections of up to `limit` processed subjects.
    pub async fn review_processed(&self, limit: usize) -> Result<Vec<ReviewVerdict>> {
        let subjects = self
            .catalog
            .fetch_queue(true, limit)
            .await
            .context("Failed to fetch processed subjects")?;

        let items: Vec<_> = subjects.iter().flat_map(|s| s.review_items()).collect();
        if items.is_empty() {
            info!("Nothing to review");
            return Ok(Vec::new());
        }
        Ok(self.orchestrator.review_batch(items).await)
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
