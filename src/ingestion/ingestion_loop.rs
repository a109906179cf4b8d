//! The background loop that polls upstream and persists new videos.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::batch::{prepare_batch, MalformedItem};
use super::watermark::Watermark;
use crate::fetcher::{CredentialRotator, FailedCredential, RotationOutcome, SearchRequest};
use crate::server::metrics;
use crate::video_store::VideoStore;

#[derive(Debug, Clone)]
pub struct IngestionSettings {
    pub search_query: String,
    pub max_results: u32,
    pub fetch_interval: Duration,
    /// Wait after a cycle where every credential failed.
    pub cooldown_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Fetching,
    Cycling(Duration),
    BackingOff(Duration),
    ShuttingDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The batch was committed (possibly with zero new rows).
    Ingested,
    Empty,
    AllFailed,
    PersistenceFailed,
    /// Shutdown was requested while the fetch was in flight; results were dropped.
    Discarded,
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleOutcome::Ingested => "ingested",
            CycleOutcome::Empty => "empty",
            CycleOutcome::AllFailed => "all_failed",
            CycleOutcome::PersistenceFailed => "persistence_failed",
            CycleOutcome::Discarded => "discarded",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub inserted: usize,
    pub skipped: usize,
    pub malformed: Vec<MalformedItem>,
    pub credential_failures: Vec<FailedCredential>,
    pub watermark_before: DateTime<Utc>,
    pub watermark_after: DateTime<Utc>,
}

impl CycleReport {
    fn new(outcome: CycleOutcome, watermark: DateTime<Utc>) -> Self {
        Self {
            outcome,
            inserted: 0,
            skipped: 0,
            malformed: Vec::new(),
            credential_failures: Vec::new(),
            watermark_before: watermark,
            watermark_after: watermark,
        }
    }
}

pub struct IngestionLoop {
    rotator: CredentialRotator,
    store: Arc<dyn VideoStore>,
    watermark: Watermark,
    settings: IngestionSettings,
    state: LoopState,
}

impl IngestionLoop {
    pub fn new(
        rotator: CredentialRotator,
        store: Arc<dyn VideoStore>,
        watermark: Watermark,
        settings: IngestionSettings,
    ) -> Self {
        Self {
            rotator,
            store,
            watermark,
            settings,
            state: LoopState::Fetching,
        }
    }

    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark.get()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Runs until `shutdown` is cancelled.
    ///
    /// Waits between cycles end as soon as shutdown is requested. A fetch already in
    /// flight is allowed to finish (or time out) and its results are then dropped.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        info!(
            "Starting ingestion loop for query '{}' with {} credential(s), watermark {}",
            self.settings.search_query,
            self.rotator.credentials_count(),
            self.watermark.get().to_rfc3339()
        );
        metrics::set_watermark(self.watermark.get());

        loop {
            self.state = match self.state {
                LoopState::Fetching if shutdown.is_cancelled() => LoopState::ShuttingDown,
                LoopState::Fetching => {
                    let report = self.run_cycle(&shutdown).await;
                    log_report(&report);
                    self.state
                }
                LoopState::Cycling(wait) | LoopState::BackingOff(wait) => {
                    tokio::select! {
                        _ = shutdown.cancelled() => LoopState::ShuttingDown,
                        _ = tokio::time::sleep(wait) => LoopState::Fetching,
                    }
                }
                LoopState::ShuttingDown => break,
            };
        }

        info!(
            "Ingestion loop stopped, watermark {}",
            self.watermark.get().to_rfc3339()
        );
    }

    /// Performs one fetch/dedup/persist cycle and moves the loop to its next state.
    pub async fn run_cycle(&mut self, shutdown: &CancellationToken) -> CycleReport {
        let report = self.cycle(shutdown).await;
        self.state = self.next_state(report.outcome);
        metrics::record_cycle(&report);
        report
    }

    fn next_state(&self, outcome: CycleOutcome) -> LoopState {
        match outcome {
            CycleOutcome::AllFailed => LoopState::BackingOff(self.settings.cooldown_interval),
            CycleOutcome::Discarded => LoopState::ShuttingDown,
            CycleOutcome::Ingested | CycleOutcome::Empty | CycleOutcome::PersistenceFailed => {
                LoopState::Cycling(self.settings.fetch_interval)
            }
        }
    }

    async fn cycle(&mut self, shutdown: &CancellationToken) -> CycleReport {
        let watermark_before = self.watermark.get();
        let request = SearchRequest::new(
            self.settings.search_query.clone(),
            watermark_before,
            self.settings.max_results,
        );
        debug!(
            "Fetching '{}' published after {}",
            request.query,
            watermark_before.to_rfc3339()
        );

        let (items, credential_failures) = match self.rotator.fetch(&request, shutdown).await {
            RotationOutcome::Fetched {
                items, failures, ..
            } => (items, failures),
            RotationOutcome::AllFailed { failures } => {
                let mut report = CycleReport::new(CycleOutcome::AllFailed, watermark_before);
                report.credential_failures = failures;
                return report;
            }
            RotationOutcome::Interrupted { failures } => {
                let mut report = CycleReport::new(CycleOutcome::Discarded, watermark_before);
                report.credential_failures = failures;
                return report;
            }
        };

        if shutdown.is_cancelled() {
            let mut report = CycleReport::new(CycleOutcome::Discarded, watermark_before);
            report.credential_failures = credential_failures;
            return report;
        }
        if items.is_empty() {
            let mut report = CycleReport::new(CycleOutcome::Empty, watermark_before);
            report.credential_failures = credential_failures;
            return report;
        }

        let batch = match prepare_batch(&items, self.store.as_ref()) {
            Ok(batch) => batch,
            Err(err) => {
                error!("Failed to check batch against store: {:#}", err);
                let mut report =
                    CycleReport::new(CycleOutcome::PersistenceFailed, watermark_before);
                report.credential_failures = credential_failures;
                return report;
            }
        };

        let mut report = CycleReport::new(CycleOutcome::Ingested, watermark_before);
        report.credential_failures = credential_failures;
        report.skipped = batch.skipped;
        report.malformed = batch.malformed;

        if !batch.staged.is_empty() {
            match self.store.insert_batch(&batch.staged) {
                Ok(outcome) => {
                    report.inserted = outcome.inserted;
                    // Rows that appeared between the existence check and the insert.
                    report.skipped += outcome.skipped;
                }
                Err(err) => {
                    error!(
                        "Failed to persist batch of {} videos: {:#}",
                        batch.staged.len(),
                        err
                    );
                    report.outcome = CycleOutcome::PersistenceFailed;
                    return report;
                }
            }
        }

        if let Some(latest) = batch.max_published_at {
            self.watermark.advance(latest);
        }
        report.watermark_after = self.watermark.get();
        report
    }
}

fn log_report(report: &CycleReport) {
    match report.outcome {
        CycleOutcome::Ingested => info!(
            "Ingested {} new videos, skipped {}, malformed {}; watermark {}",
            report.inserted,
            report.skipped,
            report.malformed.len(),
            report.watermark_after.to_rfc3339()
        ),
        CycleOutcome::Empty => info!("No new videos since {}", report.watermark_before.to_rfc3339()),
        CycleOutcome::AllFailed => warn!(
            "All {} credential(s) failed, backing off",
            report.credential_failures.len()
        ),
        CycleOutcome::PersistenceFailed => warn!("Batch discarded after storage failure"),
        CycleOutcome::Discarded => info!("Shutdown requested, discarding fetched batch"),
    }
    for malformed in &report.malformed {
        warn!(
            "Skipped malformed item #{} ({}): {}",
            malformed.position,
            malformed.video_id.as_deref().unwrap_or("no id"),
            malformed.reason
        );
    }
}
