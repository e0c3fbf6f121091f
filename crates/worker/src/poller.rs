//! Job poller: claims unclaimed jobs up to free capacity and dispatches them.

use std::sync::Arc;
use std::time::Duration;

use deckbench_core::types::DbId;
use tokio_util::sync::CancellationToken;

use crate::pipeline::JobPipeline;
use crate::registry::JobRegistry;
use crate::store::{ClaimOutcome, JobStore, StoreError};

/// What one poll cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Every slot was busy; the queue was not queried.
    Full,
    /// Number of jobs claimed and dispatched (possibly zero).
    Dispatched(usize),
}

/// Periodic claimer bound to one device identity.
pub struct Poller {
    device_id: DbId,
    jobs: Arc<dyn JobStore>,
    registry: Arc<JobRegistry>,
    pipeline: Arc<JobPipeline>,
    poll_interval: Duration,
    backoff_interval: Duration,
}

impl Poller {
    pub fn new(
        device_id: DbId,
        jobs: Arc<dyn JobStore>,
        registry: Arc<JobRegistry>,
        pipeline: Arc<JobPipeline>,
        poll_interval: Duration,
        backoff_interval: Duration,
    ) -> Self {
        Self {
            device_id,
            jobs,
            registry,
            pipeline,
            poll_interval,
            backoff_interval,
        }
    }

    /// Run one cycle: list candidates, claim each into a free slot, dispatch.
    ///
    /// Lost claim races are skipped. A store failure aborts the cycle; jobs
    /// already dispatched keep running.
    pub async fn poll_once(&self) -> Result<PollOutcome, StoreError> {
        let free = self.registry.free_slots();
        if free == 0 {
            return Ok(PollOutcome::Full);
        }

        let candidates = self.jobs.list_unclaimed(free).await?;
        let mut dispatched = 0;

        for id in candidates {
            let Some(permit) = self.registry.try_reserve() else {
                break;
            };
            match self.jobs.try_claim(id, self.device_id).await {
                Ok(ClaimOutcome::Claimed(job)) => {
                    tracing::info!(job_id = %job.id, "Job claimed");
                    let pipeline = Arc::clone(&self.pipeline);
                    self.registry.spawn(job.id, permit, async move {
                        pipeline.run(job).await;
                    });
                    dispatched += 1;
                }
                Ok(ClaimOutcome::Raced) => {
                    tracing::debug!(job_id = %id, "Claim lost to another device");
                }
                Err(e @ StoreError::CorruptRow { .. }) => {
                    tracing::error!(job_id = %id, error = %e, "Claimed job cannot be run");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(PollOutcome::Dispatched(dispatched))
    }

    /// Poll immediately, then on the configured cadence until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            device_id = %self.device_id,
            capacity = self.registry.capacity(),
            poll_interval_secs = self.poll_interval.as_secs(),
            backoff_interval_secs = self.backoff_interval.as_secs(),
            "Poller started",
        );

        loop {
            let wait = match self.poll_once().await {
                Ok(PollOutcome::Full) => {
                    tracing::debug!("All slots busy; backing off");
                    self.backoff_interval
                }
                Ok(PollOutcome::Dispatched(count)) => {
                    if count > 0 {
                        tracing::info!(count, running = self.registry.len(), "Jobs dispatched");
                    }
                    self.poll_interval
                }
                Err(e) => {
                    tracing::error!(error = %e, "Poll cycle aborted");
                    self.poll_interval
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Poller stopping");
                    break;
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}
