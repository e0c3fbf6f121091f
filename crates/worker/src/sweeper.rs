//! Periodic report of jobs this device claimed but never finished.
//!
//! A job stays claimed-but-unfinished when its task failed before
//! persisting, or when a previous run of this process died mid-job. The
//! sweeper only logs such jobs; it never releases a claim.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use deckbench_core::types::DbId;
use tokio_util::sync::CancellationToken;

use crate::registry::JobRegistry;
use crate::store::{JobStore, StoreError};

/// Finds stale claims owned by one device.
pub struct StaleClaimSweeper {
    device_id: DbId,
    jobs: Arc<dyn JobStore>,
    registry: Arc<JobRegistry>,
    stale_after: chrono::Duration,
}

impl StaleClaimSweeper {
    pub fn new(
        device_id: DbId,
        jobs: Arc<dyn JobStore>,
        registry: Arc<JobRegistry>,
        stale_after: chrono::Duration,
    ) -> Self {
        Self {
            device_id,
            jobs,
            registry,
            stale_after,
        }
    }

    /// Stale claims of this device that no local task is working on.
    pub async fn sweep_once(&self) -> Result<Vec<DbId>, StoreError> {
        let cutoff = Utc::now() - self.stale_after;
        let stale = self.jobs.list_stale_claims(self.device_id, cutoff).await?;
        Ok(stale
            .into_iter()
            .filter(|id| !self.registry.contains(*id))
            .collect())
    }

    /// Sweep every `interval` until `cancel` fires.
    pub async fn run(self, interval: Duration, cancel: CancellationToken) {
        tracing::info!(
            stale_after_minutes = self.stale_after.num_minutes(),
            interval_secs = interval.as_secs(),
            "Stale claim sweeper started",
        );

        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Stale claim sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    match self.sweep_once().await {
                        Ok(stale) if stale.is_empty() => {
                            tracing::debug!("Stale claim sweep: nothing stuck");
                        }
                        Ok(stale) => {
                            for id in &stale {
                                tracing::warn!(
                                    job_id = %id,
                                    "Job claimed by this device is unfinished and not running",
                                );
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Stale claim sweep failed");
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
