//! Storage ports used by the poller and the job pipeline.
//!
//! [`PgStore`] is the production implementation. [`MemoryStore`] keeps
//! everything in process and is used to exercise the worker without a
//! database.

mod memory;
mod postgres;

pub use memory::{MemoryStore, StoredJob};
pub use postgres::PgStore;

use async_trait::async_trait;
use deckbench_core::deck::DeckDefinition;
use deckbench_core::job::{JobResult, MatchJob};
use deckbench_core::types::{DbId, Timestamp};

/// Errors surfaced by a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Job {0} not found or not claimed")]
    NotFound(DbId),

    #[error("Job {id} has an unusable row: {reason}")]
    CorruptRow { id: DbId, reason: String },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Result of a conditional claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This device now owns the job.
    Claimed(MatchJob),
    /// Another device claimed it first. Not an error.
    Raced,
}

/// Job queue port.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Ids of unclaimed jobs, oldest first, at most `limit`.
    async fn list_unclaimed(&self, limit: usize) -> Result<Vec<DbId>, StoreError>;

    /// Set the claim owner to `owner` only if no owner is set yet.
    async fn try_claim(&self, id: DbId, owner: DbId) -> Result<ClaimOutcome, StoreError>;

    /// Write win counts, turn counts and the finish time in one update.
    async fn record_result(&self, id: DbId, result: &JobResult) -> Result<(), StoreError>;

    /// Unfinished jobs owned by `owner` that were claimed before `cutoff`.
    async fn list_stale_claims(
        &self,
        owner: DbId,
        cutoff: Timestamp,
    ) -> Result<Vec<DbId>, StoreError>;
}

/// Deck library port.
#[async_trait]
pub trait DeckStore: Send + Sync {
    /// Look up one deck version. `None` when the version does not exist.
    async fn find_deck(&self, version_id: DbId) -> Result<Option<DeckDefinition>, StoreError>;
}
