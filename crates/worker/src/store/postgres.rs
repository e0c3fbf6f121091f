//! Postgres-backed store built on the `deckbench-db` repositories.

use async_trait::async_trait;
use deckbench_core::deck::DeckDefinition;
use deckbench_core::job::JobResult;
use deckbench_core::types::{DbId, Timestamp};
use deckbench_db::repositories::{DeckRepo, JobRepo};
use deckbench_db::DbPool;

use super::{ClaimOutcome, DeckStore, JobStore, StoreError};

/// Store backed by a shared connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn list_unclaimed(&self, limit: usize) -> Result<Vec<DbId>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let candidates = JobRepo::list_unclaimed(&self.pool, limit).await?;
        Ok(candidates.into_iter().map(|c| c.id).collect())
    }

    async fn try_claim(&self, id: DbId, owner: DbId) -> Result<ClaimOutcome, StoreError> {
        match JobRepo::try_claim(&self.pool, id, owner).await? {
            Some(row) => row
                .to_match_job()
                .map(ClaimOutcome::Claimed)
                .map_err(|e| StoreError::CorruptRow {
                    id,
                    reason: e.to_string(),
                }),
            None => Ok(ClaimOutcome::Raced),
        }
    }

    async fn record_result(&self, id: DbId, result: &JobResult) -> Result<(), StoreError> {
        if JobRepo::record_result(&self.pool, id, result).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound(id))
        }
    }

    async fn list_stale_claims(
        &self,
        owner: DbId,
        cutoff: Timestamp,
    ) -> Result<Vec<DbId>, StoreError> {
        let jobs = JobRepo::list_stale_claims(&self.pool, owner, cutoff).await?;
        Ok(jobs.into_iter().map(|j| j.id).collect())
    }
}

#[async_trait]
impl DeckStore for PgStore {
    async fn find_deck(&self, version_id: DbId) -> Result<Option<DeckDefinition>, StoreError> {
        Ok(DeckRepo::load_definition(&self.pool, version_id).await?)
    }
}
