//! In-process store with the same claim semantics as Postgres.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use deckbench_core::deck::DeckDefinition;
use deckbench_core::format::GameFormat;
use deckbench_core::job::{JobResult, MatchJob};
use deckbench_core::types::{DbId, DeckRefs, Timestamp};
use tokio::sync::Mutex;

use super::{ClaimOutcome, DeckStore, JobStore, StoreError};

/// A job plus its queue bookkeeping.
#[derive(Debug, Clone)]
pub struct StoredJob {
    pub job: MatchJob,
    pub claim_owner: Option<DbId>,
    pub claimed_at: Option<Timestamp>,
    /// Set once results are recorded.
    pub result: Option<JobResult>,
}

impl StoredJob {
    pub fn is_finished(&self) -> bool {
        self.result.is_some()
    }
}

#[derive(Default)]
struct MemoryState {
    /// Jobs in submission order.
    jobs: Vec<StoredJob>,
    decks: HashMap<DbId, DeckDefinition>,
    /// When set, every call fails with [`StoreError::Unavailable`].
    unavailable: bool,
}

impl MemoryState {
    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            Err(StoreError::Unavailable("memory store marked unavailable".into()))
        } else {
            Ok(())
        }
    }

    fn find_mut(&mut self, id: DbId) -> Option<&mut StoredJob> {
        self.jobs.iter_mut().find(|j| j.job.id == id)
    }
}

/// Store that keeps jobs and decks in memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a deck version and return its id.
    pub async fn add_deck(&self, deck: DeckDefinition) -> DbId {
        let id = DbId::new_v4();
        self.state.lock().await.decks.insert(id, deck);
        id
    }

    /// Enqueue an unclaimed job and return its id.
    pub async fn add_job(&self, format: GameFormat, deck_refs: DeckRefs, game_count: u32) -> DbId {
        let id = DbId::now_v7();
        let job = MatchJob {
            id,
            deck_refs,
            format,
            game_count,
            created_at: Utc::now(),
        };
        self.state.lock().await.jobs.push(StoredJob {
            job,
            claim_owner: None,
            claimed_at: None,
            result: None,
        });
        id
    }

    /// Snapshot of one job.
    pub async fn job(&self, id: DbId) -> Option<StoredJob> {
        let state = self.state.lock().await;
        state.jobs.iter().find(|j| j.job.id == id).cloned()
    }

    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.unavailable = unavailable;
    }

    /// Move a claim's timestamp, e.g. to make it look stale.
    pub async fn set_claimed_at(&self, id: DbId, claimed_at: Timestamp) {
        if let Some(job) = self.state.lock().await.find_mut(id) {
            job.claimed_at = Some(claimed_at);
        }
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn list_unclaimed(&self, limit: usize) -> Result<Vec<DbId>, StoreError> {
        let state = self.state.lock().await;
        state.check_available()?;
        Ok(state
            .jobs
            .iter()
            .filter(|j| j.claim_owner.is_none())
            .take(limit)
            .map(|j| j.job.id)
            .collect())
    }

    async fn try_claim(&self, id: DbId, owner: DbId) -> Result<ClaimOutcome, StoreError> {
        let mut state = self.state.lock().await;
        state.check_available()?;
        match state.find_mut(id) {
            Some(stored) if stored.claim_owner.is_none() => {
                stored.claim_owner = Some(owner);
                stored.claimed_at = Some(Utc::now());
                Ok(ClaimOutcome::Claimed(stored.job.clone()))
            }
            _ => Ok(ClaimOutcome::Raced),
        }
    }

    async fn record_result(&self, id: DbId, result: &JobResult) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.check_available()?;
        match state.find_mut(id) {
            Some(stored) if stored.claim_owner.is_some() => {
                stored.result = Some(result.clone());
                Ok(())
            }
            _ => Err(StoreError::NotFound(id)),
        }
    }

    async fn list_stale_claims(
        &self,
        owner: DbId,
        cutoff: Timestamp,
    ) -> Result<Vec<DbId>, StoreError> {
        let state = self.state.lock().await;
        state.check_available()?;
        Ok(state
            .jobs
            .iter()
            .filter(|j| j.claim_owner == Some(owner) && !j.is_finished())
            .filter(|j| j.claimed_at.is_some_and(|at| at < cutoff))
            .map(|j| j.job.id)
            .collect())
    }
}

#[async_trait]
impl DeckStore for MemoryStore {
    async fn find_deck(&self, version_id: DbId) -> Result<Option<DeckDefinition>, StoreError> {
        let state = self.state.lock().await;
        state.check_available()?;
        Ok(state.decks.get(&version_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
