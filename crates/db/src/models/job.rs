//! Job entity model for the simulation queue.

use deckbench_core::error::CoreError;
use deckbench_core::format::GameFormat;
use deckbench_core::job::MatchJob;
use deckbench_core::types::{DbId, DeckRefs, Timestamp, WinCounts};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub deck_ref_1: Option<DbId>,
    pub deck_ref_2: Option<DbId>,
    pub deck_ref_3: Option<DbId>,
    pub deck_ref_4: Option<DbId>,
    pub format: String,
    pub game_count: i32,
    pub claim_owner: Option<DbId>,
    pub claimed_at: Option<Timestamp>,
    pub win_1: i32,
    pub win_2: i32,
    pub win_3: i32,
    pub win_4: i32,
    pub turn_counts: Vec<i32>,
    pub created_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

/// Minimal projection used by the poller to pick claim candidates.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct JobCandidate {
    pub id: DbId,
    pub created_at: Timestamp,
}

impl Job {
    pub fn deck_refs(&self) -> DeckRefs {
        [
            self.deck_ref_1,
            self.deck_ref_2,
            self.deck_ref_3,
            self.deck_ref_4,
        ]
    }

    pub fn win_counts(&self) -> WinCounts {
        [self.win_1, self.win_2, self.win_3, self.win_4]
    }

    pub fn game_format(&self) -> Result<GameFormat, CoreError> {
        self.format.parse()
    }

    /// Convert the row into the worker's view of the job.
    pub fn to_match_job(&self) -> Result<MatchJob, CoreError> {
        let game_count = u32::try_from(self.game_count)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "job {} has invalid game_count {}",
                    self.id, self.game_count
                ))
            })?;

        Ok(MatchJob {
            id: self.id,
            deck_refs: self.deck_refs(),
            format: self.game_format()?,
            game_count,
            created_at: self.created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
