//! Job shapes shared by the store and the worker pipeline.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::format::GameFormat;
use crate::resolver;
use crate::types::{DbId, DeckRefs, Timestamp, WinCounts};

/// A queued simulation job as seen by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchJob {
    pub id: DbId,
    pub deck_refs: DeckRefs,
    pub format: GameFormat,
    pub game_count: u32,
    pub created_at: Timestamp,
}

/// Request to enqueue a new job.
#[derive(Debug, Clone, Deserialize)]
pub struct NewJob {
    pub deck_refs: DeckRefs,
    pub format: GameFormat,
    pub game_count: i32,
}

impl NewJob {
    /// Check the game count and that the deck slots fit the format.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.game_count < 1 {
            return Err(CoreError::Validation(format!(
                "game_count must be at least 1, got {}",
                self.game_count
            )));
        }
        resolver::plan(self.format, &self.deck_refs)
            .map(|_| ())
            .map_err(|e| CoreError::Validation(e.to_string()))
    }
}

/// Final outcome written back to a job row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobResult {
    pub win_counts: WinCounts,
    pub turn_counts: Vec<i32>,
    pub finished_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
