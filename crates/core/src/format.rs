//! Game formats a job can request.
//!
//! The database stores the format as text (`two_player`, `four_player_ffa`,
//! `four_player_paired`); [`GameFormat`] is the closed set of values the
//! worker understands.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Match format requested by a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameFormat {
    /// One deck against one deck.
    TwoPlayer,
    /// Four decks, every player for themselves.
    FourPlayerFfa,
    /// Four half-decks merged pairwise into two decks, played as a
    /// two-player match.
    FourPlayerPaired,
}

impl GameFormat {
    pub const ALL: [GameFormat; 3] = [
        GameFormat::TwoPlayer,
        GameFormat::FourPlayerFfa,
        GameFormat::FourPlayerPaired,
    ];

    /// Database / wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TwoPlayer => "two_player",
            Self::FourPlayerFfa => "four_player_ffa",
            Self::FourPlayerPaired => "four_player_paired",
        }
    }

    /// Number of deck references a job of this format must carry.
    pub fn deck_count(self) -> usize {
        match self {
            Self::TwoPlayer => 2,
            Self::FourPlayerFfa | Self::FourPlayerPaired => 4,
        }
    }

    /// Format the engine is actually asked to play.
    ///
    /// Paired matches are downgraded to a plain two-player match between the
    /// two merged decks.
    pub fn effective(self) -> GameFormat {
        match self {
            Self::FourPlayerPaired => Self::TwoPlayer,
            other => other,
        }
    }

    /// Subdirectory of the engine deck root that holds this format's decks.
    ///
    /// These are the engine's own format directory names, not the job
    /// format strings: the engine installs two-player decks under
    /// `constructed/` and free-for-all decks under `commander/`. `None`
    /// means deck files sit directly in the deck root (paired decks).
    pub fn deck_subdir(self) -> Option<&'static str> {
        match self {
            Self::TwoPlayer => Some("constructed"),
            Self::FourPlayerFfa => Some("commander"),
            Self::FourPlayerPaired => None,
        }
    }
}

impl fmt::Display for GameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == s)
            .ok_or_else(|| CoreError::UnknownFormat(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
