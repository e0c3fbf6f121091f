//! Engine stdout parsing.
//!
//! The engine prints free text. Two markers matter:
//!
//! - a turn-outcome line contains `game outcome: turn` and ends with the
//!   number of turns the game took;
//! - a win line contains `won!` and the name of the winning deck.
//!
//! [`LineClassifier`] turns each line into zero or more [`LineEvent`]s and
//! [`ParsedResult::from_events`] folds them into counts. The two halves are
//! independent so either can be tested on its own.

use serde::Serialize;

use crate::types::{WinCounts, DECK_SLOTS};

/// Case-insensitive marker for a per-game turn count line.
pub const TURN_OUTCOME_MARKER: &str = "game outcome: turn";

/// Case-insensitive marker for a per-game winner line.
pub const WIN_MARKER: &str = "won!";

/// Classification of one stdout line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// A game ended after this many turns.
    TurnOutcome(i32),
    /// A game was won by the deck in this engine slot (0-based).
    Win(usize),
    /// Turn marker present but the trailing token is not an integer.
    MalformedTurn(String),
    /// Win marker present but no known deck name appears in the line.
    UnattributedWin(String),
    /// Neither marker present.
    Unknown,
}

/// Line classifier bound to the deck names of one match.
#[derive(Debug, Clone)]
pub struct LineClassifier {
    /// Lower-cased deck names in engine slot order. Empty names never match.
    names: Vec<String>,
}

impl LineClassifier {
    pub fn new<S: AsRef<str>>(deck_names: &[S]) -> Self {
        Self {
            names: deck_names
                .iter()
                .take(DECK_SLOTS)
                .map(|n| n.as_ref().trim().to_lowercase())
                .collect(),
        }
    }

    /// Classify a single line.
    ///
    /// A line carrying both markers yields the turn event first, then the
    /// win event.
    pub fn classify_line(&self, line: &str) -> impl Iterator<Item = LineEvent> {
        let lower = line.to_lowercase();

        let turn = lower.contains(TURN_OUTCOME_MARKER).then(|| {
            match lower.split_whitespace().last().map(str::parse::<i32>) {
                Some(Ok(turns)) => LineEvent::TurnOutcome(turns),
                _ => LineEvent::MalformedTurn(line.trim().to_string()),
            }
        });

        let win = lower.contains(WIN_MARKER).then(|| match self.winner(&lower) {
            Some(slot) => LineEvent::Win(slot),
            None => LineEvent::UnattributedWin(line.trim().to_string()),
        });

        let unknown = (turn.is_none() && win.is_none()).then_some(LineEvent::Unknown);

        [turn, win, unknown].into_iter().flatten()
    }

    /// Classify every line of `stdout`, in order.
    pub fn events<'a>(&'a self, stdout: &'a str) -> impl Iterator<Item = LineEvent> + 'a {
        stdout.lines().flat_map(move |line| self.classify_line(line))
    }

    /// First deck (in slot order) whose name occurs in `lower_line`.
    fn winner(&self, lower_line: &str) -> Option<usize> {
        self.names
            .iter()
            .position(|name| !name.is_empty() && lower_line.contains(name.as_str()))
    }
}

/// Aggregated counts for one engine run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedResult {
    /// Wins per engine slot.
    pub win_counts: WinCounts,
    /// Turn count of every game, in output order.
    pub turn_counts: Vec<i32>,
    /// Lines that carried a marker but could not be used.
    pub anomalies: usize,
}

impl ParsedResult {
    /// All-zero result recorded when the engine produced nothing usable.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fold classified events into counts, logging every anomaly.
    pub fn from_events<I>(events: I) -> Self
    where
        I: IntoIterator<Item = LineEvent>,
    {
        let mut result = Self::default();
        for event in events {
            match event {
                LineEvent::TurnOutcome(turns) => {
                    tracing::debug!(turns, "Turn outcome");
                    result.turn_counts.push(turns);
                }
                LineEvent::Win(slot) => {
                    tracing::debug!(slot = slot + 1, "Win credited");
                    result.win_counts[slot] += 1;
                }
                LineEvent::MalformedTurn(line) => {
                    tracing::warn!(%line, "Turn outcome line without a trailing turn count");
                    result.anomalies += 1;
                }
                LineEvent::UnattributedWin(line) => {
                    tracing::warn!(%line, "Win line matched no known deck");
                    result.anomalies += 1;
                }
                LineEvent::Unknown => {}
            }
        }
        result
    }

    /// Total wins across all slots.
    pub fn decided_games(&self) -> i32 {
        self.win_counts.iter().sum()
    }
}

/// Parse engine stdout for a match between `deck_names` (engine slot order).
///
/// Never fails: empty or garbled output yields an all-zero result.
pub fn parse<S: AsRef<str>>(stdout: &str, deck_names: &[S]) -> ParsedResult {
    let classifier = LineClassifier::new(deck_names);
    ParsedResult::from_events(classifier.events(stdout))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
