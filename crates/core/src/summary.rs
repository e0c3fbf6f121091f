//! Per-match summary statistics logged when a job completes.

use std::collections::HashMap;

use serde::Serialize;

use crate::parser::ParsedResult;
use crate::types::DECK_SLOTS;

/// Aggregate view of one engine run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchSummary {
    /// Games that produced an attributed winner.
    pub decided_games: i32,
    /// Share of decided games won per engine slot, rounded to 4 places.
    pub win_rates: [f64; DECK_SLOTS],
    /// Mean turn count, rounded to 2 places. `0.0` without turn data.
    pub avg_turns: f64,
    /// Median turn count. `0.0` without turn data.
    pub median_turns: f64,
    /// Most frequent turn count; ties go to the value seen first.
    pub mode_turns: Option<i32>,
}

impl MatchSummary {
    pub fn from_result(result: &ParsedResult) -> Self {
        let decided_games = result.decided_games();
        let mut win_rates = [0.0; DECK_SLOTS];
        if decided_games > 0 {
            for (rate, wins) in win_rates.iter_mut().zip(result.win_counts) {
                *rate = round_to(f64::from(wins) / f64::from(decided_games), 4);
            }
        }

        Self {
            decided_games,
            win_rates,
            avg_turns: round_to(mean(&result.turn_counts), 2),
            median_turns: median(&result.turn_counts),
            mode_turns: mode(&result.turn_counts),
        }
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn mean(values: &[i32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| f64::from(*v)).sum::<f64>() / values.len() as f64
}

fn median(values: &[i32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (f64::from(sorted[mid - 1]) + f64::from(sorted[mid])) / 2.0
    } else {
        f64::from(sorted[mid])
    }
}

fn mode(values: &[i32]) -> Option<i32> {
    let mut counts: HashMap<i32, usize> = HashMap::new();
    for value in values {
        *counts.entry(*value).or_default() += 1;
    }
    let best = counts.values().copied().max()?;
    values.iter().copied().find(|v| counts[v] == best)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
