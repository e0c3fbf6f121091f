//! Deck resolution rules per game format.
//!
//! Resolution happens in two steps so the caller can fetch deck versions
//! asynchronously in between:
//!
//! 1. [`plan`] validates the job's deck slots against the format and decides
//!    which deck versions make up each engine deck.
//! 2. [`MatchPlan::resolve`] looks every version up and builds the final
//!    [`DeckDefinition`]s. Nothing is built unless every lookup succeeds.
//!
//! For [`GameFormat::FourPlayerPaired`] slots 1+2 and 3+4 are merged into two
//! decks and the engine plays a two-player match. Wins of each merged deck
//! are credited identically to both of its source slots.

use crate::deck::DeckDefinition;
use crate::format::GameFormat;
use crate::types::{DbId, DeckRefs, WinCounts, DECK_SLOTS};

/// Reasons a job's deck references cannot be turned into engine decks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("{format} requires {expected} decks, got {actual}")]
    WrongDeckCount {
        format: GameFormat,
        expected: usize,
        actual: usize,
    },

    #[error("{format} requires a deck in slot {slot}")]
    MissingDeck { format: GameFormat, slot: usize },

    #[error("deck version {0} not found")]
    UnknownDeck(DbId),
}

/// Maps engine-deck wins back onto job slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinCredit {
    /// For each job slot, the engine deck whose wins it receives.
    sources: [Option<usize>; DECK_SLOTS],
}

impl WinCredit {
    /// Slot `i` receives the wins of engine deck `i`.
    pub fn one_to_one(decks: usize) -> Self {
        let mut sources = [None; DECK_SLOTS];
        for (slot, source) in sources.iter_mut().enumerate().take(decks) {
            *source = Some(slot);
        }
        Self { sources }
    }

    /// Slots 1 and 2 receive merged deck A's wins, slots 3 and 4 deck B's.
    pub fn paired() -> Self {
        Self {
            sources: [Some(0), Some(0), Some(1), Some(1)],
        }
    }

    /// Translate per-engine-deck wins into per-slot wins.
    pub fn apply(&self, engine_wins: &WinCounts) -> WinCounts {
        let mut credited = [0; DECK_SLOTS];
        for (slot, source) in self.sources.iter().enumerate() {
            if let Some(deck) = source {
                credited[slot] = engine_wins[*deck];
            }
        }
        credited
    }
}

/// Validated resolution plan for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPlan {
    pub format: GameFormat,
    /// Deck versions composing each engine deck, in engine slot order.
    pub groups: Vec<Vec<DbId>>,
    pub credit: WinCredit,
}

/// Fully resolved decks ready to be written and played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMatch {
    pub decks: Vec<DeckDefinition>,
    pub effective_format: GameFormat,
    /// Deck-root subdirectory for this match's files, `None` for flat paths.
    pub deck_subdir: Option<&'static str>,
    pub credit: WinCredit,
}

impl ResolvedMatch {
    /// Engine deck names in engine slot order.
    pub fn deck_names(&self) -> Vec<&str> {
        self.decks.iter().map(|d| d.name.as_str()).collect()
    }
}

/// Validate `refs` against `format` and group them into engine decks.
///
/// Exactly `format.deck_count()` leading slots must be filled; anything
/// beyond that must be empty.
pub fn plan(format: GameFormat, refs: &DeckRefs) -> Result<MatchPlan, ResolveError> {
    let expected = format.deck_count();
    let actual = refs.iter().flatten().count();
    if actual != expected {
        return Err(ResolveError::WrongDeckCount {
            format,
            expected,
            actual,
        });
    }

    let mut ids = Vec::with_capacity(expected);
    for (index, slot) in refs.iter().take(expected).enumerate() {
        match slot {
            Some(id) => ids.push(*id),
            None => {
                return Err(ResolveError::MissingDeck {
                    format,
                    slot: index + 1,
                })
            }
        }
    }

    let (groups, credit) = match format {
        GameFormat::FourPlayerPaired => (
            vec![vec![ids[0], ids[1]], vec![ids[2], ids[3]]],
            WinCredit::paired(),
        ),
        GameFormat::TwoPlayer | GameFormat::FourPlayerFfa => (
            ids.iter().map(|id| vec![*id]).collect(),
            WinCredit::one_to_one(expected),
        ),
    };

    Ok(MatchPlan {
        format,
        groups,
        credit,
    })
}

impl MatchPlan {
    /// Every deck version referenced by the plan, possibly with repeats.
    pub fn version_ids(&self) -> impl Iterator<Item = DbId> + '_ {
        self.groups.iter().flatten().copied()
    }

    /// Build engine decks by looking up every referenced version.
    ///
    /// `lookup` returns `None` for unknown versions; the first miss aborts
    /// resolution with [`ResolveError::UnknownDeck`].
    pub fn resolve<F>(self, mut lookup: F) -> Result<ResolvedMatch, ResolveError>
    where
        F: FnMut(DbId) -> Option<DeckDefinition>,
    {
        let mut decks = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            let mut parts = Vec::with_capacity(group.len());
            for id in group {
                parts.push(lookup(*id).ok_or(ResolveError::UnknownDeck(*id))?);
            }
            let deck = parts
                .into_iter()
                .reduce(|merged, next| DeckDefinition::merge(&merged, &next))
                .ok_or(ResolveError::MissingDeck {
                    format: self.format,
                    slot: decks.len() + 1,
                })?;
            decks.push(deck);
        }

        Ok(ResolvedMatch {
            decks,
            effective_format: self.format.effective(),
            deck_subdir: self.format.deck_subdir(),
            credit: self.credit,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;
    use crate::deck::CardLine;

    fn library(names: &[&str]) -> (Vec<DbId>, HashMap<DbId, DeckDefinition>) {
        let mut ids = Vec::new();
        let mut decks = HashMap::new();
        for name in names {
            let id = DbId::new_v4();
            ids.push(id);
            decks.insert(
                id,
                DeckDefinition::new(*name, vec![CardLine::new(format!("{name} card"), 1, None)]),
            );
        }
        (ids, decks)
    }

    fn refs(ids: &[DbId]) -> DeckRefs {
        let mut refs = [None; DECK_SLOTS];
        for (slot, id) in refs.iter_mut().zip(ids) {
            *slot = Some(*id);
        }
        refs
    }

    // -- plan ---------------------------------------------------------------

    #[test]
    fn two_player_maps_one_to_one() {
        let (ids, decks) = library(&["X", "Y"]);
        let resolved = plan(GameFormat::TwoPlayer, &refs(&ids))
            .unwrap()
            .resolve(|id| decks.get(&id).cloned())
            .unwrap();

        assert_eq!(resolved.deck_names(), ["X", "Y"]);
        assert_eq!(resolved.effective_format, GameFormat::TwoPlayer);
        assert_eq!(resolved.deck_subdir, Some("constructed"));
        assert_eq!(resolved.credit.apply(&[2, 1, 0, 0]), [2, 1, 0, 0]);
    }

    #[test]
    fn free_for_all_keeps_four_decks() {
        let (ids, decks) = library(&["A", "B", "C", "D"]);
        let resolved = plan(GameFormat::FourPlayerFfa, &refs(&ids))
            .unwrap()
            .resolve(|id| decks.get(&id).cloned())
            .unwrap();

        assert_eq!(resolved.deck_names(), ["A", "B", "C", "D"]);
        assert_eq!(resolved.effective_format, GameFormat::FourPlayerFfa);
        assert_eq!(resolved.credit.apply(&[1, 0, 3, 2]), [1, 0, 3, 2]);
    }

    #[test]
    fn paired_merges_halves_and_credits_symmetrically() {
        let (ids, decks) = library(&["a", "b", "c", "d"]);
        let resolved = plan(GameFormat::FourPlayerPaired, &refs(&ids))
            .unwrap()
            .resolve(|id| decks.get(&id).cloned())
            .unwrap();

        assert_eq!(resolved.deck_names(), ["a_b", "c_d"]);
        assert_eq!(resolved.effective_format, GameFormat::TwoPlayer);
        assert_eq!(resolved.deck_subdir, None);
        assert_eq!(resolved.decks[0].cards.len(), 2);
        assert_eq!(resolved.credit.apply(&[2, 1, 0, 0]), [2, 2, 1, 1]);
    }

    #[test]
    fn same_version_may_fill_two_slots() {
        let (ids, decks) = library(&["Mirror"]);
        let resolved = plan(GameFormat::TwoPlayer, &refs(&[ids[0], ids[0]]))
            .unwrap()
            .resolve(|id| decks.get(&id).cloned())
            .unwrap();
        assert_eq!(resolved.deck_names(), ["Mirror", "Mirror"]);
    }

    #[test]
    fn wrong_count_is_rejected() {
        let (ids, _) = library(&["a", "b"]);
        assert_matches!(
            plan(GameFormat::FourPlayerPaired, &refs(&ids)),
            Err(ResolveError::WrongDeckCount {
                expected: 4,
                actual: 2,
                ..
            })
        );
    }

    #[test]
    fn extra_deck_beyond_player_count_is_rejected() {
        let (ids, _) = library(&["a", "b", "c"]);
        assert_matches!(
            plan(GameFormat::TwoPlayer, &refs(&ids)),
            Err(ResolveError::WrongDeckCount { actual: 3, .. })
        );
    }

    #[test]
    fn gap_in_slots_is_rejected() {
        let (ids, _) = library(&["a", "b"]);
        let refs = [Some(ids[0]), None, Some(ids[1]), None];
        assert_matches!(
            plan(GameFormat::TwoPlayer, &refs),
            Err(ResolveError::MissingDeck { slot: 2, .. })
        );
    }

    // -- resolve ------------------------------------------------------------

    #[test]
    fn unknown_version_aborts_resolution() {
        let (ids, mut decks) = library(&["a", "b", "c", "d"]);
        decks.remove(&ids[2]);
        let err = plan(GameFormat::FourPlayerPaired, &refs(&ids))
            .unwrap()
            .resolve(|id| decks.get(&id).cloned())
            .unwrap_err();
        assert_eq!(err, ResolveError::UnknownDeck(ids[2]));
    }

    #[test]
    fn version_ids_lists_every_reference() {
        let (ids, _) = library(&["a", "b", "c", "d"]);
        let plan = plan(GameFormat::FourPlayerPaired, &refs(&ids)).unwrap();
        assert_eq!(plan.version_ids().collect::<Vec<_>>(), ids);
    }
}
