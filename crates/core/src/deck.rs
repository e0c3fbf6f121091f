//! Deck definitions and the engine's deck-file format.

use serde::{Deserialize, Serialize};

/// File extension the engine expects for deck files.
pub const DECK_FILE_EXTENSION: &str = "dck";

/// Empty sections written after `[Main]`, in order.
const TRAILING_SECTIONS: [&str; 4] = ["Sideboard", "Planes", "Schemes", "Conspiracy"];

/// A single card entry in a deck list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardLine {
    pub card_name: String,
    pub quantity: i32,
    /// Printing set code, e.g. `JMP`. Rendered empty when unknown.
    pub set_code: Option<String>,
    /// Free-form category tag (e.g. `Land`, `Creature`).
    pub category: Option<String>,
    /// Colour identity tag (e.g. `W`, `UB`).
    pub colour: Option<String>,
}

impl CardLine {
    pub fn new(card_name: impl Into<String>, quantity: i32, set_code: Option<&str>) -> Self {
        Self {
            card_name: card_name.into(),
            quantity,
            set_code: set_code.map(str::to_string),
            category: None,
            colour: None,
        }
    }
}

/// A named, ordered deck list built for one job execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckDefinition {
    pub name: String,
    pub cards: Vec<CardLine>,
}

impl DeckDefinition {
    pub fn new(name: impl Into<String>, cards: Vec<CardLine>) -> Self {
        Self {
            name: name.into(),
            cards,
        }
    }

    /// Concatenate two half-decks into one deck named `first_second`.
    ///
    /// Card lines are kept as-is, in order: `first`'s lines, then `second`'s.
    pub fn merge(first: &DeckDefinition, second: &DeckDefinition) -> DeckDefinition {
        let mut cards = Vec::with_capacity(first.cards.len() + second.cards.len());
        cards.extend(first.cards.iter().cloned());
        cards.extend(second.cards.iter().cloned());
        DeckDefinition {
            name: format!("{}_{}", first.name, second.name),
            cards,
        }
    }

    /// Total number of cards across all lines.
    pub fn card_count(&self) -> i32 {
        self.cards.iter().map(|c| c.quantity).sum()
    }

    /// File name for this deck, with path separators stripped from the name.
    pub fn file_name(&self) -> String {
        let stem: String = self
            .name
            .chars()
            .filter(|c| !matches!(c, '/' | '\\'))
            .collect();
        format!("{}.{DECK_FILE_EXTENSION}", stem.trim())
    }

    /// Render the deck in the engine's plain-text deck format.
    ///
    /// The output ends with the `[Dungeon]` marker and no trailing newline.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("[metadata]\n");
        out.push_str(&format!("Name={}\n", self.name));
        out.push_str("[Avatar]\n\n");
        out.push_str("[Main]\n");
        for card in &self.cards {
            out.push_str(&format!(
                "{} {}|{}|1\n",
                card.quantity,
                card.card_name,
                card.set_code.as_deref().unwrap_or("")
            ));
        }
        for section in TRAILING_SECTIONS {
            out.push_str(&format!("[{section}]\n\n"));
        }
        out.push_str("[Dungeon]");
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn half(name: &str, cards: &[(&str, i32)]) -> DeckDefinition {
        DeckDefinition::new(
            name,
            cards
                .iter()
                .map(|(card, qty)| CardLine::new(*card, *qty, Some("JMP")))
                .collect(),
        )
    }

    // -- render -------------------------------------------------------------

    #[test]
    fn render_matches_engine_layout() {
        let deck = DeckDefinition::new(
            "Goblins",
            vec![
                CardLine::new("Mountain", 7, Some("JMP")),
                CardLine::new("Goblin Guide", 1, None),
            ],
        );
        let expected = "[metadata]\n\
                        Name=Goblins\n\
                        [Avatar]\n\
                        \n\
                        [Main]\n\
                        7 Mountain|JMP|1\n\
                        1 Goblin Guide||1\n\
                        [Sideboard]\n\
                        \n\
                        [Planes]\n\
                        \n\
                        [Schemes]\n\
                        \n\
                        [Conspiracy]\n\
                        \n\
                        [Dungeon]";
        assert_eq!(deck.render(), expected);
    }

    #[test]
    fn render_empty_deck_keeps_all_sections() {
        let rendered = DeckDefinition::new("Empty", vec![]).render();
        assert!(rendered.contains("[Main]\n[Sideboard]"));
        assert!(rendered.ends_with("[Dungeon]"));
    }

    // -- merge --------------------------------------------------------------

    #[test]
    fn merge_concatenates_names_and_cards() {
        let a = half("Angels", &[("Plains", 7), ("Serra Angel", 1)]);
        let b = half("Dragons", &[("Mountain", 7)]);
        let merged = DeckDefinition::merge(&a, &b);

        assert_eq!(merged.name, "Angels_Dragons");
        let names: Vec<_> = merged.cards.iter().map(|c| c.card_name.as_str()).collect();
        assert_eq!(names, ["Plains", "Serra Angel", "Mountain"]);
        assert_eq!(merged.card_count(), 15);
    }

    #[test]
    fn merge_keeps_duplicate_lines() {
        let a = half("Left", &[("Island", 8)]);
        let b = half("Right", &[("Island", 8)]);
        let merged = DeckDefinition::merge(&a, &b);
        assert_eq!(merged.cards.len(), 2);
        assert_eq!(merged.card_count(), 16);
    }

    // -- file_name ----------------------------------------------------------

    #[test]
    fn file_name_strips_path_separators() {
        let deck = DeckDefinition::new("Fire/Ice \\ Burn", vec![]);
        assert_eq!(deck.file_name(), "FireIce  Burn.dck");
    }
}
