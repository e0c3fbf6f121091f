//! Deck version and card line models.

use deckbench_core::deck::{CardLine, DeckDefinition};
use deckbench_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `decks` table: one immutable version of a deck.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeckVersion {
    pub version_id: DbId,
    pub deck_id: DbId,
    pub name: String,
    pub version_name: Option<String>,
    pub owner_id: Option<DbId>,
    pub format: Option<String>,
    pub uploaded_at: Timestamp,
}

/// A row from the `deck_cards` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeckCard {
    pub id: DbId,
    pub version_id: DbId,
    pub position: i32,
    pub card_name: String,
    pub set_code: Option<String>,
    pub quantity: i32,
    pub category: Option<String>,
    pub colour: Option<String>,
    pub format: Option<String>,
}

impl From<DeckCard> for CardLine {
    fn from(card: DeckCard) -> Self {
        CardLine {
            card_name: card.card_name,
            quantity: card.quantity,
            set_code: card.set_code,
            category: card.category,
            colour: card.colour,
        }
    }
}

impl DeckVersion {
    /// Build a deck definition from this version and its card rows.
    pub fn into_definition(self, cards: Vec<DeckCard>) -> DeckDefinition {
        DeckDefinition::new(self.name, cards.into_iter().map(CardLine::from).collect())
    }
}
