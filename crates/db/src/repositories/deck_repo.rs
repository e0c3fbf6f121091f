//! Repository for the `decks` and `deck_cards` tables.

use deckbench_core::deck::{CardLine, DeckDefinition};
use deckbench_core::types::DbId;
use sqlx::PgPool;

use crate::models::deck::{DeckCard, DeckVersion};

/// Column list for `decks` queries.
const COLUMNS: &str = "version_id, deck_id, name, version_name, owner_id, format, uploaded_at";

/// Column list for `deck_cards` queries.
const CARD_COLUMNS: &str =
    "id, version_id, position, card_name, set_code, quantity, category, colour, format";

/// Read access to stored deck versions.
pub struct DeckRepo;

impl DeckRepo {
    /// Find one deck version by its version ID.
    pub async fn find_version(
        pool: &PgPool,
        version_id: DbId,
    ) -> Result<Option<DeckVersion>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM decks WHERE version_id = $1");
        sqlx::query_as::<_, DeckVersion>(&query)
            .bind(version_id)
            .fetch_optional(pool)
            .await
    }

    /// Card lines of a version in list order.
    pub async fn list_cards(pool: &PgPool, version_id: DbId) -> Result<Vec<DeckCard>, sqlx::Error> {
        let query = format!(
            "SELECT {CARD_COLUMNS} FROM deck_cards \
             WHERE version_id = $1 \
             ORDER BY position ASC, id ASC"
        );
        sqlx::query_as::<_, DeckCard>(&query)
            .bind(version_id)
            .fetch_all(pool)
            .await
    }

    /// Load a version together with its cards as a renderable definition.
    pub async fn load_definition(
        pool: &PgPool,
        version_id: DbId,
    ) -> Result<Option<DeckDefinition>, sqlx::Error> {
        let Some(version) = Self::find_version(pool, version_id).await? else {
            return Ok(None);
        };
        let cards = Self::list_cards(pool, version_id).await?;
        Ok(Some(version.into_definition(cards)))
    }

    /// Store a new deck version with its cards in one transaction.
    pub async fn insert_version(
        pool: &PgPool,
        deck_id: DbId,
        name: &str,
        cards: &[CardLine],
    ) -> Result<DeckVersion, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let query = format!(
            "INSERT INTO decks (version_id, deck_id, name) VALUES ($1, $2, $3) RETURNING {COLUMNS}"
        );
        let version = sqlx::query_as::<_, DeckVersion>(&query)
            .bind(DbId::now_v7())
            .bind(deck_id)
            .bind(name)
            .fetch_one(&mut *tx)
            .await?;

        for (position, card) in cards.iter().enumerate() {
            sqlx::query(
                "INSERT INTO deck_cards \
                 (id, version_id, position, card_name, set_code, quantity, category, colour) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(DbId::now_v7())
            .bind(version.version_id)
            .bind(position as i32)
            .bind(&card.card_name)
            .bind(&card.set_code)
            .bind(card.quantity)
            .bind(&card.category)
            .bind(&card.colour)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(version)
    }
}
