//! Integration tests for the job queue and deck library repositories.
//!
//! Covers:
//! - Submit and candidate ordering
//! - Compare-and-set claiming under concurrency
//! - Writing results back to a claimed job
//! - Stale claim listing
//! - Loading a deck version as a definition

use chrono::{Duration, Utc};
use deckbench_core::deck::CardLine;
use deckbench_core::format::GameFormat;
use deckbench_core::job::{JobResult, NewJob};
use deckbench_core::types::DbId;
use deckbench_db::repositories::{DeckRepo, JobRepo};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed_deck(pool: &PgPool, name: &str) -> DbId {
    let cards = [
        CardLine::new("Llanowar Elves", 4, Some("M19")),
        CardLine::new("Forest", 20, None),
    ];
    DeckRepo::insert_version(pool, DbId::new_v4(), name, &cards)
        .await
        .unwrap()
        .version_id
}

async fn seed_job(pool: &PgPool) -> DbId {
    let alpha = seed_deck(pool, "Alpha").await;
    let beta = seed_deck(pool, "Beta").await;
    let input = NewJob {
        deck_refs: [Some(alpha), Some(beta), None, None],
        format: GameFormat::TwoPlayer,
        game_count: 3,
    };
    JobRepo::submit(pool, &input).await.unwrap().id
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn submitted_job_is_unclaimed(pool: PgPool) {
    let id = seed_job(&pool).await;

    let job = JobRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert!(job.claim_owner.is_none());
    assert!(job.finished_at.is_none());
    assert_eq!(job.win_counts(), [0, 0, 0, 0]);
    assert_eq!(job.to_match_job().unwrap().format, GameFormat::TwoPlayer);

    let candidates = JobRepo::list_unclaimed(&pool, 10).await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].id, id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn candidates_are_listed_oldest_first(pool: PgPool) {
    let first = seed_job(&pool).await;
    let second = seed_job(&pool).await;
    sqlx::query("UPDATE jobs SET created_at = NOW() - INTERVAL '1 hour' WHERE id = $1")
        .bind(second)
        .execute(&pool)
        .await
        .unwrap();

    let ids: Vec<_> = JobRepo::list_unclaimed(&pool, 10)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, [second, first]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn only_one_concurrent_claim_succeeds(pool: PgPool) {
    let id = seed_job(&pool).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            JobRepo::try_claim(&pool, id, DbId::new_v4()).await.unwrap()
        }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        if let Some(job) = handle.await.unwrap() {
            winners.push(job);
        }
    }
    assert_eq!(winners.len(), 1);

    let stored = JobRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(stored.claim_owner, winners[0].claim_owner);
    assert!(stored.claimed_at.is_some());
    assert!(JobRepo::list_unclaimed(&pool, 10).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn claim_of_claimed_job_returns_none(pool: PgPool) {
    let id = seed_job(&pool).await;
    let owner = DbId::new_v4();

    assert!(JobRepo::try_claim(&pool, id, owner).await.unwrap().is_some());
    assert!(JobRepo::try_claim(&pool, id, owner).await.unwrap().is_none());
    assert!(JobRepo::try_claim(&pool, DbId::new_v4(), owner)
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn records_result_on_claimed_job(pool: PgPool) {
    let id = seed_job(&pool).await;
    JobRepo::try_claim(&pool, id, DbId::new_v4()).await.unwrap();

    let result = JobResult {
        win_counts: [2, 1, 0, 0],
        turn_counts: vec![4, 6, 5],
        finished_at: Utc::now(),
    };
    assert!(JobRepo::record_result(&pool, id, &result).await.unwrap());

    let job = JobRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(job.win_counts(), [2, 1, 0, 0]);
    assert_eq!(job.turn_counts, [4, 6, 5]);
    assert!(job.finished_at.is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unclaimed_job_cannot_be_finished(pool: PgPool) {
    let id = seed_job(&pool).await;
    let result = JobResult {
        win_counts: [1, 0, 0, 0],
        turn_counts: vec![3],
        finished_at: Utc::now(),
    };
    assert!(!JobRepo::record_result(&pool, id, &result).await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn lists_stale_claims_for_owner(pool: PgPool) {
    let owner = DbId::new_v4();
    let stale = seed_job(&pool).await;
    let fresh = seed_job(&pool).await;
    JobRepo::try_claim(&pool, stale, owner).await.unwrap();
    JobRepo::try_claim(&pool, fresh, owner).await.unwrap();
    sqlx::query("UPDATE jobs SET claimed_at = NOW() - INTERVAL '7 hours' WHERE id = $1")
        .bind(stale)
        .execute(&pool)
        .await
        .unwrap();

    let cutoff = Utc::now() - Duration::hours(6);
    let found = JobRepo::list_stale_claims(&pool, owner, cutoff).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, stale);

    let other = JobRepo::list_stale_claims(&pool, DbId::new_v4(), cutoff)
        .await
        .unwrap();
    assert!(other.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn loads_deck_definition_in_card_order(pool: PgPool) {
    let version = seed_deck(&pool, "Elves").await;

    let deck = DeckRepo::load_definition(&pool, version).await.unwrap().unwrap();
    assert_eq!(deck.name, "Elves");
    assert_eq!(deck.cards[0].card_name, "Llanowar Elves");
    assert_eq!(deck.cards[0].set_code.as_deref(), Some("M19"));
    assert_eq!(deck.cards[1].card_name, "Forest");
    assert_eq!(deck.card_count(), 24);

    assert!(DeckRepo::load_definition(&pool, DbId::new_v4())
        .await
        .unwrap()
        .is_none());
}
