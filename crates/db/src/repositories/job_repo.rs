//! Repository for the `jobs` table.
//!
//! A job moves through three states, all derived from its columns:
//! unclaimed (`claim_owner IS NULL`), in flight (claimed, `finished_at IS NULL`)
//! and finished. The claim is a single conditional `UPDATE` so that at most
//! one device ever owns a job.

use deckbench_core::job::{JobResult, NewJob};
use deckbench_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::job::{Job, JobCandidate};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, deck_ref_1, deck_ref_2, deck_ref_3, deck_ref_4, \
    format, game_count, claim_owner, claimed_at, \
    win_1, win_2, win_3, win_4, turn_counts, \
    created_at, finished_at";

/// Upper bound on candidates returned per poll.
const MAX_CANDIDATES: i64 = 100;

/// Provides queue operations for simulation jobs.
pub struct JobRepo;

impl JobRepo {
    /// Enqueue a new unclaimed job. The caller validates `input` first.
    pub async fn submit(pool: &PgPool, input: &NewJob) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (id, deck_ref_1, deck_ref_2, deck_ref_3, deck_ref_4, format, game_count) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        let [d1, d2, d3, d4] = input.deck_refs;
        sqlx::query_as::<_, Job>(&query)
            .bind(DbId::now_v7())
            .bind(d1)
            .bind(d2)
            .bind(d3)
            .bind(d4)
            .bind(input.format.as_str())
            .bind(input.game_count)
            .fetch_one(pool)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Unclaimed jobs, oldest first.
    pub async fn list_unclaimed(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<JobCandidate>, sqlx::Error> {
        sqlx::query_as::<_, JobCandidate>(
            "SELECT id, created_at FROM jobs \
             WHERE claim_owner IS NULL \
             ORDER BY created_at ASC, id ASC \
             LIMIT $1",
        )
        .bind(limit.clamp(1, MAX_CANDIDATES))
        .fetch_all(pool)
        .await
    }

    /// Claim a job for `owner` if nobody has claimed it yet.
    ///
    /// Returns the claimed row, or `None` when another device got there first
    /// (or the job does not exist). The check and the write are one statement.
    pub async fn try_claim(
        pool: &PgPool,
        id: DbId,
        owner: DbId,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET claim_owner = $2, claimed_at = NOW() \
             WHERE id = $1 AND claim_owner IS NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(owner)
            .fetch_optional(pool)
            .await
    }

    /// Write wins, turn counts and the finish time in one statement.
    ///
    /// Only a claimed job can be finished. Returns `false` if no row matched.
    pub async fn record_result(
        pool: &PgPool,
        id: DbId,
        result: &JobResult,
    ) -> Result<bool, sqlx::Error> {
        let [w1, w2, w3, w4] = result.win_counts;
        let outcome = sqlx::query(
            "UPDATE jobs \
             SET win_1 = $2, win_2 = $3, win_3 = $4, win_4 = $5, \
                 turn_counts = $6, finished_at = $7 \
             WHERE id = $1 AND claim_owner IS NOT NULL",
        )
        .bind(id)
        .bind(w1)
        .bind(w2)
        .bind(w3)
        .bind(w4)
        .bind(&result.turn_counts)
        .bind(result.finished_at)
        .execute(pool)
        .await?;
        Ok(outcome.rows_affected() == 1)
    }

    /// Unfinished jobs claimed by `owner` before `cutoff`, oldest claim first.
    pub async fn list_stale_claims(
        pool: &PgPool,
        owner: DbId,
        cutoff: Timestamp,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE claim_owner = $1 AND finished_at IS NULL AND claimed_at < $2 \
             ORDER BY claimed_at ASC"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(owner)
            .bind(cutoff)
            .fetch_all(pool)
            .await
    }
}
