//! Execution of one claimed job: resolve, write, run, parse, persist.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use deckbench_core::engine::{EngineCommand, EngineError, MatchRequest};
use deckbench_core::job::{JobResult, MatchJob};
use deckbench_core::parser::{self, ParsedResult};
use deckbench_core::resolver::{self, ResolveError, ResolvedMatch};
use deckbench_core::summary::MatchSummary;

use crate::artifacts::ArtifactWriter;
use crate::store::{DeckStore, JobStore, StoreError};

/// Failures that end a job task without a recorded result.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Deck resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Could not write deck artifact: {0}")]
    Artifact(#[source] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything a job task needs, shared by all tasks of the process.
pub struct JobPipeline {
    jobs: Arc<dyn JobStore>,
    decks: Arc<dyn DeckStore>,
    artifacts: ArtifactWriter,
    engine: EngineCommand,
}

impl JobPipeline {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        decks: Arc<dyn DeckStore>,
        artifacts: ArtifactWriter,
        engine: EngineCommand,
    ) -> Self {
        Self {
            jobs,
            decks,
            artifacts,
            engine,
        }
    }

    /// Task entry point. Logs the outcome; never returns an error.
    pub async fn run(&self, job: MatchJob) {
        let job_id = job.id;
        tracing::info!(
            job_id = %job_id,
            format = %job.format,
            game_count = job.game_count,
            "Job started",
        );

        match self.execute(&job).await {
            Ok(result) => tracing::info!(
                job_id = %job_id,
                win_counts = ?result.win_counts,
                games = result.turn_counts.len(),
                "Job finished",
            ),
            Err(e) => tracing::error!(
                job_id = %job_id,
                error = %e,
                "Job failed; left claimed without a result",
            ),
        }
    }

    /// Run the job to completion and persist its result.
    ///
    /// Deck files are written per job and removed once the engine exits.
    /// Engine failures are not errors: they are recorded as an all-zero
    /// result. Resolution, artifact and store failures return an error and
    /// nothing is persisted.
    pub async fn execute(&self, job: &MatchJob) -> Result<JobResult, PipelineError> {
        let resolved = self.resolve(job).await?;
        let deck_paths = self
            .artifacts
            .write_match(job.id, &resolved)
            .await
            .map_err(PipelineError::Artifact)?;

        let request = MatchRequest {
            deck_paths,
            game_count: job.game_count,
        };
        let parsed = self.play(job, &request, &resolved).await;
        self.artifacts.remove_all(&request.deck_paths).await;

        let summary = MatchSummary::from_result(&parsed);
        tracing::info!(
            job_id = %job.id,
            decided_games = summary.decided_games,
            win_rates = ?summary.win_rates,
            avg_turns = summary.avg_turns,
            median_turns = summary.median_turns,
            mode_turns = ?summary.mode_turns,
            anomalies = parsed.anomalies,
            "Match summary",
        );

        let result = JobResult {
            win_counts: resolved.credit.apply(&parsed.win_counts),
            turn_counts: parsed.turn_counts,
            finished_at: Utc::now(),
        };
        self.jobs.record_result(job.id, &result).await?;
        Ok(result)
    }

    /// Look up every referenced deck version and build the engine decks.
    async fn resolve(&self, job: &MatchJob) -> Result<ResolvedMatch, PipelineError> {
        let plan = resolver::plan(job.format, &job.deck_refs)?;

        let mut found = HashMap::new();
        for id in plan.version_ids() {
            if found.contains_key(&id) {
                continue;
            }
            if let Some(deck) = self.decks.find_deck(id).await? {
                found.insert(id, deck);
            }
        }

        let resolved = plan.resolve(|id| found.get(&id).cloned())?;
        tracing::debug!(
            job_id = %job.id,
            decks = ?resolved.deck_names(),
            effective_format = %resolved.effective_format,
            "Decks resolved",
        );
        Ok(resolved)
    }

    /// Run the engine and parse whatever it printed.
    async fn play(
        &self,
        job: &MatchJob,
        request: &MatchRequest,
        resolved: &ResolvedMatch,
    ) -> ParsedResult {
        match self.engine.run_match(request).await {
            Ok(output) => {
                if !output.success() {
                    tracing::warn!(
                        job_id = %job.id,
                        exit_code = output.exit_code,
                        stderr = %output.stderr.trim(),
                        "Engine exited with an error; parsing partial output",
                    );
                }
                parser::parse(&output.stdout, &resolved.deck_names())
            }
            Err(e @ EngineError::Timeout { .. }) => {
                tracing::warn!(job_id = %job.id, error = %e, "Engine timed out; recording zero result");
                ParsedResult::empty()
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Engine failed; recording zero result");
                ParsedResult::empty()
            }
        }
    }
}
