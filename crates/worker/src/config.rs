//! Worker configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use deckbench_core::engine::EngineCommand;
use deckbench_core::types::DbId;

/// Default seconds between poll cycles.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Default seconds to wait when every slot is busy.
const DEFAULT_BACKOFF_INTERVAL_SECS: u64 = 60;

/// Default per-game timeout ceiling.
const DEFAULT_GAME_TIMEOUT_SECS: u64 = 60;

/// Default age after which an unfinished claim is reported (6 hours).
const DEFAULT_STALE_CLAIM_MINUTES: u64 = 360;

/// Default seconds between stale-claim sweeps.
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 600;

/// Default seconds to wait for running jobs on shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

const DEFAULT_ENGINE_PROGRAM: &str = "java";
const DEFAULT_ENGINE_ARGS: &str = "-jar forge.jar";

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Log output encoding, read from `LOG_FORMAT` (`text` or `json`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };
        match env.optional("LOG_FORMAT") {
            None => Ok(Self::Text),
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "text" => Ok(Self::Text),
                "json" => Ok(Self::Json),
                _ => Err(ConfigError::Invalid {
                    var: "LOG_FORMAT",
                    value,
                    reason: "expected text or json".into(),
                }),
            },
        }
    }
}

/// Worker process configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    /// Identity written to `claim_owner` for jobs this process claims.
    pub device_id: DbId,
    /// Maximum number of jobs running at once.
    pub capacity: usize,
    pub poll_interval: Duration,
    pub backoff_interval: Duration,
    /// Engine install directory; the engine runs with this as its cwd.
    pub engine_dir: PathBuf,
    pub engine_program: String,
    pub engine_args: Vec<String>,
    /// Root for deck artifacts. Engine deck paths are relative to it.
    pub decks_dir: PathBuf,
    pub game_timeout: Duration,
    pub stale_claim_after: chrono::Duration,
    pub sweep_interval: Duration,
    pub shutdown_timeout: Duration,
}

impl WorkerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                 | Default             |
    /// |-------------------------|---------------------|
    /// | `DATABASE_URL`          | required            |
    /// | `DEVICE_ID`             | required (UUID)     |
    /// | `WORKER_CAPACITY`       | host parallelism    |
    /// | `POLL_INTERVAL_SECS`    | `30`                |
    /// | `BACKOFF_INTERVAL_SECS` | `60`                |
    /// | `ENGINE_DIR`            | required            |
    /// | `ENGINE_PROGRAM`        | `java`              |
    /// | `ENGINE_ARGS`           | `-jar forge.jar`    |
    /// | `DECKS_DIR`             | `$ENGINE_DIR`       |
    /// | `GAME_TIMEOUT_SECS`     | `60`                |
    /// | `STALE_CLAIM_MINUTES`   | `360`               |
    /// | `SWEEP_INTERVAL_SECS`   | `600`               |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let database_url = env.required("DATABASE_URL")?;
        let device_id = env.parse_required::<DbId>("DEVICE_ID")?;
        let capacity = env.positive("WORKER_CAPACITY", host_parallelism() as u64)? as usize;
        let poll_interval = env.positive("POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        let backoff_interval =
            env.positive("BACKOFF_INTERVAL_SECS", DEFAULT_BACKOFF_INTERVAL_SECS)?;

        let engine_dir = PathBuf::from(env.required("ENGINE_DIR")?);
        let engine_program = env
            .optional("ENGINE_PROGRAM")
            .unwrap_or_else(|| DEFAULT_ENGINE_PROGRAM.into());
        let engine_args = env
            .optional("ENGINE_ARGS")
            .unwrap_or_else(|| DEFAULT_ENGINE_ARGS.into())
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let decks_dir = env
            .optional("DECKS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| engine_dir.clone());

        let game_timeout = env.positive("GAME_TIMEOUT_SECS", DEFAULT_GAME_TIMEOUT_SECS)?;
        let stale_minutes =
            env.positive("STALE_CLAIM_MINUTES", DEFAULT_STALE_CLAIM_MINUTES)?;
        let stale_claim_after = i64::try_from(stale_minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
            .ok_or_else(|| ConfigError::Invalid {
                var: "STALE_CLAIM_MINUTES",
                value: stale_minutes.to_string(),
                reason: "out of range".into(),
            })?;
        let sweep_interval = env.positive("SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?;
        let shutdown_timeout =
            env.positive("SHUTDOWN_TIMEOUT_SECS", DEFAULT_SHUTDOWN_TIMEOUT_SECS)?;

        Ok(Self {
            database_url,
            device_id,
            capacity,
            poll_interval: Duration::from_secs(poll_interval),
            backoff_interval: Duration::from_secs(backoff_interval),
            engine_dir,
            engine_program,
            engine_args,
            decks_dir,
            game_timeout: Duration::from_secs(game_timeout),
            stale_claim_after,
            sweep_interval: Duration::from_secs(sweep_interval),
            shutdown_timeout: Duration::from_secs(shutdown_timeout),
        })
    }

    /// Engine launch settings derived from this configuration.
    pub fn engine_command(&self) -> EngineCommand {
        EngineCommand {
            program: self.engine_program.clone(),
            base_args: self.engine_args.clone(),
            working_dir: self.engine_dir.clone(),
            per_game_timeout: self.game_timeout,
        }
    }
}

fn host_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Thin wrapper giving typed access to a key lookup.
struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-empty trimmed value, if set.
    fn optional(&self, var: &'static str) -> Option<String> {
        (self.lookup)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, var: &'static str) -> Result<String, ConfigError> {
        self.optional(var).ok_or(ConfigError::Missing(var))
    }

    fn parse_required<T>(&self, var: &'static str) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        let value = self.required(var)?;
        value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        })
    }

    /// Positive integer with a default when unset.
    fn positive(&self, var: &'static str, default: u64) -> Result<u64, ConfigError> {
        let Some(value) = self.optional(var) else {
            return Ok(default);
        };
        match value.parse::<u64>() {
            Ok(0) => Err(ConfigError::Invalid {
                var,
                value,
                reason: "must be at least 1".into(),
            }),
            Ok(n) => Ok(n),
            Err(e) => Err(ConfigError::Invalid {
                var,
                reason: e.to_string(),
                value,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
