//! External simulation engine invocation.
//!
//! The engine is launched as
//! `<program> <base args> sim -d <deck paths...> -n <games> -q` with its
//! install directory as the working directory. Deck paths are relative to the
//! engine's deck root. Only the child's working directory is set; the worker
//! process never changes its own.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Simulation mode flag followed by the deck list flag.
const MODE_ARGS: [&str; 2] = ["sim", "-d"];

/// Flag preceding the requested game count.
const GAME_COUNT_FLAG: &str = "-n";

/// Quiet-output flag: only per-game outcomes are printed.
const QUIET_FLAG: &str = "-q";

/// Maximum stdout or stderr size captured per stream (10 MiB).
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Errors raised while running the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine could not be launched: {0}")]
    Launch(#[source] std::io::Error),

    #[error("Engine timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("I/O error while waiting for engine: {0}")]
    Io(#[source] std::io::Error),

    #[error("Engine matches need 2 or 4 decks, got {0}")]
    InvalidDeckCount(usize),

    #[error("Engine matches need at least one game")]
    NoGames,
}

/// How to launch the engine on this host.
#[derive(Debug, Clone)]
pub struct EngineCommand {
    /// Executable, e.g. `java`.
    pub program: String,
    /// Arguments placed before the mode flag, e.g. `["-jar", "forge.jar"]`.
    pub base_args: Vec<String>,
    /// Engine install directory, used as the child's working directory.
    pub working_dir: PathBuf,
    /// Timeout allowance per requested game.
    pub per_game_timeout: Duration,
}

/// One engine run.
#[derive(Debug, Clone)]
pub struct MatchRequest {
    /// Deck file paths relative to the engine deck root, in slot order.
    pub deck_paths: Vec<PathBuf>,
    pub game_count: u32,
}

/// Captured result of a finished engine process.
#[derive(Debug, Clone, Serialize)]
pub struct EngineOutput {
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl EngineOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

impl EngineCommand {
    /// Hard deadline for a run of `game_count` games.
    pub fn timeout_for(&self, game_count: u32) -> Duration {
        self.per_game_timeout.saturating_mul(game_count.max(1))
    }

    /// Full argument list for `request`, excluding the program itself.
    pub fn args_for(&self, request: &MatchRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.base_args.iter().map(OsString::from).collect();
        args.extend(MODE_ARGS.iter().map(OsString::from));
        args.extend(request.deck_paths.iter().map(|p| p.as_os_str().to_owned()));
        args.push(GAME_COUNT_FLAG.into());
        args.push(request.game_count.to_string().into());
        args.push(QUIET_FLAG.into());
        args
    }

    /// Run the engine and wait for it, killing it once the deadline passes.
    ///
    /// A non-zero exit is returned as a normal [`EngineOutput`]; the caller
    /// decides what to do with whatever stdout was produced.
    pub async fn run_match(&self, request: &MatchRequest) -> Result<EngineOutput, EngineError> {
        let decks = request.deck_paths.len();
        if decks != 2 && decks != 4 {
            return Err(EngineError::InvalidDeckCount(decks));
        }
        if request.game_count == 0 {
            return Err(EngineError::NoGames);
        }

        let timeout = self.timeout_for(request.game_count);
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args_for(request))
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::info!(
            program = %self.program,
            working_dir = %self.working_dir.display(),
            decks,
            game_count = request.game_count,
            timeout_secs = timeout.as_secs(),
            "Launching engine",
        );

        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + timeout;
        let mut child = cmd.spawn().map_err(EngineError::Launch)?;

        let mut stdout_task = tokio::spawn(read_stream(child.stdout.take()));
        let mut stderr_task = tokio::spawn(read_stream(child.stderr.take()));

        let status = match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                stdout_task.abort();
                stderr_task.abort();
                return Err(EngineError::Io(e));
            }
            Err(_elapsed) => {
                // Dropping `child` kills it (kill_on_drop).
                drop(child);
                stdout_task.abort();
                stderr_task.abort();
                return Err(EngineError::Timeout {
                    elapsed_ms: start.elapsed().as_millis() as u64,
                });
            }
        };

        // A background grandchild can hold the pipes open after the engine
        // itself exits, so the readers share the same deadline.
        let streams = async {
            let stdout = (&mut stdout_task).await.unwrap_or_default();
            let stderr = (&mut stderr_task).await.unwrap_or_default();
            (stdout, stderr)
        };
        let Ok((stdout_bytes, stderr_bytes)) = tokio::time::timeout_at(deadline, streams).await
        else {
            stdout_task.abort();
            stderr_task.abort();
            tracing::warn!(
                exit_code = status.code().unwrap_or(-1),
                "Engine exited but its output streams stayed open past the deadline",
            );
            return Err(EngineError::Timeout {
                elapsed_ms: start.elapsed().as_millis() as u64,
            });
        };

        let output = EngineOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
            stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        tracing::info!(
            exit_code = output.exit_code,
            duration_ms = output.duration_ms,
            stdout_bytes = output.stdout.len(),
            "Engine finished",
        );
        Ok(output)
    }
}

/// Read an entire output stream into a byte buffer, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(h) = handle {
        let _ = h.take(MAX_OUTPUT_BYTES as u64).read_to_end(&mut buf).await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;

    use super::*;

    /// An engine that is really a bash script living in a temp directory.
    fn fake_engine(body: &str, per_game_timeout: Duration) -> (tempfile::TempDir, EngineCommand) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let script = dir.path().join("engine.sh");
        let mut f = std::fs::File::create(&script).expect("create script");
        writeln!(f, "#!/bin/bash").expect("write shebang");
        write!(f, "{body}").expect("write body");

        let cmd = EngineCommand {
            program: "bash".to_string(),
            base_args: vec![script.to_str().expect("path").to_string()],
            working_dir: dir.path().to_path_buf(),
            per_game_timeout,
        };
        (dir, cmd)
    }

    fn request(decks: &[&str], game_count: u32) -> MatchRequest {
        MatchRequest {
            deck_paths: decks.iter().map(PathBuf::from).collect(),
            game_count,
        }
    }

    // -- args_for -----------------------------------------------------------

    #[test]
    fn builds_engine_argument_list() {
        let cmd = EngineCommand {
            program: "java".to_string(),
            base_args: vec!["-jar".to_string(), "forge.jar".to_string()],
            working_dir: PathBuf::from("/opt/forge"),
            per_game_timeout: Duration::from_secs(60),
        };
        let args = cmd.args_for(&request(&["constructed/X.dck", "constructed/Y.dck"], 3));
        let args: Vec<_> = args.iter().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(
            args,
            [
                "-jar",
                "forge.jar",
                "sim",
                "-d",
                "constructed/X.dck",
                "constructed/Y.dck",
                "-n",
                "3",
                "-q"
            ]
        );
    }

    #[test]
    fn timeout_scales_with_game_count() {
        let (_dir, cmd) = fake_engine("", Duration::from_secs(90));
        assert_eq!(cmd.timeout_for(3), Duration::from_secs(270));
        assert_eq!(cmd.timeout_for(0), Duration::from_secs(90));
    }

    // -- run_match ----------------------------------------------------------

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let (_dir, cmd) = fake_engine(
            "echo \"decks: $3 $4 games: $6\"\necho oops >&2\n",
            Duration::from_secs(5),
        );
        let output = cmd.run_match(&request(&["a.dck", "b.dck"], 2)).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "decks: a.dck b.dck games: 2");
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn runs_in_engine_directory() {
        let (dir, cmd) = fake_engine("pwd\n", Duration::from_secs(5));
        let cwd_before = std::env::current_dir().unwrap();
        let output = cmd.run_match(&request(&["a.dck", "b.dck"], 1)).await.unwrap();

        let reported = std::fs::canonicalize(output.stdout.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
        assert_eq!(std::env::current_dir().unwrap(), cwd_before);
    }

    #[tokio::test]
    async fn nonzero_exit_keeps_partial_stdout() {
        let (_dir, cmd) = fake_engine(
            "echo 'Game 1: Alpha won!'\nexit 3\n",
            Duration::from_secs(5),
        );
        let output = cmd.run_match(&request(&["a.dck", "b.dck"], 1)).await.unwrap();
        assert!(!output.success());
        assert_eq!(output.exit_code, 3);
        assert!(output.stdout.contains("Alpha won!"));
    }

    #[tokio::test]
    async fn kills_engine_after_deadline() {
        let (_dir, cmd) = fake_engine("sleep 60\n", Duration::from_millis(200));
        let result = cmd.run_match(&request(&["a.dck", "b.dck"], 1)).await;
        assert_matches!(result, Err(EngineError::Timeout { .. }));
    }

    #[tokio::test]
    async fn lingering_child_cannot_outlast_deadline() {
        // The engine exits at once but a background child keeps stdout open.
        let (_dir, cmd) = fake_engine(
            "sleep 6 &\necho 'Alpha won!'\nexit 0\n",
            Duration::from_millis(500),
        );
        let started = std::time::Instant::now();
        let result = cmd.run_match(&request(&["a.dck", "b.dck"], 1)).await;
        assert_matches!(result, Err(EngineError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn missing_program_is_a_launch_failure() {
        let cmd = EngineCommand {
            program: "/nonexistent/engine-binary".to_string(),
            base_args: vec![],
            working_dir: std::env::temp_dir(),
            per_game_timeout: Duration::from_secs(1),
        };
        let result = cmd.run_match(&request(&["a.dck", "b.dck"], 1)).await;
        assert_matches!(result, Err(EngineError::Launch(_)));
    }

    #[tokio::test]
    async fn rejects_three_deck_match() {
        let (_dir, cmd) = fake_engine("", Duration::from_secs(1));
        let result = cmd.run_match(&request(&["a", "b", "c"], 1)).await;
        assert_matches!(result, Err(EngineError::InvalidDeckCount(3)));
    }
}
