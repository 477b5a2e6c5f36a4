//! Build worker supervision
//!
//! Each build match owns at most one long-lived worker process. The worker
//! speaks newline-delimited JSON on its stdin/stdout: its first message must
//! be `{"type":"ready"}`, and every build request is answered by exactly one
//! `{"type":"buildResult","result":...}`. Any other message type or ordering
//! is a protocol violation; the worker is discarded and transparently
//! respawned on the next build.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use super::artifact::FileRef;
use super::catalog::BuilderDescriptor;
use super::registry::MatchState;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// The worker did not complete its startup handshake.
    #[error("builder worker \"{builder}\" did not report ready: {reason}")]
    Startup { builder: String, reason: String },

    /// The worker violated the message contract. The handle is discarded.
    #[error("builder worker protocol violation: {0}")]
    Protocol(String),

    #[error("failed to talk to builder worker: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode build request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Request metadata forwarded to the builder.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildMeta {
    pub is_dev: bool,
    pub request_path: Option<String>,
    pub files_changed: Vec<String>,
    pub files_removed: Vec<String>,
}

/// Parameters of one build request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildParams {
    pub files: BTreeMap<String, FileRef>,
    pub entrypoint: String,
    pub work_path: PathBuf,
    pub config: Map<String, Value>,
    pub meta: BuildMeta,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum SupervisorMessage {
    #[serde(rename = "build")]
    Build {
        #[serde(rename = "builderName")]
        builder_name: String,
        #[serde(rename = "buildParams")]
        build_params: BuildParams,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum WorkerMessage {
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "buildResult")]
    BuildResult { result: Value },
}

/// Owned handle to a live worker process.
pub struct WorkerHandle {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    builder: String,
}

impl WorkerHandle {
    /// Spawns the builder executable and waits for its readiness signal.
    ///
    /// The environment is passed explicitly here; workers never read
    /// process-wide mutable configuration.
    pub async fn spawn(
        descriptor: &BuilderDescriptor,
        work_path: &Path,
        env: &HashMap<String, String>,
        ready_timeout: Duration,
    ) -> Result<Self, WorkerError> {
        let mut child = Command::new(&descriptor.program)
            .args(&descriptor.args)
            .current_dir(work_path)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().expect("stdin was piped");
        let stdout = child.stdout.take().expect("stdout was piped");
        let mut handle = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            builder: descriptor.name.clone(),
        };

        let startup = |reason: String| WorkerError::Startup {
            builder: descriptor.name.clone(),
            reason,
        };

        let first = tokio::time::timeout(ready_timeout, handle.stdout.next_line())
            .await
            .map_err(|_| startup("timed out waiting for the ready message".to_string()))?
            .map_err(|err| startup(format!("failed to read from worker: {}", err)))?
            .ok_or_else(|| startup("worker exited before signaling ready".to_string()))?;

        match serde_json::from_str::<WorkerMessage>(&first) {
            Ok(WorkerMessage::Ready) => {
                debug!(builder = %handle.builder, "Worker process ready");
                Ok(handle)
            }
            Ok(WorkerMessage::BuildResult { .. }) => {
                Err(startup("first message was a build result".to_string()))
            }
            Err(err) => Err(startup(format!("unparseable first message: {}", err))),
        }
    }

    /// True while the underlying process has not exited.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Sends one build request and awaits exactly one structured response.
    /// The caller must serialize requests; only one may be outstanding.
    pub async fn request_build(
        &mut self,
        builder_name: &str,
        params: BuildParams,
    ) -> Result<Value, WorkerError> {
        let message = SupervisorMessage::Build {
            builder_name: builder_name.to_string(),
            build_params: params,
        };
        let mut line = serde_json::to_string(&message)?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        let response = self
            .stdout
            .next_line()
            .await?
            .ok_or_else(|| WorkerError::Protocol("worker exited without responding".to_string()))?;

        match serde_json::from_str::<WorkerMessage>(&response) {
            Ok(WorkerMessage::BuildResult { result }) => Ok(result),
            Ok(WorkerMessage::Ready) => Err(WorkerError::Protocol(
                "got a second ready message instead of a build result".to_string(),
            )),
            Err(err) => Err(WorkerError::Protocol(format!(
                "unparseable worker response: {}",
                err
            ))),
        }
    }

    /// Terminates the worker process.
    pub async fn shutdown(mut self) {
        if let Err(err) = self.child.start_kill() {
            if err.kind() != std::io::ErrorKind::InvalidInput {
                warn!(builder = %self.builder, error = %err, "Failed to kill worker process");
            }
        }
        let _ = self.child.wait().await;
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("builder", &self.builder)
            .finish_non_exhaustive()
    }
}

/// Spawns, reuses and discards worker processes for build matches.
///
/// Callers hold the match's state lock across `build`, which serializes
/// requests per worker; builds for different matches run concurrently.
pub struct WorkerSupervisor {
    build_env: HashMap<String, String>,
    ready_timeout: Duration,
}

impl WorkerSupervisor {
    pub fn new(build_env: HashMap<String, String>, ready_timeout: Duration) -> Self {
        Self {
            build_env,
            ready_timeout,
        }
    }

    /// Returns the match's live worker, spawning one when the match has
    /// none or its previous worker has exited.
    pub(crate) async fn ensure_worker<'a>(
        &self,
        descriptor: &BuilderDescriptor,
        work_path: &Path,
        state: &'a mut MatchState,
    ) -> Result<&'a mut WorkerHandle, WorkerError> {
        let respawn = match state.worker.as_mut() {
            Some(worker) => !worker.is_running(),
            None => true,
        };
        if respawn {
            if let Some(dead) = state.worker.take() {
                debug!(builder = %descriptor.name, "Replacing exited worker");
                dead.shutdown().await;
            }
            let worker = WorkerHandle::spawn(
                descriptor,
                work_path,
                &self.build_env,
                self.ready_timeout,
            )
            .await?;
            state.worker = Some(worker);
        }
        Ok(state.worker.as_mut().expect("worker just ensured"))
    }

    /// Runs one build request on the match's worker. A protocol or IO
    /// failure discards the worker so the next call respawns it.
    pub(crate) async fn build(
        &self,
        descriptor: &BuilderDescriptor,
        work_path: &Path,
        state: &mut MatchState,
        params: BuildParams,
    ) -> Result<Value, WorkerError> {
        let worker = self.ensure_worker(descriptor, work_path, state).await?;
        match worker.request_build(&descriptor.name, params).await {
            Ok(result) => Ok(result),
            Err(err) => {
                warn!(builder = %descriptor.name, error = %err, "Discarding failed worker");
                if let Some(worker) = state.worker.take() {
                    worker.shutdown().await;
                }
                Err(err)
            }
        }
    }
}
