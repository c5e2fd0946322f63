//! Host process operations implementation
//!
//! Wraps `tokio::process::Command` with event emission, environment
//! overrides and an optional timeout that kills the child.

use async_trait::async_trait;
use kiln_errors::{Error, PlatformError};
use kiln_events::{AppEvent, PlatformEvent};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

use crate::core::PlatformContext;
use crate::process::{CommandOutput, PlatformCommand, ProcessOperations};

/// Process operations backed by the running host
#[derive(Debug, Default, Clone, Copy)]
pub struct HostProcessOperations;

impl HostProcessOperations {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl ProcessOperations for HostProcessOperations {
    async fn execute_command(
        &self,
        ctx: &PlatformContext,
        cmd: PlatformCommand,
    ) -> Result<CommandOutput, Error> {
        let start = Instant::now();
        ctx.emit_event(AppEvent::Platform(PlatformEvent::ProcessExecutionStarted {
            command: cmd.program().to_string(),
            args: cmd.get_args().to_vec(),
            working_dir: cmd.get_current_dir().map(|d| d.display().to_string()),
        }));

        let result: Result<CommandOutput, PlatformError> = async {
            let mut command = Command::new(cmd.program());
            command
                .args(cmd.get_args())
                .stdin(Stdio::null())
                .kill_on_drop(true);

            if let Some(dir) = cmd.get_current_dir() {
                command.current_dir(dir);
            }

            for (key, value) in cmd.get_env_vars() {
                command.env(key, value);
            }

            let running = command.output();
            let output = match cmd.get_timeout() {
                Some(limit) => tokio::time::timeout(limit, running).await.map_err(|_| {
                    PlatformError::ProcessTimedOut {
                        command: cmd.display(),
                        seconds: limit.as_secs(),
                    }
                })?,
                None => running.await,
            }
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => PlatformError::CommandNotFound {
                    command: cmd.program().to_string(),
                },
                _ => PlatformError::ProcessExecutionFailed {
                    command: cmd.program().to_string(),
                    message: e.to_string(),
                },
            })?;

            Ok(CommandOutput {
                exit_code: output.status.code(),
                stdout: output.stdout,
                stderr: output.stderr,
            })
        }
        .await;

        let duration_ms = duration_to_millis(start.elapsed());
        match &result {
            Ok(output) => ctx.emit_event(AppEvent::Platform(
                PlatformEvent::ProcessExecutionCompleted {
                    command: cmd.program().to_string(),
                    exit_code: output.exit_code,
                    duration_ms,
                    stdout_bytes: output.stdout.len(),
                    stderr_bytes: output.stderr.len(),
                },
            )),
            Err(e) => ctx.emit_event(AppEvent::Platform(PlatformEvent::ProcessExecutionFailed {
                command: cmd.program().to_string(),
                error_message: e.to_string(),
                duration_ms,
            })),
        }

        result.map_err(Error::from)
    }

    async fn which(&self, program: &str) -> Result<PathBuf, Error> {
        which::which(program).map_err(|_| {
            PlatformError::CommandNotFound {
                command: program.to_string(),
            }
            .into()
        })
    }
}
