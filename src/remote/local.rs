use crate::daemon::{CommandTemplate, DaemonLogger};
use crate::error::{DaemonError, Result};
use crate::remote::{Remote, RemoteProcess};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tracing::{Instrument, debug, warn};

/// Runs daemons as child processes of the current host.
///
/// Each launched command gets a piped stdin as its control channel and its
/// own process group, so a terminal Ctrl-C reaches the orchestrator only.
#[derive(Debug, Clone)]
pub struct LocalRemote {
    name: String,
    kill_on_drop: bool,
}

impl LocalRemote {
    pub fn new() -> Self {
        Self {
            name: "localhost".to_string(),
            kill_on_drop: false,
        }
    }

    /// Kill the child when its [`LocalProcess`] is dropped, e.g. after a
    /// handle `reset()`.
    pub fn with_kill_on_drop(mut self, kill_on_drop: bool) -> Self {
        self.kill_on_drop = kill_on_drop;
        self
    }

    fn build_command(&self, template: &CommandTemplate) -> Result<Command> {
        let argv = template.argv();
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| DaemonError::SpawnError("Empty command".to_string()))?;

        let mut command = Command::new(program);
        command.args(args);

        if let Some(cwd) = &template.options.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &template.options.env {
            command.env(key, value);
        }

        command.stdin(Stdio::piped());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        command.kill_on_drop(self.kill_on_drop);

        #[cfg(unix)]
        {
            command.process_group(0);
        }

        Ok(command)
    }

    /// Spawn a task re-emitting every line of `stream` as a debug event
    /// tagged with the daemon's logger, inside the caller's span.
    fn spawn_output_capture_task<T>(
        stream: T,
        command_line: String,
        logger: Option<DaemonLogger>,
        stream_name: &'static str,
    ) where
        T: tokio::io::AsyncRead + Send + Unpin + 'static,
    {
        let task = async move {
            use tokio::io::{AsyncBufReadExt, BufReader};

            let mut reader = BufReader::new(stream);
            let mut line = String::new();

            while let Ok(n) = reader.read_line(&mut line).await {
                if n == 0 {
                    break; // EOF
                }

                let trimmed = line.trim_end();
                if !trimmed.is_empty() {
                    debug!(
                        logger = logger.as_ref().map(DaemonLogger::name),
                        command = %command_line,
                        stream = stream_name,
                        "{}",
                        trimmed
                    );
                }
                line.clear();
            }
        };
        tokio::spawn(task.in_current_span());
    }
}

impl Default for LocalRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Remote for LocalRemote {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, template: &CommandTemplate) -> Result<Box<dyn RemoteProcess>> {
        let command_line = template.command_line();
        debug!("Launching on {}: {}", self.name, command_line);

        let mut command = self.build_command(template)?;
        let mut child = command.spawn().map_err(|e| {
            DaemonError::SpawnError(format!("Failed to spawn '{command_line}': {e}"))
        })?;

        debug!("Spawned '{}' with PID {:?}", command_line, child.id());

        let logger = template.options.logger.clone();
        if let Some(stdout) = child.stdout.take() {
            Self::spawn_output_capture_task(stdout, command_line.clone(), logger.clone(), "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            Self::spawn_output_capture_task(stderr, command_line.clone(), logger, "stderr");
        }

        let stdin = child.stdin.take();
        Ok(Box::new(LocalProcess {
            child,
            stdin,
            command_line,
        }))
    }
}

/// A child process launched by [`LocalRemote`].
pub struct LocalProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    command_line: String,
}

#[async_trait]
impl RemoteProcess for LocalProcess {
    async fn close_stdin(&mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            // A daemon that already exited has closed its end; nothing to flush to.
            if let Err(e) = stdin.shutdown().await {
                warn!("Closing stdin of '{}' failed: {}", self.command_line, e);
            }
        }
        Ok(())
    }

    async fn write_stdin(&mut self, bytes: &[u8]) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            DaemonError::ConnectionLost(format!(
                "stdin of '{}' is already closed",
                self.command_line
            ))
        })?;
        let lost = |e: std::io::Error| {
            DaemonError::ConnectionLost(format!(
                "Writing to stdin of '{}' failed: {e}",
                self.command_line
            ))
        };
        stdin.write_all(bytes).await.map_err(lost)?;
        stdin.flush().await.map_err(lost)?;
        Ok(())
    }

    async fn wait(&mut self, timeout: Option<Duration>) -> Result<()> {
        let status = match timeout {
            Some(limit) => tokio::time::timeout(limit, self.child.wait())
                .await
                .map_err(|_| DaemonError::Timeout {
                    command: self.command_line.clone(),
                    timeout: limit,
                })?,
            None => self.child.wait().await,
        }
        .map_err(|e| {
            DaemonError::ConnectionLost(format!("Waiting for '{}' failed: {e}", self.command_line))
        })?;

        match status.code() {
            Some(0) => {
                debug!("'{}' exited cleanly", self.command_line);
                Ok(())
            }
            Some(exit_code) => Err(DaemonError::CommandFailed {
                command: self.command_line.clone(),
                exit_code,
            }),
            None => Err(DaemonError::CommandCrashed {
                command: self.command_line.clone(),
            }),
        }
    }
}
