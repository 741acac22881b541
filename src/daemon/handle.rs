use crate::daemon::{CommandTemplate, DaemonLogger, OptionsUpdate};
use crate::error::{DaemonError, Result};
use crate::remote::{Remote, RemoteProcess};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, Span, debug, error, info, info_span};

/// How long `stop` waits for a daemon to exit unless told otherwise.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(300);

/// Log target used by handles whose template names no `logger`.
pub const DEFAULT_LOGGER_NAME: &str = "daemonctl::daemon";

/// Settings every [`DaemonHandle`] is constructed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonSettings {
    pub stop_timeout: Duration,
    pub default_logger: DaemonLogger,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            default_logger: DaemonLogger::new(DEFAULT_LOGGER_NAME),
        }
    }
}

/// Whether a handle currently holds a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Stopped,
    Running,
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaemonState::Stopped => write!(f, "stopped"),
            DaemonState::Running => write!(f, "running"),
        }
    }
}

/// One daemon instance: its launch template, the host it runs on and the
/// process currently running from that template, if any.
///
/// Handles are single-writer. Every mutating operation takes `&mut self`
/// and nothing is locked internally.
pub struct DaemonHandle {
    role: String,
    id: String,
    remote: Arc<dyn Remote>,
    template: CommandTemplate,
    process: Option<Box<dyn RemoteProcess>>,
    started_at: Option<DateTime<Utc>>,
    stop_timeout: Duration,
    logger: DaemonLogger,
    span: Span,
}

impl DaemonHandle {
    /// Create a stopped handle. Nothing is launched until [`Self::restart`].
    pub fn new(
        remote: Arc<dyn Remote>,
        role: impl Into<String>,
        id: impl ToString,
        template: CommandTemplate,
        settings: &DaemonSettings,
    ) -> Self {
        let role = role.into();
        let id = id.to_string();
        let logger = template
            .options
            .logger
            .clone()
            .unwrap_or_else(|| settings.default_logger.clone());
        let span = info_span!(
            "daemon",
            logger = %logger,
            role = %role,
            id = %id,
            host = %remote.name()
        );

        Self {
            role,
            id,
            remote,
            template,
            process: None,
            started_at: None,
            stop_timeout: settings.stop_timeout,
            logger,
            span,
        }
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The logger this handle reports under: the template's `logger` option
    /// at construction time, or the settings' default.
    pub fn logger(&self) -> &DaemonLogger {
        &self.logger
    }

    pub fn remote_name(&self) -> &str {
        self.remote.name()
    }

    /// The stored launch template, including every extra `restart` merged in.
    pub fn template(&self) -> &CommandTemplate {
        &self.template
    }

    /// When the current process was launched.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn running(&self) -> bool {
        self.process.is_some()
    }

    pub fn state(&self) -> DaemonState {
        if self.running() {
            DaemonState::Running
        } else {
            DaemonState::Stopped
        }
    }

    /// Stop with the default timeout.
    pub async fn stop_default(&mut self) -> Result<()> {
        self.stop(self.stop_timeout).await
    }

    /// Ask the daemon to shut down by closing its input stream, then wait up
    /// to `timeout` for it to exit.
    ///
    /// Stopping a handle that is not running only logs an error. When the
    /// wait fails the process reference is kept and the failure returned;
    /// call [`Self::reset`] once the process is known to be gone.
    pub async fn stop(&mut self, timeout: Duration) -> Result<()> {
        if !self.running() {
            error!(parent: &self.span, "tried to stop a non-running daemon");
            return Ok(());
        }
        debug!(parent: &self.span, "closing stdin and waiting for process to exit");

        if let Some(process) = self.process.as_mut() {
            process.close_stdin().await?;
            process.wait(Some(timeout)).await?;
        }

        self.process = None;
        self.started_at = None;
        info!(parent: &self.span, "Stopped");
        Ok(())
    }

    /// Restart, permanently merging the extras into the stored template.
    ///
    /// `extra_args` are appended to the positional tokens and
    /// `extra_options` is merged into the named options. Both stick: a later
    /// plain `restart` launches with them again. [`Self::restart_with_args`]
    /// behaves differently.
    pub async fn restart(
        &mut self,
        extra_args: Vec<String>,
        extra_options: OptionsUpdate,
    ) -> Result<()> {
        info!(parent: &self.span, "Restarting daemon");
        self.stop_if_running().await?;

        self.template.args.extend(extra_args);
        self.template.options.update(extra_options);

        let template = self.template.clone();
        self.start(&template).await
    }

    /// Restart with `extra_args` appended to the `args` option of a copy of
    /// the template. The stored template is untouched, so the extras are
    /// gone after the next restart.
    pub async fn restart_with_args(&mut self, extra_args: Vec<String>) -> Result<()> {
        info!(parent: &self.span, "Restarting daemon");
        self.stop_if_running().await?;

        let mut template = self.template.clone();
        template.options.args.extend(extra_args);
        self.start(&template).await
    }

    /// Send `sig` to the daemon as a single signed byte on its input stream.
    ///
    /// This is an in-band control message the daemon reads itself, not an
    /// operating system signal.
    pub async fn signal(&mut self, sig: i8) -> Result<()> {
        let process = self.process.as_mut().ok_or_else(|| DaemonError::NotRunning {
            role: self.role.clone(),
            id: self.id.clone(),
        })?;

        process.write_stdin(&sig.to_be_bytes()).await?;
        info!(parent: &self.span, "Sent signal {}", sig);
        Ok(())
    }

    /// Forget the current process without waiting or signalling it.
    pub fn reset(&mut self) {
        if self.process.take().is_some() {
            debug!(parent: &self.span, "process reference reset");
        }
        self.started_at = None;
    }

    /// Wait, without a timeout, for the daemon to exit on its own.
    ///
    /// The process reference is cleared whether or not the wait succeeds.
    pub async fn wait_for_exit(&mut self) -> Result<()> {
        let Some(mut process) = self.process.take() else {
            return Ok(());
        };
        self.started_at = None;

        process.wait(None).await
    }

    async fn stop_if_running(&mut self) -> Result<()> {
        if self.running() {
            info!(parent: &self.span, "Stopping old one...");
            self.stop_default().await?;
        }
        Ok(())
    }

    async fn start(&mut self, template: &CommandTemplate) -> Result<()> {
        debug!(parent: &self.span, "launching: {}", template.command_line());
        let process = self
            .remote
            .run(template)
            .instrument(self.span.clone())
            .await?;

        self.process = Some(process);
        self.started_at = Some(Utc::now());
        info!(parent: &self.span, "Started");
        Ok(())
    }
}

impl fmt::Debug for DaemonHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DaemonHandle")
            .field("role", &self.role)
            .field("id", &self.id)
            .field("remote", &self.remote.name())
            .field("template", &self.template)
            .field("state", &self.state())
            .finish()
    }
}
