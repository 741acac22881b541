pub mod local;

pub use local::*;

use crate::daemon::CommandTemplate;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// A host commands can be executed on.
///
/// Implementations own their connection and synchronise it themselves;
/// daemon handles share one `Arc<dyn Remote>` per host.
#[async_trait]
pub trait Remote: Send + Sync {
    /// Human readable host name, used in logs.
    fn name(&self) -> &str;

    /// Launch `command` without waiting for it and return the running
    /// process.
    async fn run(&self, command: &CommandTemplate) -> Result<Box<dyn RemoteProcess>>;
}

/// A command launched through a [`Remote`].
///
/// The input stream is the control channel: closing it asks the daemon to
/// shut down, bytes written to it are in-band control messages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteProcess: Send {
    /// Close the input stream. Closing an already closed stream is a no-op.
    async fn close_stdin(&mut self) -> Result<()>;

    /// Write raw bytes to the input stream.
    async fn write_stdin(&mut self, bytes: &[u8]) -> Result<()>;

    /// Wait for the command to exit, at most `timeout` when given.
    ///
    /// Fails with `CommandFailed` on a nonzero exit status, `CommandCrashed`
    /// on abnormal termination, `ConnectionLost` when the transport breaks
    /// and `Timeout` when `timeout` elapses first.
    async fn wait(&mut self, timeout: Option<Duration>) -> Result<()>;
}
