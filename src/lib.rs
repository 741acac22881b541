pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod remote;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use daemon::{DaemonHandle, DaemonRegistry};
pub use error::{DaemonError, Result};
