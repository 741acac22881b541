use crate::daemon::CommandTemplate;
use crate::error::{DaemonError, Result};
use crate::remote::{Remote, RemoteProcess};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

/// Something a [`MockRemote`] or one of its processes was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEvent {
    Launched { process: usize, argv: Vec<String> },
    StdinWritten { process: usize, bytes: Vec<u8> },
    StdinClosed { process: usize },
    Waited { process: usize, timeout: Option<Duration> },
    Exited { process: usize },
}

/// Scripted outcome for the next `wait` on any mock process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitFailure {
    Failed(i32),
    Crashed,
    ConnectionLost,
    Timeout,
}

impl WaitFailure {
    fn into_error(self, command: String, timeout: Option<Duration>) -> DaemonError {
        match self {
            WaitFailure::Failed(exit_code) => DaemonError::CommandFailed { command, exit_code },
            WaitFailure::Crashed => DaemonError::CommandCrashed { command },
            WaitFailure::ConnectionLost => {
                DaemonError::ConnectionLost(format!("mock connection to '{command}' dropped"))
            }
            WaitFailure::Timeout => DaemonError::Timeout {
                command,
                timeout: timeout.unwrap_or_default(),
            },
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    events: Vec<RemoteEvent>,
    launches: Vec<CommandTemplate>,
    wait_failures: VecDeque<WaitFailure>,
    launch_failures: usize,
}

/// In-memory remote recording every launch and control-channel operation
/// in order. Waits succeed unless a failure was scripted.
#[derive(Debug)]
pub struct MockRemote {
    name: String,
    state: Arc<StdMutex<MockState>>,
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Self::named("mock")
    }

    pub fn named(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            state: Arc::new(StdMutex::new(MockState::default())),
        })
    }

    /// Make the next `wait` on any process fail with `failure`.
    pub fn fail_next_wait(&self, failure: WaitFailure) {
        self.state.lock().unwrap().wait_failures.push_back(failure);
    }

    /// Make the next launch fail.
    pub fn fail_next_launch(&self) {
        self.state.lock().unwrap().launch_failures += 1;
    }

    pub fn events(&self) -> Vec<RemoteEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn launches(&self) -> Vec<CommandTemplate> {
        self.state.lock().unwrap().launches.clone()
    }

    pub fn launched_argv(&self) -> Vec<Vec<String>> {
        self.launches().iter().map(CommandTemplate::argv).collect()
    }

    pub fn last_launch(&self) -> Option<CommandTemplate> {
        self.state.lock().unwrap().launches.last().cloned()
    }

    /// Bytes written to the stdin of launch number `process`.
    pub fn stdin_bytes(&self, process: usize) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                RemoteEvent::StdinWritten { process: p, bytes } if p == process => Some(bytes),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

#[async_trait]
impl Remote for MockRemote {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, command: &CommandTemplate) -> Result<Box<dyn RemoteProcess>> {
        let mut state = self.state.lock().unwrap();
        if state.launch_failures > 0 {
            state.launch_failures -= 1;
            return Err(DaemonError::SpawnError(format!(
                "mock launch of '{}' refused",
                command.command_line()
            )));
        }

        let index = state.launches.len();
        state.launches.push(command.clone());
        state.events.push(RemoteEvent::Launched {
            process: index,
            argv: command.argv(),
        });

        Ok(Box::new(MockProcess {
            index,
            command_line: command.command_line(),
            state: self.state.clone(),
        }))
    }
}

struct MockProcess {
    index: usize,
    command_line: String,
    state: Arc<StdMutex<MockState>>,
}

#[async_trait]
impl RemoteProcess for MockProcess {
    async fn close_stdin(&mut self) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .events
            .push(RemoteEvent::StdinClosed {
                process: self.index,
            });
        Ok(())
    }

    async fn write_stdin(&mut self, bytes: &[u8]) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .events
            .push(RemoteEvent::StdinWritten {
                process: self.index,
                bytes: bytes.to_vec(),
            });
        Ok(())
    }

    async fn wait(&mut self, timeout: Option<Duration>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.events.push(RemoteEvent::Waited {
            process: self.index,
            timeout,
        });

        match state.wait_failures.pop_front() {
            Some(failure) => Err(failure.into_error(self.command_line.clone(), timeout)),
            None => {
                state.events.push(RemoteEvent::Exited {
                    process: self.index,
                });
                Ok(())
            }
        }
    }
}
