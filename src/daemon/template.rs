use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Name of the log target a daemon handle reports under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DaemonLogger(String);

impl DaemonLogger {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DaemonLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Named launch options handed to [`crate::remote::Remote::run`].
///
/// `args` is the command the remote executes. The positional tokens of the
/// owning [`CommandTemplate`] are appended after it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOptions {
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub logger: Option<DaemonLogger>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl CommandOptions {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_logger(mut self, logger: DaemonLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Apply `update` in place. Every option the update sets replaces the
    /// stored one; environment entries are merged key by key.
    pub fn update(&mut self, update: OptionsUpdate) {
        if let Some(args) = update.args {
            self.args = args;
        }
        if let Some(logger) = update.logger {
            self.logger = Some(logger);
        }
        if let Some(cwd) = update.cwd {
            self.cwd = Some(cwd);
        }
        self.env.extend(update.env);
    }
}

/// Options to merge into a stored [`CommandOptions`]. Unset fields leave
/// the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionsUpdate {
    pub args: Option<Vec<String>>,
    pub logger: Option<DaemonLogger>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl OptionsUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    pub fn logger(mut self, logger: DaemonLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_none() && self.logger.is_none() && self.cwd.is_none() && self.env.is_empty()
    }
}

/// Everything needed to (re)launch a daemon: positional tokens plus named
/// options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub options: CommandOptions,
}

impl CommandTemplate {
    pub fn new(options: CommandOptions) -> Self {
        Self {
            args: Vec::new(),
            options,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Full argument vector: the `args` option followed by the positional
    /// tokens.
    pub fn argv(&self) -> Vec<String> {
        self.options
            .args
            .iter()
            .chain(self.args.iter())
            .cloned()
            .collect()
    }

    /// Shell-quoted rendering of [`Self::argv`], used in logs and errors.
    pub fn command_line(&self) -> String {
        let argv = self.argv();
        shlex::try_join(argv.iter().map(String::as_str)).unwrap_or_else(|_| argv.join(" "))
    }
}
