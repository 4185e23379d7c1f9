//! Lifecycle hooks.
//!
//! A hook is a shell command bound to a named point in the rollout. Points
//! without a configured command succeed without doing anything, so callers
//! can fire every lifecycle point unconditionally.

use std::collections::BTreeMap;
use std::fmt;
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Default shell used to interpret hook commands.
pub const DEFAULT_SHELL: &str = "sh";

/// Lifecycle points recognized by the rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    BeforePre,
    AfterPre,
    BeforeSwap,
    AfterSwap,
}

impl HookPoint {
    pub const ALL: [HookPoint; 4] = [
        HookPoint::BeforePre,
        HookPoint::AfterPre,
        HookPoint::BeforeSwap,
        HookPoint::AfterSwap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookPoint::BeforePre => "before_pre",
            HookPoint::AfterPre => "after_pre",
            HookPoint::BeforeSwap => "before_swap",
            HookPoint::AfterSwap => "after_swap",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle-point name to shell command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HookMap(BTreeMap<String, String>);

impl HookMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, command: impl Into<String>) -> Self {
        self.0.insert(name.into(), command.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HookMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// How a hook process ended.
#[derive(Debug)]
pub enum CommandOutcome {
    /// The process ran; `None` means it was killed by a signal.
    Exited(Option<i32>),
    /// The process could not be started at all.
    SpawnFailed(std::io::Error),
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        matches!(self, CommandOutcome::Exited(Some(0)))
    }
}

/// Runs hook commands through a shell.
#[derive(Debug, Clone)]
pub struct HookRunner {
    hooks: HookMap,
    shell: String,
}

impl HookRunner {
    pub fn new(hooks: HookMap) -> Self {
        Self {
            hooks,
            shell: DEFAULT_SHELL.to_string(),
        }
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn hooks(&self) -> &HookMap {
        &self.hooks
    }

    /// Execute `command` and report how it ended.
    ///
    /// The child inherits this process's environment, working directory and stdio.
    pub async fn execute(&self, command: &str) -> CommandOutcome {
        debug!(shell = %self.shell, command = %command, "spawning hook command");

        let status = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await;

        match status {
            Ok(status) => CommandOutcome::Exited(status.code()),
            Err(e) => CommandOutcome::SpawnFailed(e),
        }
    }

    /// Run `command`; true only when it exits with status zero.
    pub async fn run_command(&self, command: &str) -> bool {
        let outcome = self.execute(command).await;
        match &outcome {
            CommandOutcome::Exited(Some(0)) => {
                debug!(command = %command, "command succeeded");
            }
            CommandOutcome::Exited(Some(code)) => {
                warn!(command = %command, exit_code = code, "command exited with failure");
            }
            CommandOutcome::Exited(None) => {
                warn!(command = %command, "command terminated by signal");
            }
            CommandOutcome::SpawnFailed(e) => {
                warn!(command = %command, shell = %self.shell, error = %e, "command could not be started");
            }
        }
        outcome.success()
    }

    /// Run the hook configured for `name`. Unconfigured hooks succeed.
    pub async fn run_hook(&self, name: &str) -> bool {
        let Some(command) = self.hooks.get(name) else {
            debug!(hook = %name, "no hook configured");
            return true;
        };

        info!(hook = %name, command = %command, "running hook");
        self.run_command(command).await
    }
}
