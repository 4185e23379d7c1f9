//! Error handling and display for the CLI.

use bluegreen_rollout::{ConfigError, EnvironmentError, PlatformError, RolloutState};
use colored::Colorize;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    #[error("could not record {key}={value} on {app}")]
    TagNotRecorded {
        app: String,
        key: String,
        value: String,
    },

    #[error("rollout failed at {step}: {reason}")]
    RolloutFailed { step: RolloutState, reason: String },

    #[error("hook `{0}` failed")]
    HookFailed(String),
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    let Some(cli_err) = err.downcast_ref::<CliError>() else {
        return;
    };

    match cli_err {
        CliError::Config(ConfigError::NotFound(_)) => {
            eprintln!(
                "\n{}",
                "Hint: Create bluegreen.toml with `name = \"<app>\"` or pass --config.".yellow()
            );
        }
        CliError::Config(ConfigError::MissingHost | ConfigError::MissingToken) => {
            eprintln!(
                "\n{}",
                "Hint: Set BLUEGREEN_HOST and BLUEGREEN_TOKEN, or pass --host/--token.".yellow()
            );
        }
        CliError::Platform(PlatformError::Transport(_)) => {
            eprintln!(
                "\n{}",
                "Hint: Check your network connection and platform host.".yellow()
            );
        }
        CliError::Platform(PlatformError::Status { status: 401, .. }) => {
            eprintln!(
                "\n{}",
                "Hint: The platform rejected the token. Check BLUEGREEN_TOKEN.".yellow()
            );
        }
        CliError::RolloutFailed { step, .. } => {
            let hint = match step {
                RolloutState::PreHook | RolloutState::ScaleGreen => {
                    "Traffic was not moved; blue is still live."
                }
                RolloutState::SwapCname => {
                    "Check which app holds the cnames before retrying."
                }
                _ => "Traffic now goes to green; blue may still run extra units.",
            };
            eprintln!("\n{}", format!("Hint: {}", hint).yellow());
        }
        _ => {}
    }
}
