//! CLI commands.

mod deploy;
mod hook;
mod status;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use bluegreen_rollout::{
    DeploymentConfig, Environments, HttpTransport, PlatformClient, PlatformSettings,
};
use clap::{Parser, Subcommand};

use crate::error::CliError;
use crate::output::OutputFormat;

/// bluegreen - move traffic between blue and green platform applications.
#[derive(Debug, Parser)]
#[command(name = "bluegreen")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the deployment config (defaults to ./bluegreen.toml).
    #[arg(long, global = true, env = "BLUEGREEN_CONFIG")]
    config: Option<PathBuf>,

    /// Platform API host.
    #[arg(long, global = true, env = "BLUEGREEN_HOST")]
    host: Option<String>,

    /// Platform API token.
    #[arg(long, global = true, env = "BLUEGREEN_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// HTTP request timeout in seconds.
    #[arg(long, global = true, default_value_t = 30)]
    timeout_secs: u64,

    /// Output format (table or json).
    #[arg(long, global = true, default_value = "table")]
    format: String,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Roll the idle application into service.
    Deploy(deploy::DeployCommand),

    /// Show cnames, units and tag for both applications.
    Status(status::StatusCommand),

    /// Run a single configured hook.
    Hook(hook::HookCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    pub fn log_json(&self) -> bool {
        self.log_json
    }

    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let ctx = CommandContext {
            config_path: self.config,
            host: self.host,
            token: self.token,
            timeout: Duration::from_secs(self.timeout_secs),
            format: OutputFormat::parse(&self.format),
        };

        match self.command {
            Commands::Deploy(cmd) => cmd.run(ctx).await,
            Commands::Status(cmd) => cmd.run(ctx).await,
            Commands::Hook(cmd) => cmd.run(ctx).await,
            Commands::Version => {
                println!("bluegreen {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub config_path: Option<PathBuf>,
    pub host: Option<String>,
    pub token: Option<String>,
    pub timeout: Duration,
    pub format: OutputFormat,
}

impl CommandContext {
    /// Load the deployment config.
    pub fn deployment(&self) -> Result<DeploymentConfig, CliError> {
        Ok(DeploymentConfig::discover(self.config_path.as_deref())?)
    }

    /// Get an authenticated platform client.
    pub fn client(&self) -> Result<PlatformClient<HttpTransport>, CliError> {
        let settings = PlatformSettings::new(self.host.clone(), self.token.clone())?
            .with_timeout(self.timeout);
        Ok(PlatformClient::new(HttpTransport::new(&settings)?))
    }

    pub fn environments(&self, config: &DeploymentConfig) -> Environments {
        Environments::for_app(&config.name)
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_deploy_flags() {
        let cli = Cli::try_parse_from([
            "bluegreen",
            "--host",
            "platform.example.com",
            "--format",
            "json",
            "deploy",
            "--units",
            "3",
            "--tag",
            "v1.2.0",
        ])
        .unwrap();

        assert_eq!(cli.host.as_deref(), Some("platform.example.com"));
        assert_eq!(cli.format, "json");
        assert!(matches!(cli.command, Commands::Deploy(_)));
    }

    #[test]
    fn test_client_requires_host_and_token() {
        let ctx = CommandContext {
            config_path: None,
            host: None,
            token: Some("token".to_string()),
            timeout: Duration::from_secs(1),
            format: OutputFormat::Table,
        };
        assert!(matches!(
            ctx.client(),
            Err(CliError::Config(bluegreen_rollout::ConfigError::MissingHost))
        ));
    }
}
