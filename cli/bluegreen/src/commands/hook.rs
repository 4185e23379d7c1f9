//! Hook command - run one lifecycle hook outside a rollout.

use anyhow::Result;
use bluegreen_rollout::{HookPoint, HookRunner};
use clap::Args;

use crate::error::CliError;
use crate::output::{print_info, print_success};

use super::CommandContext;

/// Hook command - run the command configured for a lifecycle point.
#[derive(Debug, Args)]
pub struct HookCommand {
    /// Lifecycle point name (before_pre, after_pre, before_swap, after_swap).
    name: String,
}

impl HookCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let config = ctx.deployment()?;
        let runner = HookRunner::new(config.hooks);

        if runner.hooks().get(&self.name).is_none() {
            let known = HookPoint::ALL.iter().any(|p| p.as_str() == self.name);
            let note = if known { "" } else { " (not a standard lifecycle point)" };
            print_info(&format!("No hook configured for `{}`{}", self.name, note));
            return Ok(());
        }

        if runner.run_hook(&self.name).await {
            print_success(&format!("hook `{}` succeeded", self.name));
            Ok(())
        } else {
            Err(CliError::HookFailed(self.name).into())
        }
    }
}
