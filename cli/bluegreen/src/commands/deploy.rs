//! Deploy command (blue-green rollout).

use anyhow::Result;
use bluegreen_rollout::{
    Orchestrator, RolloutOutcome, RolloutPlan, RolloutReport, RolloutState, TAG_VARIABLE,
};
use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use tracing::debug;

use crate::error::CliError;
use crate::output::{print_failure, print_info, print_output, print_single, print_success, OutputFormat};

use super::CommandContext;

/// Steps shown in the rollout summary, in execution order.
const STEPS: [RolloutState; 5] = [
    RolloutState::PreHook,
    RolloutState::ScaleGreen,
    RolloutState::SwapCname,
    RolloutState::PostSwapHook,
    RolloutState::ScaleDownBlue,
];

/// Deploy command - move traffic from the live app to the idle one.
#[derive(Debug, Args)]
pub struct DeployCommand {
    /// Units the idle app must reach before the swap (defaults to the live app's count).
    #[arg(long)]
    units: Option<usize>,

    /// Release tag to record on the idle app before the rollout.
    #[arg(long)]
    tag: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeployOutput<'a> {
    plan: &'a RolloutPlan,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<&'a str>,
    report: &'a RolloutReport,
}

#[derive(Debug, Serialize, Tabled)]
struct StepRow {
    #[tabled(rename = "Step")]
    step: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl DeployCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let config = ctx.deployment()?;
        let client = ctx.client()?;

        let plan = ctx.environments(&config).plan(&client, self.units).await?;
        debug!(plan = ?plan, tag = ?self.tag, "resolved rollout plan");
        if ctx.format == OutputFormat::Table {
            print_info(&format!(
                "Rolling {} into service (live: {}, target units: {})",
                plan.green, plan.blue, plan.target_units
            ));
        }

        if let Some(tag) = &self.tag {
            if !client.env_set(&plan.green, TAG_VARIABLE, tag).await {
                return Err(CliError::TagNotRecorded {
                    app: plan.green.clone(),
                    key: TAG_VARIABLE.to_string(),
                    value: tag.clone(),
                }
                .into());
            }
        }

        let report = Orchestrator::new(config, client).run(&plan).await;

        match ctx.format {
            OutputFormat::Json => print_single(&DeployOutput {
                plan: &plan,
                tag: self.tag.as_deref(),
                report: &report,
            }),
            OutputFormat::Table => {
                print_output(&step_rows(&report), ctx.format);
                match &report.outcome {
                    RolloutOutcome::Done => {
                        print_success(&format!("{} is now live", plan.green))
                    }
                    RolloutOutcome::Failed { step, .. } => {
                        print_failure(&format!("rollout halted at {}", step))
                    }
                }
            }
        }

        match report.outcome {
            RolloutOutcome::Done => Ok(()),
            RolloutOutcome::Failed { step, reason } => {
                Err(CliError::RolloutFailed { step, reason }.into())
            }
        }
    }
}

fn step_rows(report: &RolloutReport) -> Vec<StepRow> {
    STEPS
        .iter()
        .map(|step| {
            let status = if report.has_completed(*step) {
                "done"
            } else if report.failed_at() == Some(*step) {
                "failed"
            } else {
                "skipped"
            };
            StepRow {
                step: step.to_string(),
                status: status.to_string(),
            }
        })
        .collect()
}
