//! Status command - show both applications of the deployment.

use anyhow::Result;
use bluegreen_rollout::{PlatformClient, Transport, TAG_VARIABLE};
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::error::CliError;
use crate::output::print_output;

use super::CommandContext;

/// Status command - cnames, units and release tag per application.
#[derive(Debug, Args)]
pub struct StatusCommand {}

#[derive(Debug, Serialize, Tabled)]
struct AppStatus {
    #[tabled(rename = "App")]
    app: String,
    #[tabled(rename = "Live")]
    live: bool,
    #[tabled(rename = "Cnames")]
    #[serde(skip)]
    cname_list: String,
    #[tabled(skip)]
    cnames: Vec<String>,
    #[tabled(rename = "Units")]
    units: usize,
    #[tabled(rename = "Tag", display = "display_tag")]
    tag: Option<String>,
}

fn display_tag(tag: &Option<String>) -> String {
    tag.clone().unwrap_or_else(|| "-".to_string())
}

impl StatusCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let config = ctx.deployment()?;
        let client = ctx.client()?;
        let envs = ctx.environments(&config);

        let rows = vec![
            app_status(&client, &envs.blue).await?,
            app_status(&client, &envs.green).await?,
        ];

        print_output(&rows, ctx.format);
        Ok(())
    }
}

async fn app_status<T: Transport>(
    client: &PlatformClient<T>,
    app: &str,
) -> Result<AppStatus, CliError> {
    let cnames = client.get_cname(app).await?.unwrap_or_default();
    let units = client.total_units(app).await?;
    let tag = client.env_get(app, TAG_VARIABLE).await?;

    Ok(AppStatus {
        app: app.to_string(),
        live: !cnames.is_empty(),
        cname_list: if cnames.is_empty() {
            "-".to_string()
        } else {
            cnames.join(", ")
        },
        cnames,
        units,
        tag,
    })
}
