//! Rollout state machine.
//!
//! ```text
//! PRE_HOOK -> SCALE_GREEN -> SWAP_CNAME -> POST_SWAP_HOOK -> SCALE_DOWN_BLUE -> DONE
//!     \            \             \               \                 \
//!      +------------+-------------+---------------+-----------------+--> FAILED
//! ```
//!
//! Each state performs one unit of work. The first failure halts the run,
//! and steps that already completed are left as they are. The report says
//! exactly which steps took effect.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::client::PlatformClient;
use crate::config::DeploymentConfig;
use crate::error::PlatformError;
use crate::hooks::{HookPoint, HookRunner};
use crate::scaler::UnitScaler;
use crate::transport::Transport;

/// Position in the rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RolloutState {
    PreHook,
    ScaleGreen,
    SwapCname,
    PostSwapHook,
    ScaleDownBlue,
    Done,
    Failed,
}

impl RolloutState {
    /// The state reached when this one succeeds.
    pub fn next(self) -> Self {
        match self {
            RolloutState::PreHook => RolloutState::ScaleGreen,
            RolloutState::ScaleGreen => RolloutState::SwapCname,
            RolloutState::SwapCname => RolloutState::PostSwapHook,
            RolloutState::PostSwapHook => RolloutState::ScaleDownBlue,
            RolloutState::ScaleDownBlue => RolloutState::Done,
            RolloutState::Done => RolloutState::Done,
            RolloutState::Failed => RolloutState::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RolloutState::Done | RolloutState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RolloutState::PreHook => "PRE_HOOK",
            RolloutState::ScaleGreen => "SCALE_GREEN",
            RolloutState::SwapCname => "SWAP_CNAME",
            RolloutState::PostSwapHook => "POST_SWAP_HOOK",
            RolloutState::ScaleDownBlue => "SCALE_DOWN_BLUE",
            RolloutState::Done => "DONE",
            RolloutState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RolloutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a step did not succeed.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("hook `{0}` failed")]
    Hook(String),

    #[error("could not scale {app} up to {target} units")]
    ScaleUp { app: String, target: usize },

    #[error("could not scale {0} down")]
    ScaleDown(String),

    #[error("could not read cnames of {app}: {source}")]
    ReadCnames {
        app: String,
        #[source]
        source: PlatformError,
    },

    #[error("{0} has no cnames to swap")]
    NoCnames(String),

    #[error("could not remove cnames from {0}")]
    RemoveCnames(String),

    #[error("could not bind cnames to {green} (restored on {blue}: {restored})")]
    BindCnames {
        blue: String,
        green: String,
        restored: bool,
    },
}

/// What a rollout should do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolloutPlan {
    /// Application currently holding the cnames.
    pub blue: String,
    /// Application taking over the cnames.
    pub green: String,
    /// Unit count green must reach before the swap.
    pub target_units: usize,
}

impl RolloutPlan {
    pub fn new(blue: impl Into<String>, green: impl Into<String>, target_units: usize) -> Self {
        Self {
            blue: blue.into(),
            green: green.into(),
            target_units,
        }
    }
}

/// Terminal result of a rollout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RolloutOutcome {
    Done,
    Failed { step: RolloutState, reason: String },
}

/// Completed steps plus the terminal outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolloutReport {
    pub completed: Vec<RolloutState>,
    pub outcome: RolloutOutcome,
}

impl RolloutReport {
    /// `Done` or `Failed`.
    pub fn state(&self) -> RolloutState {
        match self.outcome {
            RolloutOutcome::Done => RolloutState::Done,
            RolloutOutcome::Failed { .. } => RolloutState::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RolloutOutcome::Done)
    }

    /// State the run halted in, if it failed.
    pub fn failed_at(&self) -> Option<RolloutState> {
        match &self.outcome {
            RolloutOutcome::Failed { step, .. } => Some(*step),
            RolloutOutcome::Done => None,
        }
    }

    pub fn has_completed(&self, state: RolloutState) -> bool {
        self.completed.contains(&state)
    }
}

/// Drives a single blue-green rollout.
///
/// Single use: [`Orchestrator::run`] consumes it.
pub struct Orchestrator<T> {
    config: DeploymentConfig,
    client: PlatformClient<T>,
    hooks: HookRunner,
}

impl<T: Transport> Orchestrator<T> {
    pub fn new(config: DeploymentConfig, client: PlatformClient<T>) -> Self {
        let hooks = HookRunner::new(config.hooks.clone());
        Self {
            config,
            client,
            hooks,
        }
    }

    /// Replace the hook runner, e.g. to use a different shell.
    pub fn with_hook_runner(mut self, hooks: HookRunner) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    /// Run every state in order until `DONE` or the first failure.
    pub async fn run(self, plan: &RolloutPlan) -> RolloutReport {
        info!(
            name = %self.config.name,
            blue = %plan.blue,
            green = %plan.green,
            target_units = plan.target_units,
            "starting rollout"
        );

        let mut completed = Vec::new();
        let mut state = RolloutState::PreHook;

        while !state.is_terminal() {
            info!(step = %state, "entering step");

            if let Err(e) = self.step(state, plan).await {
                error!(step = %state, error = %e, completed = ?completed, "rollout halted");
                return RolloutReport {
                    completed,
                    outcome: RolloutOutcome::Failed {
                        step: state,
                        reason: e.to_string(),
                    },
                };
            }

            completed.push(state);
            state = state.next();
        }

        info!(name = %self.config.name, live = %plan.green, "rollout complete");
        RolloutReport {
            completed,
            outcome: RolloutOutcome::Done,
        }
    }

    async fn step(&self, state: RolloutState, plan: &RolloutPlan) -> Result<(), StepError> {
        match state {
            RolloutState::PreHook => self.hook(HookPoint::BeforePre).await,
            RolloutState::ScaleGreen => {
                let scaler = UnitScaler::new(&self.client);
                if scaler.add_units(&plan.green, plan.target_units).await {
                    Ok(())
                } else {
                    Err(StepError::ScaleUp {
                        app: plan.green.clone(),
                        target: plan.target_units,
                    })
                }
            }
            RolloutState::SwapCname => self.swap(&plan.blue, &plan.green).await,
            RolloutState::PostSwapHook => self.hook(HookPoint::AfterSwap).await,
            RolloutState::ScaleDownBlue => {
                let scaler = UnitScaler::new(&self.client);
                if scaler.remove_units(&plan.blue).await {
                    Ok(())
                } else {
                    Err(StepError::ScaleDown(plan.blue.clone()))
                }
            }
            RolloutState::Done | RolloutState::Failed => Ok(()),
        }
    }

    async fn hook(&self, point: HookPoint) -> Result<(), StepError> {
        if self.hooks.run_hook(point.as_str()).await {
            Ok(())
        } else {
            Err(StepError::Hook(point.as_str().to_string()))
        }
    }

    /// Move blue's cnames onto green.
    ///
    /// If green refuses them after blue let go, they are handed back to blue
    /// so the swap either fully happens or leaves routing as it was.
    async fn swap(&self, blue: &str, green: &str) -> Result<(), StepError> {
        let cnames = self
            .client
            .get_cname(blue)
            .await
            .map_err(|source| StepError::ReadCnames {
                app: blue.to_string(),
                source,
            })?
            .ok_or_else(|| StepError::NoCnames(blue.to_string()))?;

        info!(from = %blue, to = %green, cnames = ?cnames, "swapping cnames");

        if !self.client.remove_cname(blue, &cnames).await {
            return Err(StepError::RemoveCnames(blue.to_string()));
        }

        if !self.client.set_cname(green, &cnames).await {
            let restored = self.client.set_cname(blue, &cnames).await;
            if restored {
                warn!(app = %blue, "bind to green failed, cnames restored");
            } else {
                error!(app = %blue, cnames = ?cnames, "bind to green failed and cnames could not be restored");
            }
            return Err(StepError::BindCnames {
                blue: blue.to_string(),
                green: green.to_string(),
                restored,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;

    use super::*;
    use crate::hooks::HookMap;
    use crate::transport::MockTransport;

    const BLUE: &str = "test-app-blue";
    const GREEN: &str = "test-app-green";

    fn config(hooks: HookMap) -> DeploymentConfig {
        DeploymentConfig::new("test-app", hooks).unwrap()
    }

    /// Platform where blue serves two cnames on two units and green has one unit.
    fn healthy_platform() -> MockTransport {
        MockTransport::new()
            .respond(
                Method::GET,
                "/apps/test-app-blue",
                200,
                r#"{"cname":["cname1","cname2"],"units":["b1","b2"]}"#,
            )
            .respond(Method::GET, "/apps/test-app-green", 200, r#"{"cname":[],"units":["g1"]}"#)
            .respond(Method::PUT, "/apps/test-app-green/units", 200, "")
            .respond(Method::DELETE, "/apps/test-app-blue/cname", 200, "")
            .respond(Method::POST, "/apps/test-app-green/cname", 200, "")
            .respond(Method::DELETE, "/apps/test-app-blue/units", 200, "")
    }

    fn plan() -> RolloutPlan {
        RolloutPlan::new(BLUE, GREEN, 2)
    }

    #[test]
    fn test_state_sequence_is_linear() {
        let mut state = RolloutState::PreHook;
        let mut seen = vec![state];
        while !state.is_terminal() {
            state = state.next();
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                RolloutState::PreHook,
                RolloutState::ScaleGreen,
                RolloutState::SwapCname,
                RolloutState::PostSwapHook,
                RolloutState::ScaleDownBlue,
                RolloutState::Done,
            ]
        );
        assert_eq!(RolloutState::Failed.next(), RolloutState::Failed);
    }

    #[tokio::test]
    async fn test_full_rollout_completes() {
        let mock = healthy_platform();
        let orchestrator = Orchestrator::new(
            config(HookMap::new().with("before_pre", "true").with("after_swap", "true")),
            PlatformClient::new(mock.clone()),
        );

        let report = orchestrator.run(&plan()).await;

        assert!(report.is_success());
        assert_eq!(report.state(), RolloutState::Done);
        assert_eq!(report.completed.len(), 5);

        let scale_up = mock.requests_to(Method::PUT, "/apps/test-app-green/units");
        assert_eq!(scale_up[0].query_param("units"), Some("1"));
        let scale_down = mock.requests_to(Method::DELETE, "/apps/test-app-blue/units");
        assert_eq!(scale_down[0].query_param("units"), Some("1"));
        let bound = mock.requests_to(Method::POST, "/apps/test-app-green/cname");
        assert_eq!(bound[0].body, Some(serde_json::json!(["cname1", "cname2"])));
    }

    #[tokio::test]
    async fn test_failing_after_swap_hook_halts_after_swap() {
        let mock = healthy_platform();
        let orchestrator = Orchestrator::new(
            config(
                HookMap::new()
                    .with("before_pre", "echo test")
                    .with("after_swap", "undefined_command"),
            ),
            PlatformClient::new(mock.clone()),
        );

        let report = orchestrator.run(&plan()).await;

        assert_eq!(report.state(), RolloutState::Failed);
        assert_eq!(report.failed_at(), Some(RolloutState::PostSwapHook));
        assert!(report.has_completed(RolloutState::ScaleGreen));
        assert!(report.has_completed(RolloutState::SwapCname));
        assert!(!report.has_completed(RolloutState::ScaleDownBlue));
        assert!(mock
            .requests_to(Method::DELETE, "/apps/test-app-blue/units")
            .is_empty());
    }

    #[tokio::test]
    async fn test_failing_pre_hook_touches_nothing() {
        let mock = healthy_platform();
        let orchestrator = Orchestrator::new(
            config(HookMap::new().with("before_pre", "exit 1")),
            PlatformClient::new(mock.clone()),
        );

        let report = orchestrator.run(&plan()).await;

        assert_eq!(report.failed_at(), Some(RolloutState::PreHook));
        assert!(report.completed.is_empty());
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_scale_green_failure_halts_before_swap() {
        let mock = healthy_platform().replace(Method::PUT, "/apps/test-app-green/units", 500, "");

        let report = Orchestrator::new(config(HookMap::new()), PlatformClient::new(mock.clone()))
            .run(&plan())
            .await;

        assert_eq!(report.failed_at(), Some(RolloutState::ScaleGreen));
        assert_eq!(report.completed, vec![RolloutState::PreHook]);
        assert!(mock.requests().iter().all(|r| !r.path.ends_with("/cname")));
    }

    #[tokio::test]
    async fn test_swap_without_cnames_fails() {
        let mock = healthy_platform().replace(
            Method::GET,
            "/apps/test-app-blue",
            200,
            r#"{"cname":[],"units":["b1","b2"]}"#,
        );

        let report = Orchestrator::new(config(HookMap::new()), PlatformClient::new(mock))
            .run(&plan())
            .await;

        assert_eq!(report.failed_at(), Some(RolloutState::SwapCname));
        match report.outcome {
            RolloutOutcome::Failed { reason, .. } => assert!(reason.contains("no cnames")),
            RolloutOutcome::Done => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_swap_restores_blue_when_green_bind_fails() {
        let mock = healthy_platform()
            .replace(Method::POST, "/apps/test-app-green/cname", 500, "")
            .respond(Method::POST, "/apps/test-app-blue/cname", 200, "");

        let report = Orchestrator::new(config(HookMap::new()), PlatformClient::new(mock.clone()))
            .run(&plan())
            .await;

        assert_eq!(report.failed_at(), Some(RolloutState::SwapCname));
        let restored = mock.requests_to(Method::POST, "/apps/test-app-blue/cname");
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].body, Some(serde_json::json!(["cname1", "cname2"])));
        assert!(mock
            .requests_to(Method::DELETE, "/apps/test-app-blue/units")
            .is_empty());
    }

    #[tokio::test]
    async fn test_remove_cname_failure_does_not_bind_green() {
        let mock = healthy_platform().replace(Method::DELETE, "/apps/test-app-blue/cname", 500, "");

        let report = Orchestrator::new(config(HookMap::new()), PlatformClient::new(mock.clone()))
            .run(&plan())
            .await;

        assert_eq!(report.failed_at(), Some(RolloutState::SwapCname));
        assert!(mock
            .requests_to(Method::POST, "/apps/test-app-green/cname")
            .is_empty());
    }

    #[tokio::test]
    async fn test_scale_down_failure_reports_swap_done() {
        let mock = healthy_platform().replace(Method::DELETE, "/apps/test-app-blue/units", 500, "");

        let report = Orchestrator::new(config(HookMap::new()), PlatformClient::new(mock.clone()))
            .run(&plan())
            .await;

        assert_eq!(report.state(), RolloutState::Failed);
        assert_eq!(report.failed_at(), Some(RolloutState::ScaleDownBlue));
        assert!(report.has_completed(RolloutState::SwapCname));
        assert!(report.has_completed(RolloutState::PostSwapHook));
        // Traffic stays on green; nothing is moved back.
        assert!(mock
            .requests_to(Method::POST, "/apps/test-app-blue/cname")
            .is_empty());
    }

    #[test]
    fn test_report_serializes_outcome() {
        let report = RolloutReport {
            completed: vec![RolloutState::PreHook],
            outcome: RolloutOutcome::Failed {
                step: RolloutState::ScaleGreen,
                reason: "boom".to_string(),
            },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["completed"][0], "PRE_HOOK");
        assert_eq!(json["outcome"]["result"], "failed");
        assert_eq!(json["outcome"]["step"], "SCALE_GREEN");
    }
}
