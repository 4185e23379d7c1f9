//! Blue-green rollout engine.
//!
//! Moves traffic from a live application ("blue") to a freshly deployed one
//! ("green") on a multi-tenant application platform:
//!
//! - **Client**: one request per platform operation (cnames, env vars, units)
//! - **Scaler**: unit deltas with a floor of one running unit
//! - **Hooks**: operator shell commands at fixed lifecycle points
//! - **Orchestrator**: the rollout state machine, fail-fast with no rollback
//!
//! # Invariants
//!
//! - Platform state is never cached; every decision reads it fresh
//! - A scale-down never leaves fewer than one unit
//! - The cname swap either fully happens or leaves routing unchanged
//! - The first failing step halts the rollout

pub mod client;
pub mod config;
pub mod environment;
pub mod error;
pub mod hooks;
pub mod orchestrator;
pub mod scaler;
pub mod transport;

pub use client::{EnvLookup, PlatformClient};
pub use config::{DeploymentConfig, PlatformSettings};
pub use environment::{Environments, Resolved, TAG_VARIABLE};
pub use error::{ConfigError, EnvironmentError, PlatformError};
pub use hooks::{CommandOutcome, HookMap, HookPoint, HookRunner};
pub use orchestrator::{Orchestrator, RolloutOutcome, RolloutPlan, RolloutReport, RolloutState};
pub use scaler::{UnitScaler, MIN_UNITS};
pub use reqwest::Method;
pub use transport::{HttpTransport, MockTransport, PlatformRequest, PlatformResponse, Transport};
