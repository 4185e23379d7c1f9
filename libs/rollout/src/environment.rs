//! Blue and green environment resolution.
//!
//! A deployment named `storefront` lives on two platform applications,
//! `storefront-blue` and `storefront-green`. Whichever holds the cnames is
//! live; the other receives the next release.

use serde::Serialize;
use tracing::info;

use crate::client::PlatformClient;
use crate::error::EnvironmentError;
use crate::orchestrator::RolloutPlan;
use crate::transport::Transport;

/// Environment variable recording the release tag deployed to an app.
pub const TAG_VARIABLE: &str = "TAG";

/// The two applications backing a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Environments {
    pub blue: String,
    pub green: String,
}

/// Which application is serving and which is idle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved {
    pub live: String,
    pub idle: String,
    pub cnames: Vec<String>,
}

impl Environments {
    pub fn for_app(name: &str) -> Self {
        Self {
            blue: format!("{}-blue", name),
            green: format!("{}-green", name),
        }
    }

    /// Find the live application by looking for bound cnames, blue first.
    pub async fn resolve<T: Transport>(
        &self,
        client: &PlatformClient<T>,
    ) -> Result<Resolved, EnvironmentError> {
        if let Some(cnames) = client.get_cname(&self.blue).await? {
            return Ok(Resolved {
                live: self.blue.clone(),
                idle: self.green.clone(),
                cnames,
            });
        }

        if let Some(cnames) = client.get_cname(&self.green).await? {
            return Ok(Resolved {
                live: self.green.clone(),
                idle: self.blue.clone(),
                cnames,
            });
        }

        Err(EnvironmentError::NoLiveEnvironment {
            blue: self.blue.clone(),
            green: self.green.clone(),
        })
    }

    /// Build the plan for rolling the idle application into service.
    ///
    /// Without an explicit `target`, the idle app is grown to the live app's
    /// current unit count.
    pub async fn plan<T: Transport>(
        &self,
        client: &PlatformClient<T>,
        target: Option<usize>,
    ) -> Result<RolloutPlan, EnvironmentError> {
        let resolved = self.resolve(client).await?;

        let target = match target {
            Some(target) => target,
            None => client.total_units(&resolved.live).await?,
        };

        let current = client.total_units(&resolved.idle).await?;
        if current >= target {
            return Err(EnvironmentError::AlreadyScaled {
                app: resolved.idle,
                current,
                target,
            });
        }

        info!(
            live = %resolved.live,
            idle = %resolved.idle,
            cnames = ?resolved.cnames,
            target_units = target,
            "planned rollout"
        );
        Ok(RolloutPlan::new(resolved.live, resolved.idle, target))
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;

    use super::*;
    use crate::transport::MockTransport;

    fn client(mock: &MockTransport) -> PlatformClient<MockTransport> {
        PlatformClient::new(mock.clone())
    }

    #[test]
    fn test_names_from_app() {
        let envs = Environments::for_app("storefront");
        assert_eq!(envs.blue, "storefront-blue");
        assert_eq!(envs.green, "storefront-green");
    }

    #[tokio::test]
    async fn test_blue_live_when_it_holds_cnames() {
        let mock = MockTransport::new().respond(
            Method::GET,
            "/apps/shop-blue",
            200,
            r#"{"cname":["shop.example.com"]}"#,
        );

        let resolved = Environments::for_app("shop").resolve(&client(&mock)).await.unwrap();
        assert_eq!(resolved.live, "shop-blue");
        assert_eq!(resolved.idle, "shop-green");
        assert_eq!(resolved.cnames, vec!["shop.example.com".to_string()]);
        assert!(mock.requests_to(Method::GET, "/apps/shop-green").is_empty());
    }

    #[tokio::test]
    async fn test_green_live_when_blue_has_none() {
        let mock = MockTransport::new()
            .respond(Method::GET, "/apps/shop-blue", 200, r#"{"cname":[]}"#)
            .respond(
                Method::GET,
                "/apps/shop-green",
                200,
                r#"{"cname":["shop.example.com"]}"#,
            );

        let resolved = Environments::for_app("shop").resolve(&client(&mock)).await.unwrap();
        assert_eq!(resolved.live, "shop-green");
        assert_eq!(resolved.idle, "shop-blue");
    }

    #[tokio::test]
    async fn test_no_live_environment() {
        let mock = MockTransport::new()
            .respond(Method::GET, "/apps/shop-blue", 200, r#"{"cname":[]}"#)
            .respond(Method::GET, "/apps/shop-green", 200, r#"{"cname":null}"#);

        let err = Environments::for_app("shop").resolve(&client(&mock)).await.unwrap_err();
        assert!(matches!(err, EnvironmentError::NoLiveEnvironment { .. }));
    }

    #[tokio::test]
    async fn test_plan_targets_live_unit_count() {
        let mock = MockTransport::new()
            .respond(
                Method::GET,
                "/apps/shop-blue",
                200,
                r#"{"cname":["shop.example.com"],"units":["b1","b2","b3"]}"#,
            )
            .respond(Method::GET, "/apps/shop-green", 200, r#"{"cname":[],"units":["g1"]}"#);

        let plan = Environments::for_app("shop").plan(&client(&mock), None).await.unwrap();
        assert_eq!(plan, RolloutPlan::new("shop-blue", "shop-green", 3));
    }

    #[tokio::test]
    async fn test_plan_rejects_already_scaled_idle_app() {
        let mock = MockTransport::new()
            .respond(
                Method::GET,
                "/apps/shop-blue",
                200,
                r#"{"cname":["shop.example.com"],"units":["b1"]}"#,
            )
            .respond(Method::GET, "/apps/shop-green", 200, r#"{"cname":[],"units":["g1","g2"]}"#);

        let err = Environments::for_app("shop")
            .plan(&client(&mock), Some(2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EnvironmentError::AlreadyScaled { current: 2, target: 2, .. }
        ));
    }
}
