//! End-to-end rollouts against a local HTTP server standing in for the platform.

use bluegreen_rollout::{
    DeploymentConfig, Environments, HookMap, HttpTransport, Orchestrator, PlatformClient,
    PlatformSettings, RolloutState,
};
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> PlatformClient<HttpTransport> {
    let settings = PlatformSettings::new(Some(server.uri()), Some("token".to_string())).unwrap();
    PlatformClient::new(HttpTransport::new(&settings).unwrap())
}

/// Blue serves two cnames on two units; green runs one unit and no cnames.
async fn platform(scale_down_calls: u64) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/apps/test-app-blue"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"cname": ["cname1", "cname2"], "units": ["b1", "b2"]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/apps/test-app-green"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"cname": [], "units": ["g1"]})))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/apps/test-app-green/units"))
        .and(query_param("units", "1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/apps/test-app-blue/cname"))
        .and(body_json(json!(["cname1", "cname2"])))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/apps/test-app-green/cname"))
        .and(body_json(json!(["cname1", "cname2"])))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/apps/test-app-blue/units"))
        .and(query_param("units", "1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(scale_down_calls)
        .mount(&server)
        .await;

    server
}

#[tokio::test]
async fn test_failing_after_swap_hook_halts_at_post_swap() {
    let server = platform(0).await;
    let client = client_for(&server);

    let config = DeploymentConfig::new(
        "test-app",
        HookMap::new()
            .with("before_pre", "echo test")
            .with("after_swap", "undefined_command"),
    )
    .unwrap();

    let plan = Environments::for_app(&config.name)
        .plan(&client, None)
        .await
        .unwrap();
    assert_eq!(plan.blue, "test-app-blue");
    assert_eq!(plan.green, "test-app-green");
    assert_eq!(plan.target_units, 2);

    let report = Orchestrator::new(config, client).run(&plan).await;

    assert_eq!(report.state(), RolloutState::Failed);
    assert_eq!(report.failed_at(), Some(RolloutState::PostSwapHook));
    assert_eq!(
        report.completed,
        vec![
            RolloutState::PreHook,
            RolloutState::ScaleGreen,
            RolloutState::SwapCname,
        ]
    );
    // Expectations (no scale-down) are verified when the server drops.
}

#[tokio::test]
async fn test_rollout_completes_with_passing_hooks() {
    let server = platform(1).await;
    let client = client_for(&server);

    let config = DeploymentConfig::new(
        "test-app",
        HookMap::new()
            .with("before_pre", "echo test")
            .with("after_swap", "true"),
    )
    .unwrap();

    let plan = Environments::for_app(&config.name)
        .plan(&client, None)
        .await
        .unwrap();
    let report = Orchestrator::new(config, client).run(&plan).await;

    assert!(report.is_success());
    assert_eq!(report.state(), RolloutState::Done);
    assert!(report.has_completed(RolloutState::ScaleDownBlue));
}

#[tokio::test]
async fn test_unconfigured_hooks_do_not_block_rollout() {
    let server = platform(1).await;
    let client = client_for(&server);

    let config = DeploymentConfig::new("test-app", HookMap::new()).unwrap();
    let plan = Environments::for_app(&config.name)
        .plan(&client, None)
        .await
        .unwrap();

    let report = Orchestrator::new(config, client).run(&plan).await;
    assert!(report.is_success());
}
