#![allow(dead_code)]

use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use buildcast_api::app::Services;
use buildcast_api::config::ServerConfig;
use buildcast_pipeline::{Collaborators, EventScope, PipelineConfig};
use buildcast_process::SupervisorConfig;
use http_body_util::BodyExt;
use tower::ServiceExt;

pub struct TestServices {
    pub services: Services,
    pub dir: tempfile::TempDir,
}

/// Build a `ServerConfig` rooted in `dir` with quick build commands and a
/// fake `.git` checkout for `alice`.
pub fn test_config(dir: &std::path::Path) -> ServerConfig {
    let pipeline = PipelineConfig {
        workspace_root: dir.to_path_buf(),
        download_command: "echo fetching".to_string(),
        compile_command: "echo 'make[1]: Entering directory /src'; mkdir -p bin/targets && printf fw > bin/targets/fw.bin".to_string(),
        event_scope: EventScope::OwnerRoom,
        ..PipelineConfig::default()
    };
    let checkout = pipeline.checkout_dir("alice");
    std::fs::create_dir_all(checkout.join(".git")).expect("fake checkout");

    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        pipeline,
        supervisor: SupervisorConfig {
            poll_interval: Duration::from_millis(20),
            grace_period: Duration::from_millis(500),
            ..SupervisorConfig::default()
        },
        ..ServerConfig::default()
    }
}

pub async fn start_services() -> TestServices {
    let dir = tempfile::tempdir().expect("tempdir");
    let services = Services::start(test_config(dir.path()), Collaborators::default()).await;
    TestServices { services, dir }
}

pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn post(app: Router, uri: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
