#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use swarm_api::config::ServerConfig;
use swarm_api::router::build_app_router;
use swarm_api::state::AppState;
use swarm_db::MemoryJobStore;
use swarm_events::{BackgroundPublisher, BroadcastHub, HubConfig, MemoryBus};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// Build a test `ServerConfig` with in-memory backends and short timeouts.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::from_lookup(|key| match key {
        "STORE_BACKEND" => Some("memory".into()),
        "BUS_BACKEND" => Some("memory".into()),
        _ => None,
    })
    .expect("test config is valid");
    config.host = "127.0.0.1".into();
    config.port = 0;
    config.hub = HubConfig {
        write_timeout: Duration::from_millis(200),
        ..HubConfig::default()
    };
    config.publish_timeout = Duration::from_secs(1);
    config
}

/// A fully wired application over in-memory collaborators.
///
/// The concrete store and bus are kept so tests can seed and inspect them.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryJobStore>,
    pub bus: Arc<MemoryBus>,
    pub hub: BroadcastHub,
    pub config: Arc<ServerConfig>,
}

/// Build the full application router with the production middleware stack.
pub fn build_test_app() -> TestApp {
    let config = Arc::new(test_config());
    let store = Arc::new(MemoryJobStore::new());
    let bus = Arc::new(MemoryBus::default());
    let (hub, _hub_handle) = BroadcastHub::spawn(config.hub.clone());

    let publisher = BackgroundPublisher::new(
        bus.clone(),
        config.publish_timeout,
        CancellationToken::new(),
    );

    let state = AppState {
        store: store.clone(),
        hub: hub.clone(),
        publisher,
        config: Arc::clone(&config),
    };

    TestApp {
        router: build_app_router(state, &config),
        store,
        bus,
        hub,
        config,
    }
}

/// Send a GET request through the router.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send a POST request with a raw JSON body through the router.
pub async fn post_json(app: Router, uri: &str, body: &str) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
