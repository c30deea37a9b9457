//! Shared helpers: an app wired to the in-memory store with cheap hashing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use partage::config::{self, Config};
use partage::store::memory::MemoryStore;
use partage::AppState;

pub const SECRET: &str = "integration-test-secret";

pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let mut env: HashMap<String, String> = HashMap::from([
        ("JWT_SECRET".to_string(), SECRET.to_string()),
        ("PARTAGE_ARGON2_MEMORY_KIB".to_string(), "1024".to_string()),
        ("PARTAGE_ARGON2_ITERATIONS".to_string(), "1".to_string()),
    ]);
    for (k, v) in overrides {
        env.insert(k.to_string(), v.to_string());
    }
    config::from_lookup(|k| env.get(k).cloned()).expect("test config")
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
}

pub fn spawn_app(overrides: &[(&str, &str)]) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(AppState::new(test_config(overrides), store.clone()).expect("app state"));
    TestApp {
        router: partage::app(state.clone()),
        state,
        store,
    }
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.expect("infallible")
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response<Body> {
        self.send(json_request("POST", uri, body)).await
    }

    pub async fn register(&self, email: &str, password: &str) -> Response<Body> {
        self.post_json(
            "/users/register",
            serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Log in and return the bearer token.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let resp = self
            .post_json(
                "/users/login",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(resp.status(), 200, "login failed");
        let body = body_json(resp).await;
        body["token"].as_str().expect("token field").to_string()
    }
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn authed(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

/// Attach a peer address the way `into_make_service_with_connect_info` would.
pub fn from_peer(mut req: Request<Body>, ip: [u8; 4]) -> Request<Body> {
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((ip, 40000))));
    req
}

pub async fn body_json(resp: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

pub async fn body_text(resp: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
