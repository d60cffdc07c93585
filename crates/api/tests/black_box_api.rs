//! End-to-end HTTP tests against the real router, wired to an in-memory
//! SQLite database exactly as `main.rs` wires the production process.

use std::sync::Arc;

use aether_api::app::{self, AppState};
use aether_events::FanoutHub;
use aether_infra::workers::rule_evaluator::RuleEvaluatorConfig;
use aether_infra::{DedupHistory, DeliveryQueue, EventStore, OperatorAudit, RuleStore};
use reqwest::StatusCode;
use serde_json::json;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let db = aether_infra::connect(":memory:").await.expect("in-memory db should connect");

        let state = AppState {
            event_store: Arc::new(EventStore::new(db.clone())),
            rule_store: Arc::new(RuleStore::new(db.clone())),
            delivery_queue: Arc::new(DeliveryQueue::new(db.clone())),
            dedup: Arc::new(DedupHistory::new(db.clone())),
            audit: Arc::new(OperatorAudit::new(db)),
            hub: Arc::new(FanoutHub::new()),
            evaluator_config: RuleEvaluatorConfig {
                dedup_window_seconds: 300,
                webhooks: Vec::new(),
                max_delivery_attempts: 5,
            },
        };

        let app = app::build_app(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{addr}");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn ping_requires_no_auth_context() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/ops/ping", srv.base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn publish_rejects_unknown_event_type() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/events/publish", srv.base_url))
        .json(&json!({"event_type": "nonexistent.type"}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn publish_then_recent_round_trips_the_event() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/events/publish", srv.base_url))
        .header("x-tenant-id", "acme")
        .json(&json!({"event_type": "svc.fail", "source": "svc-a"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let published: serde_json::Value = res.json().await.unwrap();
    let event_id = published["event_id"].as_str().unwrap().to_string();

    let res = client
        .get(format!("{}/events/recent", srv.base_url))
        .header("x-tenant-id", "acme")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let recent: Vec<serde_json::Value> = res.json().await.unwrap();
    assert!(recent.iter().any(|e| e["event_id"] == event_id));
}

#[tokio::test]
async fn viewer_cannot_override_tenant_scope() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/events/recent?tenant_id=other-tenant", srv.base_url))
        .header("x-tenant-id", "acme")
        .header("x-user-roles", "viewer")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_may_override_tenant_scope() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/events/recent?tenant_id=other-tenant", srv.base_url))
        .header("x-tenant-id", "acme")
        .header("x-user-roles", "admin")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn non_admin_cannot_create_rules() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/alerts/rules", srv.base_url))
        .header("x-tenant-id", "acme")
        .header("x-user-roles", "viewer")
        .json(&json!({"name": "x", "window_seconds": 60, "threshold": 3}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn rule_create_rejects_non_positive_threshold() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/alerts/rules", srv.base_url))
        .header("x-tenant-id", "acme")
        .header("x-user-roles", "admin")
        .json(&json!({"name": "x", "window_seconds": 60, "threshold": 0}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn basic_alert_scenario_trips_and_enqueues_no_webhook_when_none_configured() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/alerts/rules", srv.base_url))
        .header("x-tenant-id", "acme")
        .header("x-user-roles", "admin")
        .json(&json!({
            "name": "too-many-failures",
            "event_type": "svc.fail",
            "window_seconds": 60,
            "threshold": 3,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    for _ in 0..3 {
        let res = client
            .post(format!("{}/events/publish", srv.base_url))
            .header("x-tenant-id", "acme")
            .json(&json!({"event_type": "svc.fail", "source": "svc-a"}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = client
        .post(format!("{}/alerts/evaluate", srv.base_url))
        .header("x-user-roles", "admin")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/events/recent?event_type=ops.alert.raised", srv.base_url))
        .header("x-tenant-id", "acme")
        .send()
        .await
        .unwrap();
    let raised: Vec<serde_json::Value> = res.json().await.unwrap();
    assert_eq!(raised.len(), 1);
    assert_eq!(raised[0]["payload"]["matched_count"], 3);

    // No webhooks were configured on this test server, so no delivery rows exist.
    let res = client
        .get(format!("{}/alerts/deliveries", srv.base_url))
        .header("x-user-roles", "admin")
        .send()
        .await
        .unwrap();
    let pending: Vec<serde_json::Value> = res.json().await.unwrap();
    assert!(pending.is_empty());
}

#[tokio::test]
async fn audit_records_a_rule_mutation() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/alerts/rules", srv.base_url))
        .header("x-tenant-id", "acme")
        .header("x-user-roles", "admin")
        .json(&json!({"name": "x", "window_seconds": 60, "threshold": 3}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/audit/operator", srv.base_url))
        .header("x-user-roles", "admin")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let records: Vec<serde_json::Value> = res.json().await.unwrap();
    assert!(records.iter().any(|r| r["action"] == "rule.create"));
}
