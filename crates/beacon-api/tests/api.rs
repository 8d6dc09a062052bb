use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use beacon_alert::{AlertEngine, AlertNotifier, AlertThresholds};
use beacon_api::{create_router, AppState};
use beacon_auth::SessionAuth;
use beacon_core::{now_sec, EventBus};
use beacon_hub::BroadcastHub;
use beacon_node::NodeAggregator;
use beacon_probe::ProviderProbe;
use beacon_retention::{RetentionManager, RetentionPolicy};
use beacon_store::TelemetryStore;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

async fn test_router(dashboard_token: Option<&str>) -> Router {
    let store = Arc::new(TelemetryStore::connect("sqlite::memory:").await.unwrap());
    store.init_schema().await.unwrap();

    let aggregator = Arc::new(NodeAggregator::new(store.clone(), 45));
    let alerts = Arc::new(AlertEngine::new(
        store.clone(),
        aggregator.clone(),
        AlertThresholds {
            cpu_high: 90.0,
            mem_high: 90.0,
            disk_high: 90.0,
            stale_sec: 60,
            offline_sec: 45,
        },
    ));
    let notifier = Arc::new(AlertNotifier::new(
        alerts.clone(),
        store.clone(),
        None,
        false,
        300,
    ));
    let auth = Arc::new(SessionAuth::new(
        "test-secret".to_string(),
        3600,
        "admin".to_string(),
        Some("hunter2".to_string()),
        dashboard_token.map(|s| s.to_string()),
    ));

    let state = AppState {
        store: store.clone(),
        aggregator,
        alerts,
        notifier,
        hub: Arc::new(BroadcastHub::new()),
        auth,
        probe: Arc::new(ProviderProbe::new(HashMap::new())),
        retention: Arc::new(RetentionManager::new(store, RetentionPolicy::new(30, 14))),
        bus: EventBus::new(16),
        db_path: ":memory:".to_string(),
        started_at: now_sec(),
    };
    create_router(state)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn register_agent(router: &Router) -> (String, String) {
    let response = router
        .clone()
        .oneshot(post_json(
            "/api/agent/register",
            serde_json::json!({
                "name": "web-01",
                "hostname": "web-01.local",
                "ip": "192.168.1.10",
                "os": "linux"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    (
        body["agent_id"].as_str().unwrap().to_string(),
        body["token"].as_str().unwrap().to_string(),
    )
}

async fn admin_cookie(router: &Router) -> String {
    let response = router
        .clone()
        .oneshot(post_json(
            "/api/admin/login",
            serde_json::json!({ "username": "admin", "password": "hunter2" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn test_healthz() {
    let router = test_router(None).await;
    let response = router.oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["ok"], true);
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let router = test_router(None).await;
    let response = router.oneshot(get("/api/unknown")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "not found");
}

#[tokio::test]
async fn test_register_validation() {
    let router = test_router(None).await;
    let response = router
        .oneshot(post_json(
            "/api/agent/register",
            serde_json::json!({ "name": "web-01", "ip": "1.2.3.4", "os": "linux" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "missing field: hostname");
}

#[tokio::test]
async fn test_register_heartbeat_nodes_flow() {
    let router = test_router(None).await;
    let (agent_id, token) = register_agent(&router).await;

    // 无令牌心跳被拒
    let response = router
        .clone()
        .oneshot(post_json("/api/agent/heartbeat", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // 携带承载令牌
    let request = Request::builder()
        .method("POST")
        .uri("/api/agent/heartbeat")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(
            serde_json::json!({ "cpu_percent": 12.5, "mem_used_bytes": 1024, "mem_total_bytes": 4096 })
                .to_string(),
        ))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router.clone().oneshot(get("/api/nodes")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["masked"], false);
    assert_eq!(body["nodes"].as_array().unwrap().len(), 1);
    let node = &body["nodes"][0];
    assert_eq!(node["agent_id"], agent_id.as_str());
    assert_eq!(node["online"], true);
    assert_eq!(node["metrics"]["cpu_percent"], 12.5);
    assert_eq!(node["merged_agents"], 1);
}

#[tokio::test]
async fn test_alert_ack_cycle_over_http() {
    let router = test_router(None).await;
    let (_agent_id, token) = register_agent(&router).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/agent/heartbeat")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(serde_json::json!({ "cpu_percent": 95.0 }).to_string()))
        .unwrap();
    router.clone().oneshot(request).await.unwrap();

    let response = router.clone().oneshot(get("/api/alerts")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["warn"], 1);
    let alert = &body["items"][0];
    assert_eq!(alert["type"], "cpu_high");
    assert_eq!(alert["value"], 95.0);
    assert_eq!(alert["actionable"], true);
    let alert_id = alert["id"].as_str().unwrap().to_string();

    // 未登录确认被拒
    let response = router
        .clone()
        .oneshot(post_json(
            "/api/alerts/ack",
            serde_json::json!({ "alert_id": alert_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // 登录后确认
    let cookie = admin_cookie(&router).await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/alerts/ack")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, cookie.clone())
        .body(Body::from(serde_json::json!({ "alert_id": alert_id }).to_string()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // 告警重新出现但已确认、不可操作
    let response = router.clone().oneshot(get("/api/alerts")).await.unwrap();
    let body = body_json(response).await;
    let alert = &body["items"][0];
    assert_eq!(alert["acked"], true);
    assert_eq!(alert["acked_by"], "admin");
    assert_eq!(alert["actionable"], false);
}

#[tokio::test]
async fn test_login_failures() {
    let router = test_router(None).await;
    let response = router
        .clone()
        .oneshot(post_json(
            "/api/admin/login",
            serde_json::json!({ "username": "admin", "password": "wrong" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_fail_open_view_without_token_config() {
    let router = test_router(None).await;
    // 未配置面板令牌：匿名访问也拿到完整视图（文档化的 fail-open）
    let response = router.clone().oneshot(get("/api/auth/check")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["full"], true);
    assert_eq!(body["token_required"], false);
    assert_eq!(body["admin_logged_in"], false);
}

#[tokio::test]
async fn test_token_gated_masked_view() {
    let router = test_router(Some("viewkey")).await;
    let (_agent_id, _token) = register_agent(&router).await;

    // 无令牌：脱敏视图
    let response = router.clone().oneshot(get("/api/nodes")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["masked"], true);
    assert_eq!(body["nodes"][0]["ip"], "192.168.*.*");

    // 查询参数携带令牌：完整视图
    let response = router
        .clone()
        .oneshot(get("/api/nodes?token=viewkey"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["masked"], false);
    assert_eq!(body["nodes"][0]["ip"], "192.168.1.10");
}

#[tokio::test]
async fn test_admin_endpoints_require_session() {
    let router = test_router(None).await;
    for uri in ["/api/audit", "/api/retention/status", "/api/notify/status"] {
        let response = router.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }

    let cookie = admin_cookie(&router).await;
    let request = Request::builder()
        .uri("/api/audit")
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    // 登录本身已记入审计
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["type"], "admin_login");
}

#[tokio::test]
async fn test_logs_masked_for_restricted_view() {
    let router = test_router(Some("viewkey")).await;
    let (agent_id, _token) = register_agent(&router).await;

    let response = router.clone().oneshot(get("/api/logs")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["masked"], true);
    let item = &body["items"][0];
    assert_eq!(item["message"], "event");
    let masked_id = item["agent_id"].as_str().unwrap();
    assert!(masked_id.ends_with("***"));
    assert_ne!(masked_id, agent_id.as_str());

    let response = router
        .clone()
        .oneshot(get("/api/logs?token=viewkey"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["masked"], false);
    assert!(body["items"][0]["message"]
        .as_str()
        .unwrap()
        .starts_with("agent registered"));
}
