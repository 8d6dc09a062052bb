use crate::error::ApiError;
use crate::handlers::{admin, agent, alerts, logs, nodes, providers, ws, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

async fn not_found() -> ApiError {
    ApiError::NotFound("not found".to_string())
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(nodes::healthz))
        // 采集入口
        .route("/api/agent/register", post(agent::register))
        .route("/api/agent/heartbeat", post(agent::heartbeat))
        // 查询
        .route("/api/nodes", get(nodes::nodes))
        .route("/api/system/health", get(nodes::system_health))
        .route("/api/alerts", get(alerts::list))
        .route("/api/logs", get(logs::list))
        .route("/api/providers", get(providers::matrix))
        // 管理
        .route("/api/auth/check", get(admin::auth_check))
        .route("/api/admin/me", get(admin::me))
        .route("/api/admin/login", post(admin::login))
        .route("/api/admin/logout", post(admin::logout))
        .route("/api/alerts/ack", post(alerts::ack))
        .route("/api/alerts/silence", post(alerts::silence))
        .route("/api/notify/status", get(alerts::notify_status))
        .route("/api/audit", get(admin::audit))
        .route("/api/audit/export.csv", get(admin::audit_export_csv))
        .route("/api/retention/status", get(admin::retention_status))
        .route("/api/retention/run", post(admin::retention_run))
        // 推送通道
        .route("/ws", get(ws::upgrade))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
