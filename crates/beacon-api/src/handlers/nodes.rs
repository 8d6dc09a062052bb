use crate::error::ApiError;
use crate::handlers::{AppState, ViewQuery};
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use beacon_core::now_sec;
use beacon_node::NodeSnapshot;
use beacon_probe::ProbeResult;
use serde::Serialize;
use std::collections::HashMap;

/// 存活探针
pub async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true, "ts": now_sec() }))
}

/// 当前节点快照
pub async fn nodes(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<ViewQuery>,
) -> Result<Json<NodeSnapshot>, ApiError> {
    let ctx = state.view(&headers, q.token.as_deref());
    let snapshot = state.aggregator.snapshot(ctx.full, now_sec()).await?;
    Ok(Json(snapshot))
}

#[derive(Debug, Serialize)]
pub struct NodeCounts {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
}

#[derive(Debug, Serialize)]
pub struct DatabaseStats {
    pub path: String,
    pub events: u64,
    pub heartbeats: u64,
}

#[derive(Debug, Serialize)]
pub struct RetentionInfo {
    pub events_days: i64,
    pub heartbeats_days: i64,
    pub last_cleanup_ts: Option<i64>,
}

/// 系统健康汇总响应
#[derive(Debug, Serialize)]
pub struct SystemHealthResponse {
    pub ok: bool,
    pub ts: i64,
    pub uptime_sec: i64,
    pub ws_clients: usize,
    pub nodes: NodeCounts,
    pub database: DatabaseStats,
    pub retention: RetentionInfo,
    pub providers: HashMap<String, ProbeResult>,
}

/// 系统健康汇总
pub async fn system_health(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<ViewQuery>,
) -> Result<Json<SystemHealthResponse>, ApiError> {
    let ctx = state.view(&headers, q.token.as_deref());
    let ts = now_sec();

    let snapshot = state.aggregator.snapshot(ctx.full, ts).await?;
    let providers = state.probe.probe_all().await;
    let online = snapshot.nodes.iter().filter(|n| n.online).count();
    let events = state.store.event_count().await?;
    let heartbeats = state.store.heartbeat_count().await?;
    let last_cleanup = state.store.last_event_of_type("retention_cleanup").await?;
    let policy = state.retention.policy();

    Ok(Json(SystemHealthResponse {
        ok: true,
        ts,
        uptime_sec: (ts - state.started_at).max(0),
        ws_clients: state.hub.viewer_count().await,
        nodes: NodeCounts {
            total: snapshot.nodes.len(),
            online,
            offline: snapshot.nodes.len().saturating_sub(online),
        },
        database: DatabaseStats {
            path: state.db_path.clone(),
            events,
            heartbeats,
        },
        retention: RetentionInfo {
            events_days: policy.events_days,
            heartbeats_days: policy.heartbeats_days,
            last_cleanup_ts: last_cleanup.map(|e| e.ts),
        },
        providers,
    }))
}
