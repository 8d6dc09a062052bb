use crate::error::ApiError;
use crate::handlers::{AppState, ViewQuery};
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use beacon_core::now_sec;
use beacon_probe::NodeProviderStatus;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    pub ts: i64,
    pub masked: bool,
    pub items: Vec<NodeProviderStatus>,
}

/// provider 可用性矩阵
pub async fn matrix(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<ViewQuery>,
) -> Result<Json<ProvidersResponse>, ApiError> {
    let ctx = state.view(&headers, q.token.as_deref());
    let snapshot = state.aggregator.snapshot(ctx.full, now_sec()).await?;
    let probes = state.probe.probe_all().await;
    let items = state.probe.matrix(&probes, &snapshot.nodes);

    Ok(Json(ProvidersResponse {
        ts: snapshot.ts,
        masked: snapshot.masked,
        items,
    }))
}
