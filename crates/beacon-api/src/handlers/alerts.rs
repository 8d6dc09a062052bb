use crate::error::ApiError;
use crate::handlers::{AppState, ViewQuery};
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use beacon_alert::AlertSummary;
use beacon_core::now_sec;
use serde::Deserialize;

/// 当前告警列表
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<ViewQuery>,
) -> Result<Json<AlertSummary>, ApiError> {
    let ctx = state.view(&headers, q.token.as_deref());
    let summary = state.alerts.evaluate(ctx.full, now_sec()).await?;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
pub struct AckRequest {
    pub alert_id: Option<String>,
}

/// 确认告警（管理员）
pub async fn ack(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AckRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let claims = state.require_admin(&headers)?;
    let alert_id = req
        .alert_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing alert_id".to_string()))?;

    state.alerts.ack(&alert_id, &claims.sub, now_sec()).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct SilenceRequest {
    pub alert_id: Option<String>,
    pub minutes: Option<i64>,
}

/// 静默告警指定分钟数（管理员）
pub async fn silence(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SilenceRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.require_admin(&headers)?;
    let alert_id = req
        .alert_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing alert_id".to_string()))?;
    let minutes = req.minutes.unwrap_or(30);

    let until = state.alerts.silence(&alert_id, minutes, now_sec()).await?;
    Ok(Json(serde_json::json!({ "ok": true, "silence_until": until })))
}

/// 外发通知配置状态（管理员）
pub async fn notify_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.require_admin(&headers)?;
    Ok(Json(serde_json::json!({
        "ok": true,
        "enabled": state.notifier.is_enabled(),
        "provider_configured": state.notifier.provider_configured(),
        "min_interval_sec": state.notifier.min_interval_sec(),
    })))
}
