use crate::error::ApiError;
use crate::handlers::{AppState, PageQuery};
use crate::view::{client_info, cookie_value, view_context};
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use beacon_auth::SESSION_COOKIE;
use beacon_core::now_sec;
use beacon_retention::RetentionStats;
use beacon_store::{event, Page};
use serde::Deserialize;

/// 访问级别检查
pub async fn auth_check(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<crate::handlers::ViewQuery>,
) -> Json<serde_json::Value> {
    let ctx = view_context(&state, &headers, q.token.as_deref());
    Json(serde_json::json!({
        "ok": true,
        "full": ctx.full,
        "token_required": state.auth.token_required(),
        "admin_logged_in": ctx.admin.is_some(),
    }))
}

/// 当前管理会话信息
pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> Json<serde_json::Value> {
    let claims = cookie_value(&headers, SESSION_COOKIE).and_then(|t| state.auth.verify(&t));
    Json(serde_json::json!({
        "ok": true,
        "logged_in": claims.is_some(),
        "user": claims.map(|c| c.sub),
    }))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// 管理登录：校验口令并下发会话 cookie
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let session = state.auth.login(&req.username, &req.password)?;
    let user = state.auth.admin_user().to_string();
    let ts = now_sec();

    state
        .store
        .append_event(
            ts,
            None,
            "info",
            "admin_login",
            &format!("admin login: {}", user),
            Some(client_info(&headers)),
        )
        .await?;

    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        session,
        state.auth.session_ttl_sec()
    );
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({ "ok": true, "user": user })),
    )
        .into_response())
}

/// 管理登出
///
/// 服务端不保存会话表，仅清除客户端 cookie：尚未过期的凭证在别处
/// 仍然有效，凭证自带的过期时间是唯一的失效机制。
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let ts = now_sec();
    state
        .store
        .append_event(
            ts,
            None,
            "info",
            "admin_logout",
            "admin logout",
            Some(client_info(&headers)),
        )
        .await?;

    let cookie = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE);
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({ "ok": true })),
    )
        .into_response())
}

/// 审计日志分页（管理员）
pub async fn audit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<PageQuery>,
) -> Result<Json<Page<event::Model>>, ApiError> {
    state.require_admin(&headers)?;
    let (page, page_size) = q.normalized();
    let result = state.store.audit_page(page, page_size).await?;
    Ok(Json(result))
}

/// 审计日志 CSV 导出（管理员，最新 1000 条）
pub async fn audit_export_csv(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    state.require_admin(&headers)?;
    let rows = state.store.audit_export(1000).await?;

    let mut lines = vec!["ts,level,type,message,meta_json".to_string()];
    for row in rows {
        let fields = [
            row.ts.to_string(),
            row.level,
            row.event_type,
            row.message,
            row.meta_json.unwrap_or_default(),
        ];
        lines.push(
            fields
                .iter()
                .map(|f| csv_escape(f))
                .collect::<Vec<_>>()
                .join(","),
        );
    }

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"beacon-audit.csv\"",
            ),
        ],
        lines.join("\n"),
    )
        .into_response())
}

/// 保留状态（管理员）
pub async fn retention_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.require_admin(&headers)?;
    let policy = state.retention.policy();
    Ok(Json(serde_json::json!({
        "ok": true,
        "retention_events_days": policy.events_days,
        "retention_heartbeats_days": policy.heartbeats_days,
        "counts": {
            "events": state.store.event_count().await?,
            "heartbeats": state.store.heartbeat_count().await?,
        },
    })))
}

#[derive(Debug, serde::Serialize)]
pub struct RetentionRunResponse {
    pub ok: bool,
    pub result: RetentionStats,
}

/// 立即执行一次保留清扫（管理员）
pub async fn retention_run(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RetentionRunResponse>, ApiError> {
    state.require_admin(&headers)?;
    let stats = state.retention.sweep(now_sec()).await?;
    Ok(Json(RetentionRunResponse {
        ok: true,
        result: stats,
    }))
}

fn csv_escape(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
