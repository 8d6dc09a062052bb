use crate::handlers::AppState;
use axum::http::HeaderMap;
use beacon_auth::{Claims, SESSION_COOKIE};

/// 一次请求的视图上下文
#[derive(Debug, Clone)]
pub struct ViewContext {
    /// 是否授予完整（未脱敏）视图
    pub full: bool,
    /// 有效的管理会话（如有）
    pub admin: Option<Claims>,
}

/// 解析请求的视图级别
///
/// 管理会话来自 cookie；面板令牌可经 Authorization Bearer、
/// `x-dashboard-token` 头或 `?token=` 查询参数提交。
pub fn view_context(state: &AppState, headers: &HeaderMap, query_token: Option<&str>) -> ViewContext {
    let admin = cookie_value(headers, SESSION_COOKIE)
        .and_then(|token| state.auth.verify(&token));
    let provided = provided_token(headers, query_token);
    let full = state.auth.is_full_view(admin.is_some(), provided.as_deref());
    ViewContext { full, admin }
}

/// 从 Cookie 头取指定名称的值
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get("cookie")?.to_str().ok()?;
    for part in raw.split(';') {
        if let Some((k, v)) = part.split_once('=') {
            if k.trim() == name {
                return Some(v.trim().to_string());
            }
        }
    }
    None
}

/// 提交的面板令牌：Bearer 头 > 专用头 > 查询参数
pub fn provided_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    if let Some(auth) = headers.get("authorization").and_then(|h| h.to_str().ok()) {
        if let Some(token) = auth.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }
    if let Some(x) = headers
        .get("x-dashboard-token")
        .and_then(|h| h.to_str().ok())
    {
        let x = x.trim();
        if !x.is_empty() {
            return Some(x.to_string());
        }
    }
    query_token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// 客户端来源信息（审计事件的元数据）
pub fn client_info(headers: &HeaderMap) -> serde_json::Value {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");
    let ua = headers
        .get("user-agent")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");
    serde_json::json!({ "ip": ip, "ua": ua })
}
