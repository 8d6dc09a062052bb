use crate::error::ApiError;
use crate::handlers::AppState;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use beacon_store::{event, EventFilter, Page};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    pub page: Option<u64>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<u64>,
    pub level: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub agent_id: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    #[serde(flatten)]
    pub page: Page<event::Model>,
    pub masked: bool,
}

/// 事件日志分页查询
///
/// 受限视图下消息被泛化、agent id 被截断。
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<LogsQuery>,
) -> Result<Json<LogsResponse>, ApiError> {
    let ctx = state.view(&headers, q.token.as_deref());
    let page = q.page.unwrap_or(1).max(1);
    let page_size = q.page_size.unwrap_or(50).clamp(1, 200);

    let filter = EventFilter {
        level: q.level.filter(|s| !s.is_empty()),
        event_type: q.event_type.filter(|s| !s.is_empty()),
        agent_id: q.agent_id.filter(|s| !s.is_empty()),
    };

    let mut result = state.store.events_page(&filter, page, page_size).await?;
    if !ctx.full {
        for item in &mut result.items {
            item.message = if item.event_type == "heartbeat" {
                "heartbeat received".to_string()
            } else {
                "event".to_string()
            };
            item.agent_id = item.agent_id.take().map(mask_agent_id);
        }
    }

    Ok(Json(LogsResponse {
        page: result,
        masked: !ctx.full,
    }))
}

fn mask_agent_id(id: String) -> String {
    let head: String = id.chars().take(10).collect();
    format!("{}***", head)
}
