pub mod admin;
pub mod agent;
pub mod alerts;
pub mod logs;
pub mod nodes;
pub mod providers;
pub mod ws;

use crate::error::ApiError;
use crate::view::{cookie_value, view_context};
use axum::http::HeaderMap;
use beacon_alert::{AlertEngine, AlertNotifier};
use beacon_auth::{Claims, SessionAuth, SESSION_COOKIE};
use beacon_core::EventBus;
use beacon_hub::BroadcastHub;
use beacon_node::NodeAggregator;
use beacon_probe::ProviderProbe;
use beacon_retention::RetentionManager;
use beacon_store::TelemetryStore;
use serde::Deserialize;
use std::sync::Arc;

/// 应用状态
///
/// 所有组件在进程启动时构建并注入，没有模块级单例。
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TelemetryStore>,
    pub aggregator: Arc<NodeAggregator>,
    pub alerts: Arc<AlertEngine>,
    pub notifier: Arc<AlertNotifier>,
    pub hub: Arc<BroadcastHub>,
    pub auth: Arc<SessionAuth>,
    pub probe: Arc<ProviderProbe>,
    pub retention: Arc<RetentionManager>,
    pub bus: EventBus,
    pub db_path: String,
    pub started_at: i64,
}

impl AppState {
    /// 校验管理会话，失败返回 401
    pub fn require_admin(&self, headers: &HeaderMap) -> Result<Claims, ApiError> {
        cookie_value(headers, SESSION_COOKIE)
            .and_then(|token| self.auth.verify(&token))
            .ok_or_else(|| ApiError::Unauthorized("admin required".to_string()))
    }

    /// 请求的视图上下文
    pub fn view(&self, headers: &HeaderMap, query_token: Option<&str>) -> crate::view::ViewContext {
        view_context(self, headers, query_token)
    }
}

/// 仅携带视图令牌的查询参数
#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    pub token: Option<String>,
}

/// 分页查询参数
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<u64>,
    pub token: Option<String>,
}

impl PageQuery {
    /// page >= 1；pageSize 限制在 1..=200，默认 50
    pub fn normalized(&self) -> (u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let page_size = self.page_size.unwrap_or(50).clamp(1, 200);
        (page, page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_normalization() {
        let q = PageQuery::default();
        assert_eq!(q.normalized(), (1, 50));

        let q = PageQuery {
            page: Some(0),
            page_size: Some(10_000),
            token: None,
        };
        assert_eq!(q.normalized(), (1, 200));

        let q = PageQuery {
            page: Some(2),
            page_size: Some(10),
            token: None,
        };
        assert_eq!(q.normalized(), (2, 10));
    }
}
