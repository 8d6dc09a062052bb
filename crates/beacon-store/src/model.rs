use serde::{Deserialize, Serialize};

/// 注册请求（经 API 层校验后的字段）
#[derive(Debug, Clone, Deserialize)]
pub struct NewAgent {
    pub name: String,
    pub hostname: String,
    pub ip: String,
    pub os: String,
}

/// 心跳写入样本，所有指标可缺省
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewHeartbeat {
    pub cpu_percent: Option<f64>,
    pub mem_used_bytes: Option<i64>,
    pub mem_total_bytes: Option<i64>,
    pub disk_used_bytes: Option<i64>,
    pub disk_total_bytes: Option<i64>,
    pub swap_used_bytes: Option<i64>,
    pub swap_total_bytes: Option<i64>,
    pub uptime_sec: Option<i64>,
    pub load_1m: Option<f64>,
}

/// 事件查询过滤条件
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub level: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub agent_id: Option<String>,
}

/// 分页结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub total_pages: u64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(page: u64, page_size: u64, total: u64, items: Vec<T>) -> Self {
        Self {
            page,
            page_size,
            total,
            total_pages: (total + page_size - 1) / page_size.max(1),
            items,
        }
    }
}

/// 告警状态部分更新
///
/// 仅 Some 的字段被写入，其余字段保持既有值（不是整行覆盖）。
#[derive(Debug, Clone, Default)]
pub struct AlertStatePatch {
    pub acked: Option<bool>,
    pub acked_at: Option<i64>,
    pub acked_by: Option<String>,
    pub silence_until: Option<i64>,
    pub last_notified_at: Option<i64>,
}

impl AlertStatePatch {
    /// 确认告警
    pub fn ack(actor: impl Into<String>, ts: i64) -> Self {
        Self {
            acked: Some(true),
            acked_at: Some(ts),
            acked_by: Some(actor.into()),
            ..Default::default()
        }
    }

    /// 静默告警至指定时刻
    pub fn silence_until(until: i64) -> Self {
        Self {
            silence_until: Some(until),
            ..Default::default()
        }
    }

    /// 记录最近一次通知时间
    pub fn notified_at(ts: i64) -> Self {
        Self {
            last_notified_at: Some(ts),
            ..Default::default()
        }
    }
}
