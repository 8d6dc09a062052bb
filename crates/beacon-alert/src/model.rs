use serde::{Deserialize, Serialize};

/// 告警级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    Warn,
}

/// 告警阈值配置（随结果返回供前端展示）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertThresholds {
    pub cpu_high: f64,
    pub mem_high: f64,
    pub disk_high: f64,
    pub stale_sec: i64,
    pub offline_sec: i64,
}

/// 单条告警（每次评估重新派生，不落库）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// 确定性标识 `"<agent_id>:<kind>"`，跨重启可复现
    pub id: String,
    pub ts: i64,
    pub severity: AlertSeverity,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub agent_id: String,
    /// 关联节点显示名（随视图脱敏）
    pub node: String,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
    // 以下字段由持久化的告警状态合入
    pub acked: bool,
    pub acked_at: Option<i64>,
    pub acked_by: Option<String>,
    pub silence_until: Option<i64>,
    pub silenced: bool,
    /// 未确认且未静默
    pub actionable: bool,
}

impl Alert {
    pub fn raw(
        id: String,
        ts: i64,
        severity: AlertSeverity,
        alert_type: &str,
        agent_id: &str,
        node: &str,
        message: &str,
        value: f64,
        threshold: f64,
    ) -> Self {
        Self {
            id,
            ts,
            severity,
            alert_type: alert_type.to_string(),
            agent_id: agent_id.to_string(),
            node: node.to_string(),
            message: message.to_string(),
            value,
            threshold,
            acked: false,
            acked_at: None,
            acked_by: None,
            silence_until: None,
            silenced: false,
            actionable: true,
        }
    }
}

/// 告警评估结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSummary {
    pub ts: i64,
    pub masked: bool,
    pub total: usize,
    pub critical: usize,
    pub warn: usize,
    pub actionable_critical: usize,
    pub thresholds: AlertThresholds,
    pub items: Vec<Alert>,
}
