use crate::engine::AlertEngine;
use crate::model::{Alert, AlertSeverity};
use anyhow::Result;
use beacon_notify::{Notifier, NotifyMessage};
use beacon_store::{AlertStatePatch, TelemetryStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 告警通知任务
///
/// 周期运行：以完整视图重新评估告警，向仍可操作的 critical 告警
/// 发送外发通知，按 `min_interval_sec` 对同一告警限流。发送失败只
/// 记事件不更新限流时间戳，下个周期会立即重试。
pub struct AlertNotifier {
    engine: Arc<AlertEngine>,
    store: Arc<TelemetryStore>,
    provider: Option<Arc<dyn Notifier>>,
    enabled: bool,
    min_interval_sec: i64,
}

impl AlertNotifier {
    pub fn new(
        engine: Arc<AlertEngine>,
        store: Arc<TelemetryStore>,
        provider: Option<Arc<dyn Notifier>>,
        enabled: bool,
        min_interval_sec: i64,
    ) -> Self {
        Self {
            engine,
            store,
            provider,
            enabled,
            min_interval_sec,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn provider_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub fn min_interval_sec(&self) -> i64 {
        self.min_interval_sec
    }

    /// 执行一轮通知，返回实际发出的条数
    pub async fn run_once(&self, now: i64) -> Result<usize> {
        if !self.enabled {
            return Ok(0);
        }

        let summary = self.engine.evaluate(true, now).await?;
        let targets: Vec<&Alert> = summary
            .items
            .iter()
            .filter(|a| a.severity == AlertSeverity::Critical && a.actionable)
            .collect();

        let mut sent = 0;
        for alert in targets {
            let state = self.store.alert_state(&alert.id).await?;
            let last = state.and_then(|s| s.last_notified_at).unwrap_or(0);
            if last > 0 && now - last < self.min_interval_sec {
                debug!(alert_id = %alert.id, "Notification throttled");
                continue;
            }

            match self.dispatch(alert, now).await {
                Ok(status) => {
                    self.store
                        .upsert_alert_state(&alert.id, AlertStatePatch::notified_at(now), now)
                        .await?;
                    self.store
                        .append_event(
                            now,
                            Some(&alert.agent_id),
                            "warn",
                            "alert_notified",
                            &format!("notified: {}", alert.id),
                            Some(serde_json::json!({ "status": status })),
                        )
                        .await?;
                    sent += 1;
                    info!(alert_id = %alert.id, "Alert notification sent");
                }
                Err(reason) => {
                    // 失败不回写 last_notified_at，下个周期重试
                    self.store
                        .append_event(
                            now,
                            Some(&alert.agent_id),
                            "warn",
                            "alert_notify_failed",
                            &format!("notify failed: {}", alert.id),
                            Some(serde_json::json!({ "reason": reason })),
                        )
                        .await?;
                    warn!(alert_id = %alert.id, reason = %reason, "Alert notification failed");
                }
            }
        }

        Ok(sent)
    }

    /// 实际外发；失败时返回原因描述
    async fn dispatch(&self, alert: &Alert, now: i64) -> std::result::Result<u16, String> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| "notifier not configured".to_string())?;

        let time = chrono::DateTime::from_timestamp(now, 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        let content = [
            format!("Node: {}", alert.node),
            format!("Type: {}", alert.alert_type),
            format!("Message: {}", alert.message),
            format!("Value/Threshold: {} / {}", alert.value, alert.threshold),
            format!("Time: {}", time),
        ]
        .join("\n");
        let message = NotifyMessage::critical("🚨 BEACON Critical Alert", content);

        match provider.send(&message).await {
            Ok(result) if result.success => Ok(result.status.unwrap_or(200)),
            Ok(result) => Err(result.message),
            Err(e) => Err(e.to_string()),
        }
    }
}
