use crate::model::{Alert, AlertSeverity, AlertSummary, AlertThresholds};
use beacon_node::{NodeAggregator, NodeView};
use beacon_store::{alert_state, AlertStatePatch, Result, StoreError, TelemetryStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// 告警引擎
///
/// 规则本身无状态，每次调用基于最新节点快照重新评估；持久化的
/// 状态只有确认/静默/通知三类字段，评估时合入。
pub struct AlertEngine {
    store: Arc<TelemetryStore>,
    aggregator: Arc<NodeAggregator>,
    thresholds: AlertThresholds,
}

impl AlertEngine {
    pub fn new(
        store: Arc<TelemetryStore>,
        aggregator: Arc<NodeAggregator>,
        thresholds: AlertThresholds,
    ) -> Self {
        Self {
            store,
            aggregator,
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// 评估当前告警列表
    pub async fn evaluate(&self, full: bool, now: i64) -> Result<AlertSummary> {
        let snapshot = self.aggregator.snapshot(full, now).await?;
        let states = self.store.alert_states().await?;

        let mut alerts = evaluate_rules(&snapshot.nodes, now, &self.thresholds);
        enrich(&mut alerts, &states, now);
        // critical 置前，桶内保持生成顺序
        alerts.sort_by_key(|a| a.severity != AlertSeverity::Critical);

        let critical = alerts
            .iter()
            .filter(|a| a.severity == AlertSeverity::Critical)
            .count();
        let actionable_critical = alerts
            .iter()
            .filter(|a| a.severity == AlertSeverity::Critical && a.actionable)
            .count();

        debug!(
            total = alerts.len(),
            critical = critical,
            "Alerts evaluated"
        );

        Ok(AlertSummary {
            ts: snapshot.ts,
            masked: snapshot.masked,
            total: alerts.len(),
            critical,
            warn: alerts.len() - critical,
            actionable_critical,
            thresholds: self.thresholds.clone(),
            items: alerts,
        })
    }

    /// 确认告警
    pub async fn ack(&self, alert_id: &str, actor: &str, now: i64) -> Result<()> {
        if alert_id.is_empty() {
            return Err(StoreError::validation("missing alert_id"));
        }

        self.store
            .upsert_alert_state(alert_id, AlertStatePatch::ack(actor, now), now)
            .await?;
        self.store
            .append_event(
                now,
                None,
                "info",
                "alert_ack",
                &format!("alert ack: {}", alert_id),
                None,
            )
            .await?;

        info!(alert_id = %alert_id, actor = %actor, "Alert acknowledged");
        Ok(())
    }

    /// 静默告警指定分钟数（至少 1 分钟），返回静默截止时间
    pub async fn silence(&self, alert_id: &str, minutes: i64, now: i64) -> Result<i64> {
        if alert_id.is_empty() {
            return Err(StoreError::validation("missing alert_id"));
        }

        let minutes = minutes.max(1);
        let until = now + minutes * 60;
        self.store
            .upsert_alert_state(alert_id, AlertStatePatch::silence_until(until), now)
            .await?;
        self.store
            .append_event(
                now,
                None,
                "info",
                "alert_silence",
                &format!("alert silence: {}", alert_id),
                Some(serde_json::json!({ "minutes": minutes, "until": until })),
            )
            .await?;

        info!(alert_id = %alert_id, minutes = minutes, "Alert silenced");
        Ok(until)
    }
}

/// 对节点列表执行阈值规则，产出原始告警
///
/// 离线与心跳延迟互斥：离线节点不再单独报延迟。百分比的分母缺失
/// 或为 0 时按 0% 处理，不触发除零。
pub fn evaluate_rules(nodes: &[NodeView], now: i64, thresholds: &AlertThresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for node in nodes {
        let metrics = node.metrics.as_ref();
        let mem_pct = percent(
            metrics.and_then(|m| m.mem_used_bytes),
            metrics.and_then(|m| m.mem_total_bytes),
        );
        let disk_pct = percent(
            metrics.and_then(|m| m.disk_used_bytes),
            metrics.and_then(|m| m.disk_total_bytes),
        );
        let stale_sec = (now - node.last_heartbeat_ts).max(0);

        if !node.online {
            alerts.push(Alert::raw(
                format!("{}:offline", node.agent_id),
                now,
                AlertSeverity::Critical,
                "offline",
                &node.agent_id,
                &node.name,
                "节点离线（心跳超时）",
                stale_sec as f64,
                thresholds.offline_sec as f64,
            ));
        } else if stale_sec >= thresholds.stale_sec {
            alerts.push(Alert::raw(
                format!("{}:stale", node.agent_id),
                now,
                AlertSeverity::Warn,
                "stale",
                &node.agent_id,
                &node.name,
                "节点心跳延迟",
                stale_sec as f64,
                thresholds.stale_sec as f64,
            ));
        }

        let cpu = metrics.and_then(|m| m.cpu_percent).unwrap_or(0.0);
        if cpu >= thresholds.cpu_high {
            alerts.push(Alert::raw(
                format!("{}:cpu", node.agent_id),
                now,
                AlertSeverity::Warn,
                "cpu_high",
                &node.agent_id,
                &node.name,
                "CPU 使用率过高",
                cpu,
                thresholds.cpu_high,
            ));
        }
        if mem_pct >= thresholds.mem_high {
            alerts.push(Alert::raw(
                format!("{}:mem", node.agent_id),
                now,
                AlertSeverity::Warn,
                "mem_high",
                &node.agent_id,
                &node.name,
                "内存使用率过高",
                round1(mem_pct),
                thresholds.mem_high,
            ));
        }
        if disk_pct >= thresholds.disk_high {
            alerts.push(Alert::raw(
                format!("{}:disk", node.agent_id),
                now,
                AlertSeverity::Warn,
                "disk_high",
                &node.agent_id,
                &node.name,
                "磁盘使用率过高",
                round1(disk_pct),
                thresholds.disk_high,
            ));
        }
    }

    alerts
}

/// 合入持久化的确认/静默状态
pub fn enrich(alerts: &mut [Alert], states: &HashMap<String, alert_state::Model>, now: i64) {
    for alert in alerts {
        if let Some(state) = states.get(&alert.id) {
            alert.acked = state.acked != 0;
            alert.acked_at = state.acked_at;
            alert.acked_by = state.acked_by.clone();
            alert.silence_until = state.silence_until;
            alert.silenced = state.silence_until.map(|su| now < su).unwrap_or(false);
        }
        alert.actionable = !alert.silenced && !alert.acked;
    }
}

fn percent(used: Option<i64>, total: Option<i64>) -> f64 {
    match total {
        Some(total) if total > 0 => used.unwrap_or(0) as f64 / total as f64 * 100.0,
        _ => 0.0,
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
