use beacon_store::{Result, TelemetryStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// 保留策略（按行类配置的天数上限）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub events_days: i64,
    pub heartbeats_days: i64,
}

impl RetentionPolicy {
    pub fn new(events_days: i64, heartbeats_days: i64) -> Self {
        Self {
            events_days,
            heartbeats_days,
        }
    }

    /// 两类数据的删除截止时间；天数下限为 1
    pub fn cutoffs(&self, now: i64) -> (i64, i64) {
        let events_before = now - self.events_days.max(1) * 86_400;
        let heartbeats_before = now - self.heartbeats_days.max(1) * 86_400;
        (events_before, heartbeats_before)
    }
}

/// 一次清扫的结果摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionStats {
    pub ts: i64,
    pub events_deleted: u64,
    pub heartbeats_deleted: u64,
    pub retention_events_days: i64,
    pub retention_heartbeats_days: i64,
}

/// 数据保留管理器
pub struct RetentionManager {
    store: Arc<TelemetryStore>,
    policy: RetentionPolicy,
}

impl RetentionManager {
    pub fn new(store: Arc<TelemetryStore>, policy: RetentionPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// 执行一次清扫
    ///
    /// 删除超出保留期的心跳与事件行；任一类删到行时追加一条结果
    /// 摘要事件，无行可删则保持安静。
    pub async fn sweep(&self, now: i64) -> Result<RetentionStats> {
        let (events_before, heartbeats_before) = self.policy.cutoffs(now);

        let events_deleted = self.store.delete_events_before(events_before).await?;
        let heartbeats_deleted = self
            .store
            .delete_heartbeats_before(heartbeats_before)
            .await?;

        let stats = RetentionStats {
            ts: now,
            events_deleted,
            heartbeats_deleted,
            retention_events_days: self.policy.events_days,
            retention_heartbeats_days: self.policy.heartbeats_days,
        };

        if events_deleted > 0 || heartbeats_deleted > 0 {
            self.store
                .append_event(
                    now,
                    None,
                    "info",
                    "retention_cleanup",
                    "retention cleanup done",
                    Some(serde_json::to_value(&stats)?),
                )
                .await?;
            info!(
                events_deleted = events_deleted,
                heartbeats_deleted = heartbeats_deleted,
                "Retention sweep completed"
            );
        } else {
            debug!("Retention sweep: nothing to delete");
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_store::{NewAgent, NewHeartbeat};

    const DAY: i64 = 86_400;

    async fn seeded_store() -> Arc<TelemetryStore> {
        let store = Arc::new(TelemetryStore::connect("sqlite::memory:").await.unwrap());
        store.init_schema().await.unwrap();

        let agent = store
            .register_agent(
                NewAgent {
                    name: "web-01".to_string(),
                    hostname: "web-01.local".to_string(),
                    ip: "192.168.1.10".to_string(),
                    os: "linux".to_string(),
                },
                0,
            )
            .await
            .unwrap();

        // 40 天前与 1 天前的事件；20 天前与 1 天前的心跳
        let now = 100 * DAY;
        for ts in [now - 40 * DAY, now - DAY] {
            store
                .append_event(ts, None, "info", "heartbeat", "heartbeat received", None)
                .await
                .unwrap();
        }
        for ts in [now - 20 * DAY, now - DAY] {
            store
                .insert_heartbeat(&agent.id, ts, NewHeartbeat::default())
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_sweep_deletes_and_logs_summary() {
        let store = seeded_store().await;
        let manager = RetentionManager::new(store.clone(), RetentionPolicy::new(30, 14));
        let now = 100 * DAY;

        let stats = manager.sweep(now).await.unwrap();
        assert_eq!(stats.events_deleted, 1);
        assert_eq!(stats.heartbeats_deleted, 1);

        let summary = store
            .last_event_of_type("retention_cleanup")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.ts, now);
        let meta: serde_json::Value =
            serde_json::from_str(summary.meta_json.as_deref().unwrap()).unwrap();
        assert_eq!(meta["events_deleted"], 1);
        assert_eq!(meta["retention_heartbeats_days"], 14);
    }

    #[tokio::test]
    async fn test_noop_sweep_is_silent() {
        let store = seeded_store().await;
        let manager = RetentionManager::new(store.clone(), RetentionPolicy::new(30, 14));
        let now = 100 * DAY;

        manager.sweep(now).await.unwrap();
        let count_after_first = store.event_count().await.unwrap();

        // 第二次没有可删数据：不追加摘要事件
        let stats = manager.sweep(now).await.unwrap();
        assert_eq!(stats.events_deleted, 0);
        assert_eq!(stats.heartbeats_deleted, 0);
        assert_eq!(store.event_count().await.unwrap(), count_after_first);
    }

    #[test]
    fn test_policy_floors_days_to_one() {
        let policy = RetentionPolicy::new(0, -3);
        let (events_before, heartbeats_before) = policy.cutoffs(10 * DAY);
        assert_eq!(events_before, 9 * DAY);
        assert_eq!(heartbeats_before, 9 * DAY);
    }
}
