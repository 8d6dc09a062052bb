use crate::message::WsMessage;
use beacon_node::NodeSnapshot;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

struct Viewer {
    full: bool,
    /// 上一轮存活探测后是否收到过回应
    alive: bool,
    tx: mpsc::UnboundedSender<WsMessage>,
}

/// 实时广播中心
///
/// 维护已连接观察端集合，每个连接在接入时固定其视图级别。注册表
/// 为进程内状态，重启后由客户端重连重建。
pub struct BroadcastHub {
    viewers: Arc<RwLock<HashMap<Uuid, Viewer>>>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            viewers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 注册新观察端，返回其 id 与消息接收端
    pub async fn register(&self, full: bool) -> (Uuid, mpsc::UnboundedReceiver<WsMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        let mut viewers = self.viewers.write().await;
        viewers.insert(
            id,
            Viewer {
                full,
                alive: true,
                tx,
            },
        );
        info!(viewer_id = %id, full = full, total = viewers.len(), "Viewer connected");
        (id, rx)
    }

    /// 移除观察端（连接关闭时调用）
    pub async fn unregister(&self, id: Uuid) {
        let mut viewers = self.viewers.write().await;
        if viewers.remove(&id).is_some() {
            info!(viewer_id = %id, total = viewers.len(), "Viewer disconnected");
        }
    }

    /// 观察端回应了存活探测
    pub async fn confirm(&self, id: Uuid) {
        let mut viewers = self.viewers.write().await;
        if let Some(viewer) = viewers.get_mut(&id) {
            viewer.alive = true;
        }
    }

    pub async fn viewer_count(&self) -> usize {
        self.viewers.read().await.len()
    }

    pub async fn viewer_is_full(&self, id: Uuid) -> Option<bool> {
        self.viewers.read().await.get(&id).map(|v| v.full)
    }

    /// 向单个观察端发送
    pub async fn send_to(&self, id: Uuid, message: WsMessage) {
        let viewers = self.viewers.read().await;
        if let Some(viewer) = viewers.get(&id) {
            let _ = viewer.tx.send(message);
        }
    }

    /// 向所有观察端发送同一消息
    pub async fn broadcast(&self, message: WsMessage) {
        let dead = {
            let viewers = self.viewers.read().await;
            let mut dead = Vec::new();
            for (id, viewer) in viewers.iter() {
                if viewer.tx.send(message.clone()).is_err() {
                    dead.push(*id);
                }
            }
            dead
        };
        self.remove_dead(dead).await;
    }

    /// 推送节点快照：每个观察端按其视图级别收到对应渲染
    ///
    /// 两份快照须来自同一次底层读取，保证一次推送内所有观察端看到
    /// 一致的状态。
    pub async fn broadcast_snapshots(&self, full: NodeSnapshot, masked: NodeSnapshot) {
        let dead = {
            let viewers = self.viewers.read().await;
            let mut dead = Vec::new();
            for (id, viewer) in viewers.iter() {
                let snapshot = if viewer.full {
                    full.clone()
                } else {
                    masked.clone()
                };
                if viewer.tx.send(WsMessage::NodeUpdate(snapshot)).is_err() {
                    dead.push(*id);
                }
            }
            dead
        };
        self.remove_dead(dead).await;
    }

    /// 存活扫描
    ///
    /// 上一轮未确认的连接在本轮被逐出（两个周期的宽限，不是一次
    /// 未回应即断开）；其余连接置为未确认并发送探测。返回逐出数。
    pub async fn sweep(&self, now: i64) -> usize {
        let mut viewers = self.viewers.write().await;
        let stale: Vec<Uuid> = viewers
            .iter()
            .filter(|(_, v)| !v.alive)
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            viewers.remove(id);
            warn!(viewer_id = %id, "Viewer evicted (liveness timeout)");
        }
        for viewer in viewers.values_mut() {
            viewer.alive = false;
            let _ = viewer.tx.send(WsMessage::Ping { ts: now });
        }
        debug!(
            evicted = stale.len(),
            remaining = viewers.len(),
            "Liveness sweep"
        );
        stale.len()
    }

    /// 启动周期存活扫描任务
    pub fn start_liveness(self: Arc<Self>, interval_sec: u64) {
        let hub = self;
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(interval_sec));
            loop {
                ticker.tick().await;
                let now = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_secs() as i64)
                    .unwrap_or(0);
                hub.sweep(now).await;
            }
        });
    }

    async fn remove_dead(&self, dead: Vec<Uuid>) {
        if dead.is_empty() {
            return;
        }
        let mut viewers = self.viewers.write().await;
        for id in dead {
            viewers.remove(&id);
            debug!(viewer_id = %id, "Viewer channel closed, removed");
        }
    }
}

pub type SharedBroadcastHub = Arc<BroadcastHub>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::EventNotice;

    fn snapshot(masked: bool) -> NodeSnapshot {
        NodeSnapshot {
            nodes: vec![],
            ts: 100,
            masked,
        }
    }

    #[tokio::test]
    async fn test_per_viewer_privacy_rendering() {
        let hub = BroadcastHub::new();
        let (_full_id, mut full_rx) = hub.register(true).await;
        let (_masked_id, mut masked_rx) = hub.register(false).await;

        hub.broadcast_snapshots(snapshot(false), snapshot(true)).await;

        match full_rx.recv().await.unwrap() {
            WsMessage::NodeUpdate(s) => assert!(!s.masked),
            other => panic!("unexpected message: {:?}", other),
        }
        match masked_rx.recv().await.unwrap() {
            WsMessage::NodeUpdate(s) => assert!(s.masked),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_broadcast_event_to_all() {
        let hub = BroadcastHub::new();
        let (_a, mut rx_a) = hub.register(true).await;
        let (_b, mut rx_b) = hub.register(false).await;

        hub.broadcast(WsMessage::EventNew(EventNotice {
            ts: 100,
            agent_id: Some("agent_x".to_string()),
            level: "info".to_string(),
            event_type: "register".to_string(),
            message: "agent registered: web-01".to_string(),
        }))
        .await;

        assert!(matches!(rx_a.recv().await.unwrap(), WsMessage::EventNew(_)));
        assert!(matches!(rx_b.recv().await.unwrap(), WsMessage::EventNew(_)));
    }

    #[tokio::test]
    async fn test_two_round_liveness_eviction() {
        let hub = BroadcastHub::new();
        let (id, mut rx) = hub.register(true).await;

        // 第一轮：不会逐出，标记未确认并发出探测
        assert_eq!(hub.sweep(100).await, 0);
        assert!(matches!(rx.recv().await.unwrap(), WsMessage::Ping { .. }));
        assert_eq!(hub.viewer_count().await, 1);

        // 未回应：第二轮被逐出
        assert_eq!(hub.sweep(110).await, 1);
        assert_eq!(hub.viewer_count().await, 0);
        // 发送端已丢弃，接收端随之关闭
        assert!(rx.recv().await.is_none());
        let _ = id;
    }

    #[tokio::test]
    async fn test_confirm_keeps_viewer_alive() {
        let hub = BroadcastHub::new();
        let (id, mut rx) = hub.register(true).await;

        assert_eq!(hub.sweep(100).await, 0);
        assert!(matches!(rx.recv().await.unwrap(), WsMessage::Ping { .. }));

        // 在下一轮之前回应
        hub.confirm(id).await;
        assert_eq!(hub.sweep(110).await, 0);
        assert_eq!(hub.viewer_count().await, 1);
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_cleaned_up() {
        let hub = BroadcastHub::new();
        let (_id, rx) = hub.register(true).await;
        drop(rx);

        hub.broadcast(WsMessage::Ping { ts: 1 }).await;
        assert_eq!(hub.viewer_count().await, 0);
    }
}
