use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// 状态变更事件
///
/// 采集入口（注册、心跳）发布，广播中心订阅后向所有观察端推送新快照。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChangeEvent {
    /// 新 agent 注册
    AgentRegistered { agent_id: String, name: String, ts: i64 },
    /// 收到心跳
    HeartbeatReceived { agent_id: String, ts: i64 },
}

impl ChangeEvent {
    /// 事件关联的 agent id
    pub fn agent_id(&self) -> &str {
        match self {
            ChangeEvent::AgentRegistered { agent_id, .. } => agent_id,
            ChangeEvent::HeartbeatReceived { agent_id, .. } => agent_id,
        }
    }

    pub fn ts(&self) -> i64 {
        match self {
            ChangeEvent::AgentRegistered { ts, .. } => *ts,
            ChangeEvent::HeartbeatReceived { ts, .. } => *ts,
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// 发布事件，返回当前订阅者数量；无订阅者时静默丢弃
    pub fn publish(&self, event: ChangeEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

pub type SharedEventBus = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_bus_publish_subscribe() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        let sent = bus.publish(ChangeEvent::HeartbeatReceived {
            agent_id: "agent_a1".to_string(),
            ts: 1000,
        });
        assert_eq!(sent, 1);

        let received = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("timeout waiting for event")
            .expect("failed to receive event");
        assert_eq!(received.agent_id(), "agent_a1");
        assert_eq!(received.ts(), 1000);
    }

    #[tokio::test]
    async fn test_bus_multiple_subscribers() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let sent = bus.publish(ChangeEvent::AgentRegistered {
            agent_id: "agent_b2".to_string(),
            name: "web-01".to_string(),
            ts: 2000,
        });
        assert_eq!(sent, 2);

        assert_eq!(rx1.recv().await.unwrap().agent_id(), "agent_b2");
        assert_eq!(rx2.recv().await.unwrap().agent_id(), "agent_b2");
    }

    #[tokio::test]
    async fn test_bus_no_subscribers() {
        let bus = EventBus::new(10);
        // 没有订阅者时不报错
        let sent = bus.publish(ChangeEvent::HeartbeatReceived {
            agent_id: "agent_c3".to_string(),
            ts: 3000,
        });
        assert_eq!(sent, 0);
    }
}
