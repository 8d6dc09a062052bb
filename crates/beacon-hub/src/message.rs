use beacon_node::NodeSnapshot;
use serde::{Deserialize, Serialize};

/// 推送给观察端的事件摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventNotice {
    pub ts: i64,
    pub agent_id: Option<String>,
    pub level: String,
    pub event_type: String,
    pub message: String,
}

/// 推送通道上的消息（定义线上格式，保持稳定）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    /// 连接建立问候
    #[serde(rename = "hello")]
    Hello { ts: i64, full: bool },

    /// 节点快照更新
    #[serde(rename = "node:update")]
    NodeUpdate(NodeSnapshot),

    /// 新事件
    #[serde(rename = "event:new")]
    EventNew(EventNotice),

    /// 存活探测
    #[serde(rename = "ping")]
    Ping { ts: i64 },
}
