use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 通知级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyLevel {
    /// 信息
    Info,
    /// 警告
    Warning,
    /// 严重
    Critical,
}

/// 通知消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyMessage {
    /// 标题
    pub title: String,

    /// 内容
    pub content: String,

    /// 级别
    pub level: NotifyLevel,

    /// 时间
    pub timestamp: DateTime<Utc>,

    /// 额外数据
    pub metadata: Option<serde_json::Value>,
}

impl NotifyMessage {
    pub fn new(title: impl Into<String>, content: impl Into<String>, level: NotifyLevel) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            level,
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// 创建严重级别消息
    pub fn critical(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(title, content, NotifyLevel::Critical)
    }

    /// 创建警告级别消息
    pub fn warning(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(title, content, NotifyLevel::Warning)
    }
}
