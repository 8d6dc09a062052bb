use crate::message::NotifyMessage;
use anyhow::Result;
use async_trait::async_trait;

/// 通知结果
#[derive(Debug, Clone)]
pub struct NotifyResult {
    pub success: bool,
    pub message: String,
    /// 远端返回的 HTTP 状态码（有则记录）
    pub status: Option<u16>,
}

impl NotifyResult {
    pub fn success(status: Option<u16>) -> Self {
        Self {
            success: true,
            message: "Notification sent successfully".to_string(),
            status,
        }
    }

    pub fn failure(message: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            success: false,
            message: message.into(),
            status,
        }
    }
}

/// 通知器 trait
#[async_trait]
pub trait Notifier: Send + Sync {
    /// 发送通知
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyResult>;

    /// 通知器名称
    fn name(&self) -> &str;

    /// 是否启用
    fn is_enabled(&self) -> bool {
        true
    }
}
