use crate::message::NotifyMessage;
use crate::notifier::{Notifier, NotifyResult};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// Telegram 通知
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

pub struct TelegramNotifier {
    config: TelegramConfig,
    client: reqwest::Client,
    enabled: bool,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            enabled: true,
        }
    }

    fn api_url(&self) -> String {
        format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.config.bot_token
        )
    }

    fn build_message(&self, message: &NotifyMessage) -> serde_json::Value {
        serde_json::json!({
            "chat_id": self.config.chat_id,
            "text": format!("{}\n{}", message.title, message.content),
            "disable_web_page_preview": true,
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyResult> {
        let body = self.build_message(message);

        let response = self.client.post(self.api_url()).json(&body).send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(NotifyResult::success(Some(status.as_u16())))
        } else {
            Ok(NotifyResult::failure(
                format!("Telegram failed with status: {}", status),
                Some(status.as_u16()),
            ))
        }
    }

    fn name(&self) -> &str {
        "telegram"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// ============================================================================
// Webhook 通知
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    pub headers: Option<std::collections::HashMap<String, String>>,
}

pub struct WebhookNotifier {
    config: WebhookConfig,
    client: reqwest::Client,
    enabled: bool,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            enabled: true,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyResult> {
        let mut request = self.client.post(&self.config.url);

        if let Some(headers) = &self.config.headers {
            for (key, value) in headers {
                request = request.header(key, value);
            }
        }

        let response = request.json(message).send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(NotifyResult::success(Some(status.as_u16())))
        } else {
            Ok(NotifyResult::failure(
                format!("Webhook failed with status: {}", status),
                Some(status.as_u16()),
            ))
        }
    }

    fn name(&self) -> &str {
        "webhook"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telegram_message_body() {
        let notifier = TelegramNotifier::new(TelegramConfig {
            bot_token: "123:abc".to_string(),
            chat_id: "-100200300".to_string(),
        });
        let message = NotifyMessage::critical("🚨 BEACON Critical Alert", "Node: web-01");
        let body = notifier.build_message(&message);

        assert_eq!(body["chat_id"], "-100200300");
        assert!(body["text"].as_str().unwrap().contains("web-01"));
        assert_eq!(body["disable_web_page_preview"], true);
        assert!(notifier.api_url().ends_with("/bot123:abc/sendMessage"));
    }

    #[tokio::test]
    async fn test_webhook_unreachable_is_error_not_panic() {
        // 不可达地址：send 返回 Err，由调用方记录，不会中断进程
        let notifier = WebhookNotifier::new(WebhookConfig {
            url: "http://127.0.0.1:1/hook".to_string(),
            headers: None,
        });
        let message = NotifyMessage::warning("test", "unreachable");
        let result = notifier.send(&message).await;
        assert!(result.is_err());
    }
}
