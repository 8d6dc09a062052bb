use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 全局配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub server: ServerConfig,
    pub monitor: MonitorConfig,
    pub alerts: AlertConfig,
    pub notify: NotifyConfig,
    pub retention: RetentionConfig,
    pub auth: AuthConfig,
    /// 探测目标（名称 -> URL）
    pub providers: HashMap<String, String>,
}

/// 服务配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub db_path: String,
}

/// 心跳监控配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// 超过该秒数未收到心跳视为离线
    pub offline_timeout_sec: i64,
    /// 心跳延迟告警阈值（秒）；0 表示按离线阈值推导
    pub stale_sec: i64,
}

/// 告警阈值配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertConfig {
    pub cpu_high: f64,
    pub mem_high: f64,
    pub disk_high: f64,
}

/// 外发通知配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub enabled: bool,
    /// 同一告警两次通知之间的最小间隔（秒）
    pub min_interval_sec: i64,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub webhook_url: Option<String>,
}

/// 数据保留配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub events_days: i64,
    pub heartbeats_days: i64,
}

/// 访问控制配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub admin_user: String,
    /// 未配置时管理登录不可用
    pub admin_pass: Option<String>,
    /// 未配置时每次启动随机生成（重启后旧会话全部失效）
    pub session_secret: Option<String>,
    pub session_ttl_sec: i64,
    /// 未配置时所有访问者默认获得完整视图
    pub dashboard_token: Option<String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            monitor: MonitorConfig::default(),
            alerts: AlertConfig::default(),
            notify: NotifyConfig::default(),
            retention: RetentionConfig::default(),
            auth: AuthConfig::default(),
            providers: HashMap::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3800,
            db_path: "./beacon.db".to_string(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            offline_timeout_sec: 45,
            stale_sec: 0,
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cpu_high: 90.0,
            mem_high: 90.0,
            disk_high: 90.0,
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_interval_sec: 300,
            telegram_bot_token: None,
            telegram_chat_id: None,
            webhook_url: None,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            events_days: 30,
            heartbeats_days: 14,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_user: "admin".to_string(),
            admin_pass: None,
            session_secret: None,
            session_ttl_sec: 86_400,
            dashboard_token: None,
        }
    }
}

impl GlobalConfig {
    /// 生效的心跳延迟阈值：配置为 0 时取 max(offline + 15, 60)
    pub fn effective_stale_sec(&self) -> i64 {
        if self.monitor.stale_sec > 0 {
            self.monitor.stale_sec
        } else {
            (self.monitor.offline_timeout_sec + 15).max(60)
        }
    }

    /// 会话签名密钥；未配置时随机生成
    pub fn session_secret(&self) -> String {
        self.auth
            .session_secret
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string())
    }
}
