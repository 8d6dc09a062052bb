pub mod global;
pub mod loader;

pub use global::{
    AlertConfig, AuthConfig, GlobalConfig, MonitorConfig, NotifyConfig, RetentionConfig,
    ServerConfig,
};
pub use loader::ConfigLoader;
