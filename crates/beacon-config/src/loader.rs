use anyhow::{anyhow, Result};
use config::{Config, File, FileFormat};
use std::path::{Path, PathBuf};

use crate::GlobalConfig;

/// 配置加载器
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    /// 创建配置加载器
    pub fn new<P: AsRef<Path>>(config_path: P) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
        }
    }

    /// 加载全局配置
    ///
    /// 配置文件不存在时返回默认配置
    pub fn load(&self) -> Result<GlobalConfig> {
        if !self.config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let config = Config::builder()
            .add_source(File::new(
                self.config_path
                    .to_str()
                    .ok_or_else(|| anyhow!("Invalid config path"))?,
                FileFormat::Toml,
            ))
            .build()?;

        let global: GlobalConfig = config.try_deserialize()?;
        self.validate(&global)?;
        Ok(global)
    }

    /// 验证配置
    fn validate(&self, config: &GlobalConfig) -> Result<()> {
        if config.monitor.offline_timeout_sec <= 0 {
            return Err(anyhow!(
                "offline_timeout_sec must be positive, got {}",
                config.monitor.offline_timeout_sec
            ));
        }
        if config.retention.events_days <= 0 || config.retention.heartbeats_days <= 0 {
            return Err(anyhow!("retention horizons must be at least 1 day"));
        }
        if config.notify.min_interval_sec < 0 {
            return Err(anyhow!("notify min_interval_sec cannot be negative"));
        }
        for (name, url) in &config.providers {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(anyhow!("provider {} has non-http target: {}", name, url));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let loader = ConfigLoader::new("/nonexistent/beacon.toml");
        let config = loader.load().unwrap();
        assert_eq!(config.server.port, 3800);
    }

    #[test]
    fn test_load_toml_overrides() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
[server]
port = 4100

[monitor]
offline_timeout_sec = 30

[alerts]
cpu_high = 85.0

[providers]
ollama = "http://127.0.0.1:11434/v1/models"
"#
        )
        .unwrap();

        let loader = ConfigLoader::new(f.path());
        let config = loader.load().unwrap();
        assert_eq!(config.server.port, 4100);
        assert_eq!(config.monitor.offline_timeout_sec, 30);
        assert_eq!(config.alerts.cpu_high, 85.0);
        // 未覆盖的段保持默认
        assert_eq!(config.retention.events_days, 30);
        assert_eq!(
            config.providers.get("ollama").unwrap(),
            "http://127.0.0.1:11434/v1/models"
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
[monitor]
offline_timeout_sec = 0
"#
        )
        .unwrap();

        let loader = ConfigLoader::new(f.path());
        assert!(loader.load().is_err());
    }

    #[test]
    fn test_validate_rejects_non_http_provider() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
[providers]
bad = "ftp://example.com"
"#
        )
        .unwrap();

        let loader = ConfigLoader::new(f.path());
        assert!(loader.load().is_err());
    }
}
