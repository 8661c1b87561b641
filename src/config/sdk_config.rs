// src/config/sdk_config.rs

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::time::Duration;

use crate::adapters::NetworkId;
use crate::error::ConfigError;
use crate::model::placements::Placement;
use crate::model::privacy::PrivacySettings;
use crate::model::targeting::{AppInfo, Targeting};

fn default_http_timeout_ms() -> u64 {
    3000
}

fn default_tracking_attempts() -> u32 {
    3
}

fn default_tracking_backoff_ms() -> u64 {
    1000
}

fn default_session_tick_ms() -> u64 {
    1000
}

/// SDK 配置
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SdkConfig {
    pub app_key: String,
    pub publisher_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub app: AppInfo,

    pub auction_endpoint: String,
    /// 为空表示不做 CDP 增强
    #[serde(default)]
    pub cdp_endpoint: String,
    pub tracking_endpoint: String,

    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
    #[serde(default = "default_tracking_attempts")]
    pub tracking_attempts: u32,
    #[serde(default = "default_tracking_backoff_ms")]
    pub tracking_backoff_ms: u64,
    #[serde(default = "default_session_tick_ms")]
    pub session_tick_ms: u64,
    #[serde(default)]
    pub tmax_ms: Option<u64>,

    #[serde(default)]
    pub privacy: PrivacySettings,
    #[serde(default)]
    pub targeting: Targeting,
    /// 各网络初始化参数
    #[serde(default)]
    pub networks: HashMap<NetworkId, HashMap<String, String>>,
    #[serde(default)]
    pub placements: Vec<Placement>,
}

impl SdkConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn tracking_backoff(&self) -> Duration {
        Duration::from_millis(self.tracking_backoff_ms)
    }

    pub fn session_tick(&self) -> Duration {
        Duration::from_millis(self.session_tick_ms)
    }

    pub fn cdp_endpoint(&self) -> Option<&str> {
        let endpoint = self.cdp_endpoint.trim();
        (!endpoint.is_empty()).then_some(endpoint)
    }

    pub fn placement(&self, placement_id: &str) -> Option<&Placement> {
        self.placements.iter().find(|p| p.placement_id == placement_id)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_key.trim().is_empty() {
            return Err(ConfigError::Invalid("app_key is empty".to_string()));
        }
        if self.http_timeout_ms == 0 {
            return Err(ConfigError::Invalid("http_timeout_ms must be > 0".to_string()));
        }
        if self.tracking_attempts == 0 {
            return Err(ConfigError::Invalid("tracking_attempts must be > 0".to_string()));
        }
        if self.session_tick_ms == 0 {
            return Err(ConfigError::Invalid("session_tick_ms must be > 0".to_string()));
        }
        check_url("auction_endpoint", &self.auction_endpoint)?;
        check_url("tracking_endpoint", &self.tracking_endpoint)?;
        if let Some(cdp) = self.cdp_endpoint() {
            check_url("cdp_endpoint", cdp)?;
        }
        Ok(())
    }
}

fn check_url(field: &str, value: &str) -> Result<(), ConfigError> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::Invalid(format!("{} `{}`: {}", field, value, e)))
}

/// 配置来源
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<SdkConfig, ConfigError>;
}

/// 从 JSON 文件读取配置
pub struct FileConfigSource {
    pub path: String,
}

impl FileConfigSource {
    pub fn new(path: &str) -> Self {
        Self { path: path.to_string() }
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> Result<SdkConfig, ConfigError> {
        let content = fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        let config: SdkConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}

/// 内存里的配置，测试和 demo 使用
pub struct StaticConfigSource(pub SdkConfig);

impl ConfigSource for StaticConfigSource {
    fn load(&self) -> Result<SdkConfig, ConfigError> {
        self.0.validate()?;
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "app_key": "app-1",
        "publisher_id": "pub-1",
        "auction_endpoint": "http://127.0.0.1:9001/auction",
        "tracking_endpoint": "http://127.0.0.1:9001/track",
        "networks": {"applovin": {"sdk_key": "abc"}},
        "placements": [{"placement_id": "inter", "ad_type": 2, "floor": 0.5}]
    }"#;

    #[test]
    fn defaults_are_applied() {
        let config: SdkConfig = serde_json::from_str(MINIMAL).unwrap();
        config.validate().unwrap();
        assert_eq!(config.tracking_attempts, 3);
        assert_eq!(config.tracking_backoff(), Duration::from_secs(1));
        assert!(config.cdp_endpoint().is_none());
        assert_eq!(config.networks[&NetworkId::AppLovin]["sdk_key"], "abc");
        assert_eq!(config.placement("inter").unwrap().floor, 0.5);
    }

    #[test]
    fn rejects_bad_values() {
        let mut config: SdkConfig = serde_json::from_str(MINIMAL).unwrap();
        config.tracking_attempts = 0;
        assert!(config.validate().is_err());

        let mut config: SdkConfig = serde_json::from_str(MINIMAL).unwrap();
        config.cdp_endpoint = "not a url".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn file_source_reports_missing_file() {
        let source = FileConfigSource::new("/definitely/missing/sdk.json");
        assert!(matches!(source.load(), Err(ConfigError::Io { .. })));
    }
}
