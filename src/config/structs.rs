use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::database::DatabaseKind;
use crate::errors::{GeoKeeperError, Result};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// MaxMind 下载地址模板中的占位符
pub const EDITION_PLACEHOLDER: &str = "{edition}";

/// 静态配置（启动时加载一次，以引用方式传入各组件）
///
/// - server: HTTP 查询接口
/// - geoip: 数据目录与热重载间隔
/// - updater: MaxMind 凭据与下载节奏
/// - logging: 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub geoip: GeoIpConfig,
    #[serde(default)]
    pub updater: UpdaterConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：旧版 MAXMIND_* 变量 > GEOKEEPER__* 变量 > 配置文件 > 默认值
    /// 示例：GEOKEEPER__UPDATER__UPDATE_INTERVAL_SECS=3600
    pub fn load(path: Option<&str>) -> Result<Self> {
        use config::{Config, Environment, File};

        let path = path.unwrap_or(DEFAULT_CONFIG_PATH);

        let builder = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("GEOKEEPER")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("updater.account_id", std::env::var("MAXMIND_ACCOUNT_ID").ok())?
            .set_override_option("updater.license_key", std::env::var("MAXMIND_LICENSE_KEY").ok())?
            .set_override_option("geoip.data_dir", std::env::var("MAXMIND_BASE_PATH").ok())?;

        let config: StaticConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        if Path::new(path).exists() {
            eprintln!("[INFO] Configuration loaded from: {}", path);
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.geoip.data_dir.as_os_str().is_empty() {
            return Err(GeoKeeperError::validation("geoip.data_dir must not be empty"));
        }
        if self.geoip.reload_interval_secs == 0 {
            return Err(GeoKeeperError::validation(
                "geoip.reload_interval_secs must be greater than 0",
            ));
        }
        if self.updater.update_interval_secs == 0 {
            return Err(GeoKeeperError::validation(
                "updater.update_interval_secs must be greater than 0",
            ));
        }
        if self.updater.http_timeout_secs == 0 || self.updater.http_timeout_secs > 300 {
            return Err(GeoKeeperError::validation(format!(
                "updater.http_timeout_secs must be within 1..=300, got {}",
                self.updater.http_timeout_secs
            )));
        }
        if let Some(unknown) = self
            .updater
            .editions
            .iter()
            .find(|name| name.parse::<DatabaseKind>().is_err())
        {
            return Err(GeoKeeperError::validation(format!(
                "updater.editions contains unknown database '{}'",
                unknown
            )));
        }
        if !self.updater.download_url.contains(EDITION_PLACEHOLDER) {
            return Err(GeoKeeperError::validation(format!(
                "updater.download_url must contain the {} placeholder",
                EDITION_PLACEHOLDER
            )));
        }
        Ok(())
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| GeoKeeperError::config(format!("failed to render config: {}", e)))?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// 为空或未设置时查询接口不做鉴权
    #[serde(default)]
    pub api_token: Option<String>,
}

/// GeoIP 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoIpConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_interval_secs")]
    pub reload_interval_secs: u64,
}

/// 下载器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    #[serde(default = "default_updater_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub license_key: Option<String>,
    #[serde(default = "default_interval_secs")]
    pub update_interval_secs: u64,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_download_url")]
    pub download_url: String,
    #[serde(default = "default_editions")]
    pub editions: Vec<String>,
}

impl UpdaterConfig {
    /// 凭据齐全时返回 (account_id, license_key)
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.account_id.as_deref(), self.license_key.as_deref()) {
            (Some(id), Some(key)) if !id.is_empty() && !key.is_empty() => Some((id, key)),
            _ => None,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

// ============================================================
// Default value functions for static config
// ============================================================

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

/// 两小时
fn default_interval_secs() -> u64 {
    2 * 60 * 60
}

fn default_updater_enabled() -> bool {
    true
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_download_url() -> String {
    "https://download.maxmind.com/geoip/databases/{edition}/download?suffix=tar.gz".to_string()
}

fn default_editions() -> Vec<String> {
    DatabaseKind::edition_ids()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            api_token: None,
        }
    }
}

impl Default for GeoIpConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            reload_interval_secs: default_interval_secs(),
        }
    }
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            enabled: default_updater_enabled(),
            account_id: None,
            license_key: None,
            update_interval_secs: default_interval_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            download_url: default_download_url(),
            editions: default_editions(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = StaticConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.geoip.reload_interval_secs, 7200);
        assert_eq!(config.updater.http_timeout_secs, 30);
        assert_eq!(config.updater.editions.len(), 3);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = StaticConfig::default();
        config.geoip.reload_interval_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(GeoKeeperError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_unbounded_timeout() {
        let mut config = StaticConfig::default();
        config.updater.http_timeout_secs = 0;
        assert!(config.validate().is_err());
        config.updater.http_timeout_secs = 3600;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_editions() {
        let mut config = StaticConfig::default();
        config.updater.editions = vec!["GeoLite2-City".to_string(), "../escaped".to_string()];
        assert!(matches!(
            config.validate(),
            Err(GeoKeeperError::Validation(msg)) if msg.contains("../escaped")
        ));

        config.updater.editions = vec!["city".to_string(), "GeoLite2-ASN".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_edition_placeholder() {
        let mut config = StaticConfig::default();
        config.updater.download_url = "https://example.com/db.tar.gz".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credentials_require_both_parts() {
        let mut updater = UpdaterConfig::default();
        assert!(updater.credentials().is_none());
        updater.account_id = Some("123".to_string());
        assert!(updater.credentials().is_none());
        updater.license_key = Some(String::new());
        assert!(updater.credentials().is_none());
        updater.license_key = Some("key".to_string());
        assert_eq!(updater.credentials(), Some(("123", "key")));
    }

    #[test]
    fn test_sample_config_round_trips() {
        let sample = StaticConfig::generate_sample_config();
        let parsed: StaticConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.server.port, 8080);
        assert_eq!(parsed.updater.download_url, default_download_url());
    }

    #[test]
    fn test_load_reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geokeeper.toml");
        std::fs::write(
            &path,
            "[geoip]\ndata_dir = \"/var/lib/geoip\"\nreload_interval_secs = 60\n",
        )
        .unwrap();

        let config = StaticConfig::load(path.to_str()).unwrap();
        assert_eq!(config.geoip.reload_interval_secs, 60);
        assert_eq!(config.server.port, 8080);
    }
}
