//! 远端数据库来源
//!
//! `DatabaseSource` 抽象出两个操作：元数据探测（只取构建时间）与下载归档。
//! `MaxMindSource` 基于 MaxMind 下载接口实现：HEAD 取 `Last-Modified`，
//! GET 拉取 tar.gz 归档，两者都使用 Basic 认证。

use std::io::Read;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use tracing::trace;
use ureq::Agent;

use crate::config::{EDITION_PLACEHOLDER, UpdaterConfig};
use crate::errors::{GeoKeeperError, Result};

pub trait DatabaseSource: Send + Sync {
    /// 远端构建时间（不下载正文）
    fn build_time(&self, name: &str) -> Result<DateTime<Utc>>;

    /// 远端 tar.gz 归档的字节流
    fn fetch(&self, name: &str) -> Result<Box<dyn Read>>;
}

/// MaxMind 下载源
pub struct MaxMindSource {
    agent: Agent,
    url_template: String,
    authorization: String,
}

impl MaxMindSource {
    /// `url_template` 使用 `{edition}` 作为占位符
    pub fn new(account_id: &str, license_key: &str, url_template: &str, timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Self {
            agent,
            url_template: url_template.to_string(),
            authorization: basic_authorization(account_id, license_key),
        }
    }

    /// 凭据缺失时返回配置错误
    pub fn from_config(config: &UpdaterConfig) -> Result<Self> {
        let (account_id, license_key) = config.credentials().ok_or_else(|| {
            GeoKeeperError::config("missing updater.account_id or updater.license_key")
        })?;

        Ok(Self::new(
            account_id,
            license_key,
            &config.download_url,
            Duration::from_secs(config.http_timeout_secs),
        ))
    }

    pub fn url(&self, name: &str) -> String {
        self.url_template.replace(EDITION_PLACEHOLDER, name)
    }
}

impl DatabaseSource for MaxMindSource {
    fn build_time(&self, name: &str) -> Result<DateTime<Utc>> {
        let url = self.url(name);
        trace!("HEAD {}", url);

        let resp = self
            .agent
            .head(&url)
            .header("Authorization", self.authorization.as_str())
            .call()
            .map_err(|e| GeoKeeperError::http(format!("HEAD {}: {}", url, e)))?;

        let value = resp
            .headers()
            .get("last-modified")
            .ok_or_else(|| GeoKeeperError::timestamp("missing Last-Modified header"))?
            .to_str()
            .map_err(|e| GeoKeeperError::timestamp(format!("invalid Last-Modified header: {}", e)))?;

        parse_last_modified(value)
    }

    fn fetch(&self, name: &str) -> Result<Box<dyn Read>> {
        let url = self.url(name);
        trace!("GET {}", url);

        let resp = self
            .agent
            .get(&url)
            .header("Authorization", self.authorization.as_str())
            .call()
            .map_err(|e| GeoKeeperError::http(format!("GET {}: {}", url, e)))?;

        Ok(Box::new(resp.into_body().into_reader()))
    }
}

fn basic_authorization(account_id: &str, license_key: &str) -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", account_id, license_key))
    )
}

/// 解析 HTTP-date（IMF-fixdate，与 RFC 2822 兼容）
pub fn parse_last_modified(value: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc2822(value.trim()).map_err(|e| {
        GeoKeeperError::timestamp(format!("parse Last-Modified '{}': {}", value, e))
    })?;
    Ok(parsed.with_timezone(&Utc))
}
