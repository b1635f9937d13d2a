//! IP 信息查询
//!
//! 从热重载管理器取当前句柄组合查询结果：
//! 1. City 库提供网段、国家代码、城市名
//! 2. ASN 库提供组织名，网段为空时补上
//! 3. City 库没有国家代码时由 Country 库补上

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::database::{DatabaseKind, DatabaseReader, ManagerState, MaxMindDatabase, ReloadManager};

/// 单个 IP 的查询结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpInfo {
    pub ip: Option<IpAddr>,
    /// 4 或 6
    pub ip_type: u8,
    pub network: String,
    pub country_code: String,
    /// 自治系统组织名称
    pub asn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn_number: Option<u32>,
    pub city: String,
    pub city_build_date: u64,
    pub asn_build_date: u64,
}

impl IpInfo {
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip: Some(ip),
            ip_type: if ip.is_ipv4() { 4 } else { 6 },
            ..Self::default()
        }
    }
}

/// 单个数据库的加载状态（用于健康检查）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseStatus {
    pub name: &'static str,
    pub edition: &'static str,
    pub loaded: bool,
    pub build_epoch: Option<u64>,
}

/// 查询接口依赖的能力
pub trait GeoLocator: Send + Sync {
    fn locate(&self, ip: IpAddr) -> IpInfo;

    fn status(&self) -> Vec<DatabaseStatus>;

    fn state(&self) -> ManagerState;
}

impl GeoLocator for ReloadManager<MaxMindDatabase> {
    fn locate(&self, ip: IpAddr) -> IpInfo {
        let mut info = IpInfo::new(ip);

        if let Some(db) = self.city() {
            inc_counter!(crate::metrics::METRICS.lookups_total, &["city"]);
            info.city_build_date = db.build_epoch();
            if let Some(record) = db.lookup_city(ip) {
                info.network = record.network.unwrap_or_default();
                info.country_code = record.country_code.unwrap_or_default();
                info.city = record.city.unwrap_or_default();
            }
        }

        if let Some(db) = self.asn() {
            inc_counter!(crate::metrics::METRICS.lookups_total, &["asn"]);
            info.asn_build_date = db.build_epoch();
            if let Some(record) = db.lookup_asn(ip) {
                info.asn = record.organization.unwrap_or_default();
                info.asn_number = record.number;
                if info.network.is_empty() {
                    info.network = record.network.unwrap_or_default();
                }
            }
        }

        if info.country_code.is_empty()
            && let Some(db) = self.country()
        {
            inc_counter!(crate::metrics::METRICS.lookups_total, &["country"]);
            if let Some(code) = db.lookup_country(ip) {
                info.country_code = code;
            }
        }

        trace!("Located {}: {:?}", ip, info);
        info
    }

    fn status(&self) -> Vec<DatabaseStatus> {
        DatabaseKind::all()
            .map(|kind| {
                let build_epoch = self.reader(kind).map(|db| db.build_epoch());
                DatabaseStatus {
                    name: kind.label(),
                    edition: kind.edition_id(),
                    loaded: build_epoch.is_some(),
                    build_epoch,
                }
            })
            .collect()
    }

    fn state(&self) -> ManagerState {
        ReloadManager::state(self)
    }
}
