//! Database reader capability
//!
//! The reload manager only needs to open, date and close a database; the
//! binary format stays behind [`DatabaseReader`]. [`MaxMindDatabase`] is the
//! production implementation over MaxMind `.mmdb` files.

use std::net::IpAddr;
use std::path::Path;

use maxminddb::Reader;
use tracing::trace;

use crate::errors::{GeoKeeperError, Result};

pub trait DatabaseReader: Send + Sync + Sized + 'static {
    fn open(path: &Path) -> Result<Self>;

    /// Publisher build time, seconds since the Unix epoch.
    fn build_epoch(&self) -> u64;

    fn close(self) -> Result<()> {
        Ok(())
    }
}

/// City lookup result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CityRecord {
    pub network: Option<String>,
    /// ISO 3166-1 alpha-2 国家代码
    pub country_code: Option<String>,
    /// 城市英文名称
    pub city: Option<String>,
}

/// ASN lookup result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AsnRecord {
    pub network: Option<String>,
    pub number: Option<u32>,
    pub organization: Option<String>,
}

/// MaxMind GeoLite2 / GeoIP2 database
pub struct MaxMindDatabase {
    reader: Reader<Vec<u8>>,
}

impl DatabaseReader for MaxMindDatabase {
    fn open(path: &Path) -> Result<Self> {
        let reader = Reader::open_readfile(path).map_err(|e| {
            GeoKeeperError::database_open(format!("{}: {}", path.display(), e))
        })?;
        Ok(Self { reader })
    }

    fn build_epoch(&self) -> u64 {
        self.reader.metadata.build_epoch
    }
}

impl MaxMindDatabase {
    pub fn lookup_city(&self, ip: IpAddr) -> Option<CityRecord> {
        let result = self.reader.lookup(ip).ok()?;
        let network = result.network().ok().map(|n| n.to_string());
        let city: maxminddb::geoip2::City = result.decode().ok()??;

        let record = CityRecord {
            network,
            country_code: city.country.iso_code.map(String::from),
            city: city.city.names.english.map(String::from),
        };
        trace!("MaxMind city lookup for {}: {:?}", ip, record);
        Some(record)
    }

    /// 仅返回国家代码
    pub fn lookup_country(&self, ip: IpAddr) -> Option<String> {
        let result = self.reader.lookup(ip).ok()?;
        let country: maxminddb::geoip2::Country = result.decode().ok()??;
        country.country.iso_code.map(String::from)
    }

    pub fn lookup_asn(&self, ip: IpAddr) -> Option<AsnRecord> {
        let result = self.reader.lookup(ip).ok()?;
        let network = result.network().ok().map(|n| n.to_string());
        let asn: maxminddb::geoip2::Asn = result.decode().ok()??;

        Some(AsnRecord {
            network,
            number: asn.autonomous_system_number,
            organization: asn.autonomous_system_organization.map(String::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = MaxMindDatabase::open(&dir.path().join("GeoLite2-City.mmdb"))
            .err()
            .unwrap();
        assert!(matches!(err, GeoKeeperError::DatabaseOpen(_)));
        assert!(err.message().contains("GeoLite2-City.mmdb"));
    }

    #[test]
    fn test_open_garbage_file_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("GeoLite2-ASN.mmdb");
        std::fs::write(&path, b"definitely not a maxmind database").unwrap();
        assert!(MaxMindDatabase::open(&path).is_err());
    }
}
