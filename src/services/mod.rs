//! Service layer
//!
//! Lookup logic shared by the HTTP API and the `lookup` command.

mod ip_info;

pub use ip_info::{DatabaseStatus, GeoLocator, IpInfo};
