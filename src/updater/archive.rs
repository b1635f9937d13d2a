//! tar.gz 归档解压
//!
//! 流式解压并按顺序扫描条目，只取第一个名称以指定后缀结尾的普通文件。

use std::io::{self, Read, Write};

use flate2::read::GzDecoder;
use tar::Archive;

use crate::errors::{GeoKeeperError, Result};

/// 被解压出的条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntry {
    pub name: String,
    pub size: u64,
}

pub fn extract_database<R: Read, W: Write>(
    reader: R,
    suffix: &str,
    out: &mut W,
) -> Result<ExtractedEntry> {
    let mut archive = Archive::new(GzDecoder::new(reader));
    let entries = archive
        .entries()
        .map_err(|e| GeoKeeperError::archive(format!("tar read: {}", e)))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| GeoKeeperError::archive(format!("tar read: {}", e)))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let name = entry
            .path()
            .map_err(|e| GeoKeeperError::archive(format!("tar entry path: {}", e)))?
            .to_string_lossy()
            .into_owned();
        if !name.ends_with(suffix) {
            continue;
        }

        let size = io::copy(&mut entry, out)
            .map_err(|e| GeoKeeperError::archive(format!("extract {}: {}", name, e)))?;
        return Ok(ExtractedEntry { name, size });
    }

    Err(GeoKeeperError::archive(format!(
        "no {} entry found in archive",
        suffix
    )))
}
