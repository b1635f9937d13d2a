//! Filesystem layout shared by the reload manager and the updater.
//!
//! One directory holds `<name>.mmdb` per database, plus transient
//! `<name>.mmdb.tmp` and `<name>.mmdb.old` siblings while an update runs.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const DATABASE_SUFFIX: &str = ".mmdb";
pub const TEMP_SUFFIX: &str = ".tmp";
pub const BACKUP_SUFFIX: &str = ".old";

pub fn database_path(data_dir: &Path, name: &str) -> PathBuf {
    data_dir.join(format!("{}{}", name, DATABASE_SUFFIX))
}

/// Same directory as `path`, so renaming it over `path` stays on one filesystem.
pub fn temp_path(path: &Path) -> PathBuf {
    with_suffix(path, TEMP_SUFFIX)
}

pub fn backup_path(path: &Path) -> PathBuf {
    with_suffix(path, BACKUP_SUFFIX)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sibling_paths_share_directory() {
        let dir = Path::new("/var/lib/geoip");
        let db = database_path(dir, "GeoLite2-City");
        assert_eq!(db, PathBuf::from("/var/lib/geoip/GeoLite2-City.mmdb"));
        assert_eq!(
            temp_path(&db),
            PathBuf::from("/var/lib/geoip/GeoLite2-City.mmdb.tmp")
        );
        assert_eq!(
            backup_path(&db),
            PathBuf::from("/var/lib/geoip/GeoLite2-City.mmdb.old")
        );
        assert_eq!(temp_path(&db).parent(), db.parent());
    }
}
