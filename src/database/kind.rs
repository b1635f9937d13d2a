use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use strum::{EnumIter, IntoEnumIterator};

use super::paths::database_path;

/// The three databases kept open by the reload manager.
///
/// Iteration order (country, city, ASN) is the order of every reload tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum DatabaseKind {
    Country,
    City,
    Asn,
}

impl DatabaseKind {
    /// MaxMind edition id, which is also the file stem on disk.
    pub fn edition_id(&self) -> &'static str {
        match self {
            Self::Country => "GeoLite2-Country",
            Self::City => "GeoLite2-City",
            Self::Asn => "GeoLite2-ASN",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Country => "country",
            Self::City => "city",
            Self::Asn => "asn",
        }
    }

    pub fn path(&self, data_dir: &Path) -> PathBuf {
        database_path(data_dir, self.edition_id())
    }

    pub fn all() -> impl Iterator<Item = DatabaseKind> {
        Self::iter()
    }

    pub fn edition_ids() -> Vec<String> {
        Self::iter().map(|k| k.edition_id().to_string()).collect()
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.edition_id())
    }
}

impl FromStr for DatabaseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::iter()
            .find(|k| k.label().eq_ignore_ascii_case(s) || k.edition_id().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "Invalid database: '{}'. Valid: country, city, asn or an edition id",
                    s
                )
            })
    }
}
