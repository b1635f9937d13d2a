//! GeoIP database handles
//!
//! - `kind`: the three fixed databases and their edition ids
//! - `paths`: on-disk layout shared with the updater
//! - `reader`: the reader capability and its MaxMind implementation
//! - `slot`: the lock-guarded unit of atomic swap
//! - `manager`: the live-reloading manager

mod kind;
mod manager;
pub mod paths;
mod reader;
mod slot;

pub use kind::DatabaseKind;
pub use manager::{ManagerState, ReloadManager, ReloadOptions};
pub use reader::{AsnRecord, CityRecord, DatabaseReader, MaxMindDatabase};
pub use slot::DatabaseSlot;
