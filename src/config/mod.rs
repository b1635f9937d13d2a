//! Configuration management
//!
//! Configuration is loaded once at startup into a [`StaticConfig`] value and
//! passed by reference into the reload manager, the updater and the server.

mod structs;

pub use structs::*;
