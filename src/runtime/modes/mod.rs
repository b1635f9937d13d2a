//! Mode routing
//!
//! - Server mode: HTTP lookups with periodic download and reload
//! - CLI mode: one-shot `download`, `lookup` and `config generate`

pub mod cli;
pub mod server;

pub use server::run_server;
