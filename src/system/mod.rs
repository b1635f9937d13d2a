//! System-level modules
//!
//! - Logging initialization
//! - Restart backoff and supervised background tasks
//! - Shutdown signal handling

pub mod backoff;
pub mod logging;
pub mod shutdown;
pub mod supervisor;

pub use logging::init_logging;
