pub mod health;
pub mod lookup;
pub mod metrics;

pub use health::{AppStartTime, HealthResponse, HealthService};
pub use lookup::{LookupQuery, LookupService};
pub use metrics::MetricsService;
