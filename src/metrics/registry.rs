//! Global metrics registry
//!
//! Defines all Prometheus metrics used in the application.

use once_cell::sync::Lazy;
use prometheus::{CounterVec, Encoder, Opts, Registry, TextEncoder};

/// Global metrics instance
pub static METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

/// Application metrics container
pub struct Metrics {
    registry: Registry,

    /// Lookups by database type (city, asn, country)
    pub lookups_total: CounterVec,
    /// Update attempts by database and status (success, failure, skipped, in_progress)
    pub downloads_total: CounterVec,
    /// Reload attempts by database and status (success, failure)
    pub reloads_total: CounterVec,
}

impl Metrics {
    fn new() -> Self {
        let registry = Registry::new();

        let lookups_total = CounterVec::new(
            Opts::new(
                "geokeeper_lookups_total",
                "Total number of database lookups by type",
            ),
            &["type"],
        )
        .expect("Failed to create lookups_total metric");

        let downloads_total = CounterVec::new(
            Opts::new(
                "geokeeper_downloads_total",
                "Total number of database update attempts",
            ),
            &["database", "status"],
        )
        .expect("Failed to create downloads_total metric");

        let reloads_total = CounterVec::new(
            Opts::new(
                "geokeeper_reloads_total",
                "Total number of database reload attempts",
            ),
            &["database", "status"],
        )
        .expect("Failed to create reloads_total metric");

        registry
            .register(Box::new(lookups_total.clone()))
            .expect("Failed to register lookups_total");
        registry
            .register(Box::new(downloads_total.clone()))
            .expect("Failed to register downloads_total");
        registry
            .register(Box::new(reloads_total.clone()))
            .expect("Failed to register reloads_total");

        Self {
            registry,
            lookups_total,
            downloads_total,
            reloads_total,
        }
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}
