//! Metrics helper macros
//!
//! Compile to nothing unless the `metrics` feature is enabled, so call sites
//! need no `#[cfg]` of their own.

/// Increment a CounterVec with given labels.
///
/// Usage:
/// ```ignore
/// inc_counter!(crate::metrics::METRICS.reloads_total, &["city", "success"]);
/// ```
macro_rules! inc_counter {
    ($counter:expr, $labels:expr) => {
        #[cfg(feature = "metrics")]
        $counter.with_label_values($labels).inc();
    };
}
