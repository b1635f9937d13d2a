//! GeoKeeper - keeps MaxMind GeoIP databases fresh and serves lookups
//!
//! Two cooperating background subsystems share one data directory:
//! the updater downloads newer database builds and installs them with an
//! atomic rename, and the reload manager reopens whatever file sits at each
//! path on a timer and swaps it in without blocking readers.
//!
//! # Features
//! - **metrics**: Prometheus metrics export
//! - **full**: All features enabled
//!
//! # Architecture
//! - `database`: database handles, slots and the live-reloading manager
//! - `updater`: freshness probe, download, extraction and atomic install
//! - `services`: IP lookup facade over the manager
//! - `api`: HTTP services and middleware
//! - `config`: Configuration management
//! - `runtime`: Application lifecycle and execution modes
//! - `system`: logging, supervised tasks, shutdown signal

#[macro_use]
mod metrics_macros;

pub mod api;
pub mod cli;
pub mod config;
pub mod database;
pub mod errors;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod runtime;
pub mod services;
pub mod system;
pub mod updater;
pub mod utils;
