//! HTTP API
//!
//! - `GET /`: IP lookup, guarded by the token middleware
//! - `GET /health`: manager state and per-database build epoch
//! - `GET /metrics`: Prometheus text (feature `metrics`)
//!
//! Handlers expect `web::Data<dyn GeoLocator>` and optionally
//! `web::Data<ApiToken>` / `web::Data<AppStartTime>` in app data.

pub mod middleware;
pub mod services;

use actix_web::middleware::from_fn;
use actix_web::web;

use self::middleware::token_auth;
use self::services::{HealthService, LookupService, MetricsService};

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/")
            .wrap(from_fn(token_auth))
            .route(web::get().to(LookupService::lookup))
            .route(web::head().to(LookupService::lookup)),
    )
    .route("/health", web::get().to(HealthService::health_check))
    .route("/health", web::head().to(HealthService::health_check))
    .route("/metrics", web::get().to(MetricsService::metrics));
}
