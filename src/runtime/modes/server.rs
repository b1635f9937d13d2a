//! Server mode
//!
//! Starts the HTTP lookup server alongside the two background loops:
//! periodic database download and periodic hot reload.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{
    App, HttpServer,
    middleware::{Compress, DefaultHeaders},
    web,
};
use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::api;
use crate::api::middleware::ApiToken;
use crate::api::services::AppStartTime;
use crate::config::StaticConfig;
use crate::runtime::lifetime;
use crate::services::GeoLocator;
use crate::system::backoff::Backoff;
use crate::system::shutdown::{shutdown_channel, wait_for_ctrl_c};
use crate::system::supervisor::spawn_supervised;
use crate::updater::update_loop;

const UPDATE_TASK_NAME: &str = "geoip-update";

/// Run the HTTP server
///
/// 1. Runs the first update cycle and opens the databases
/// 2. Starts the supervised update loop
/// 3. Serves lookups until Ctrl+C
/// 4. Stops the update loop, then the reload manager, then the HTTP server
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server(config: StaticConfig) -> Result<()> {
    let app_start_time = AppStartTime {
        start_datetime: chrono::Utc::now(),
    };

    let startup = lifetime::startup::prepare_server_startup(&config)
        .await
        .map_err(|e| {
            tracing::error!("Server startup failed: {:#}", e);
            e
        })?;

    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    let update_task = startup.updater.as_ref().map(|updater| {
        let updater = Arc::clone(updater);
        let names = Arc::clone(&startup.editions);
        let interval = Duration::from_secs(config.updater.update_interval_secs);
        let loop_rx = shutdown_rx.clone();
        info!(
            "Database updates scheduled every {:?} for {:?}",
            interval, names
        );
        spawn_supervised(
            UPDATE_TASK_NAME,
            shutdown_rx.clone(),
            Backoff::new(Duration::from_secs(1), Duration::from_secs(60)),
            move || {
                update_loop(
                    Arc::clone(&updater),
                    Arc::clone(&names),
                    interval,
                    loop_rx.clone(),
                )
            },
        )
    });

    let locator: Arc<dyn GeoLocator> = startup.manager.clone();
    let token = ApiToken::new(config.server.api_token.clone());
    if token.is_enabled() {
        info!("Lookup endpoint requires an API token");
    } else {
        warn!("Lookup endpoint is public (server.api_token not set)");
    }

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Compress::default())
            .wrap(DefaultHeaders::new().add(("Cache-Control", "no-cache, no-store, must-revalidate")))
            .app_data(web::Data::from(Arc::clone(&locator)))
            .app_data(web::Data::new(token.clone()))
            .app_data(web::Data::new(app_start_time.clone()))
            .configure(api::routes)
    })
    .keep_alive(Duration::from_secs(30))
    .disable_signals();

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    warn!("Starting server at http://{}", bind_address);
    let server = server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run();
    let handle = server.handle();
    let mut server_task = actix_web::rt::spawn(server);

    // 等待服务器退出或关闭信号
    let exited = tokio::select! {
        res = &mut server_task => Some(res),
        _ = wait_for_ctrl_c() => None,
    };

    lifetime::shutdown::shutdown_background(
        &shutdown_tx,
        update_task,
        &startup.manager,
        lifetime::shutdown::SHUTDOWN_TIMEOUT,
    )
    .await;

    match exited {
        Some(res) => res.context("HTTP server task failed")??,
        None => {
            handle.stop(true).await;
            server_task.await.context("HTTP server task failed")??;
        }
    }

    warn!("Graceful shutdown: all tasks completed");
    Ok(())
}
