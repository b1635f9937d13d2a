//! 服务启动准备
//!
//! 1. 创建下载器（凭据缺失时仅禁用下载，不阻止启动）
//! 2. 首轮下载在打开数据库之前完成，保证新部署时数据库文件存在
//! 3. 打开三个数据库并启动热重载

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::StaticConfig;
use crate::database::{MaxMindDatabase, ReloadManager, ReloadOptions};
use crate::updater::Updater;

pub struct StartupContext {
    pub manager: Arc<ReloadManager<MaxMindDatabase>>,
    /// 未启用或凭据缺失时为 None
    pub updater: Option<Arc<Updater>>,
    pub editions: Arc<[String]>,
}

/// 准备服务器启动的上下文
pub async fn prepare_server_startup(config: &StaticConfig) -> Result<StartupContext> {
    let start_time = std::time::Instant::now();
    let data_dir = config.geoip.data_dir.clone();
    let editions: Arc<[String]> = config.updater.editions.clone().into();

    let updater = if !config.updater.enabled {
        info!("Updater disabled by configuration");
        None
    } else {
        match Updater::from_config(&config.updater, data_dir.clone()) {
            Ok(updater) => Some(Arc::new(updater)),
            Err(e) => {
                warn!("Updater disabled: {}", e);
                None
            }
        }
    };

    if let Some(updater) = &updater {
        let updater = Arc::clone(updater);
        let names = Arc::clone(&editions);
        let report = tokio::task::spawn_blocking(move || updater.refresh(&names[..]))
            .await
            .context("Initial update cycle panicked")?;
        for (name, e) in report.failed() {
            warn!("Initial update of {} failed: {}", name, e);
        }
    }

    let manager = ReloadManager::<MaxMindDatabase>::start(
        data_dir.clone(),
        ReloadOptions::from_config(&config.geoip),
    )
    .with_context(|| format!("Failed to open GeoIP databases in {}", data_dir.display()))?;

    debug!("Startup prepared in {:?}", start_time.elapsed());
    Ok(StartupContext {
        manager: Arc::new(manager),
        updater,
        editions,
    })
}
