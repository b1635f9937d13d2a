use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::database::{DatabaseReader, ReloadManager};

/// 等待下载循环退出的默认超时时间
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// 停止下载循环，再停止热重载并关闭所有句柄
///
/// 正在进行的下载无法中断，只对等待下载循环设置超时；
/// 热重载总会被停止。
pub async fn shutdown_background<D: DatabaseReader>(
    shutdown: &watch::Sender<bool>,
    update_task: Option<JoinHandle<()>>,
    manager: &ReloadManager<D>,
    wait: Duration,
) {
    shutdown.send_replace(true);

    if let Some(task) = update_task {
        match timeout(wait, task).await {
            Ok(Ok(())) => info!("Update task stopped"),
            Ok(Err(e)) => warn!("Update task ended abnormally: {}", e),
            Err(_) => error!("Update task did not stop within {:?}, abandoning it", wait),
        }
    }

    manager.stop().await;
    info!("Background tasks stopped");
}
