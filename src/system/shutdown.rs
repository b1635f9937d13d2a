//! 关闭信号
//!
//! 进程内所有后台任务共用一个 `watch` 通道：发送 `true` 即请求退出。

use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

/// 创建关闭通道
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// 等待 Ctrl+C
pub async fn wait_for_ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!(
            "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
            e
        ),
    }
}
