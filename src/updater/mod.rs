//! 数据库下载器
//!
//! 每个数据库独立执行一轮刷新：
//! 1. HEAD 探测远端构建时间
//! 2. 与本地文件 mtime 比较，不陈旧则跳过
//! 3. 下载 tar.gz 并解压第一个 `.mmdb` 条目到同目录临时文件
//! 4. 临时文件 mtime 设为远端构建时间
//! 5. 旧文件改名为 `.old`
//! 6. rename 临时文件到目标路径
//!
//! 与热重载之间只通过文件系统交互，不共享内存状态。

mod archive;
mod install;
mod source;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub use archive::{ExtractedEntry, extract_database};
pub use install::{PendingFile, backup_existing, is_stale, local_build_time, restore_backup};
pub use source::{DatabaseSource, MaxMindSource, parse_last_modified};

use crate::config::UpdaterConfig;
use crate::database::DatabaseKind;
use crate::database::paths::{DATABASE_SUFFIX, temp_path};
use crate::errors::{GeoKeeperError, Result};
use crate::system::supervisor::wait_for_shutdown;

/// 单个数据库一轮刷新的结果
#[derive(Debug)]
pub enum RefreshOutcome {
    /// 已安装新版本；`backup` 为旧文件的 `.old` 路径
    Updated {
        build: DateTime<Utc>,
        backup: Option<PathBuf>,
    },
    /// 本地已是最新，除探测外没有任何 I/O
    UpToDate { local: DateTime<Utc> },
    /// 同名数据库已有刷新在进行，本次未做任何操作
    InProgress,
    Failed(GeoKeeperError),
}

impl RefreshOutcome {
    /// 指标与日志使用的状态标签
    pub fn status(&self) -> &'static str {
        match self {
            RefreshOutcome::Updated { .. } => "success",
            RefreshOutcome::UpToDate { .. } => "skipped",
            RefreshOutcome::InProgress => "in_progress",
            RefreshOutcome::Failed(_) => "failure",
        }
    }
}

/// 一轮刷新中每个数据库的结果，顺序与请求一致
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub entries: Vec<(String, RefreshOutcome)>,
}

impl RefreshReport {
    pub fn outcome(&self, name: &str) -> Option<&RefreshOutcome> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, outcome)| outcome)
    }

    /// 本轮实际安装了新文件的数据库
    pub fn updated(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, outcome)| matches!(outcome, RefreshOutcome::Updated { .. }))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn failed(&self) -> Vec<(&str, &GeoKeeperError)> {
        self.entries
            .iter()
            .filter_map(|(name, outcome)| match outcome {
                RefreshOutcome::Failed(e) => Some((name.as_str(), e)),
                _ => None,
            })
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.failed().is_empty()
    }
}

/// 下载器
///
/// 除了进行中的数据库名集合外不持有可变状态，
/// 新鲜度标记就是文件本身的 mtime。
pub struct Updater {
    data_dir: PathBuf,
    source: Arc<dyn DatabaseSource>,
    in_flight: Mutex<HashSet<String>>,
}

/// 在 Drop 时把数据库名移出进行中集合
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    name: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.name);
    }
}

impl Updater {
    pub fn with_source(data_dir: impl Into<PathBuf>, source: Arc<dyn DatabaseSource>) -> Self {
        Self {
            data_dir: data_dir.into(),
            source,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// 使用 MaxMind 下载源；凭据缺失时返回配置错误
    pub fn from_config(config: &UpdaterConfig, data_dir: impl Into<PathBuf>) -> Result<Self> {
        let source = MaxMindSource::from_config(config)?;
        Ok(Self::with_source(data_dir, Arc::new(source)))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// 依次刷新 `names` 中的每个数据库，单个失败不影响其余
    ///
    /// 名称可以是 edition id 或 `country`/`city`/`asn`，结果以 edition id 记录；
    /// 未知名称记为 `Validation` 失败，不触碰任何文件。
    ///
    /// 阻塞调用：网络与磁盘 I/O 都在当前线程完成。
    pub fn refresh<S: AsRef<str>>(&self, names: &[S]) -> RefreshReport {
        let mut report = RefreshReport::default();

        if let Err(e) = std::fs::create_dir_all(&self.data_dir) {
            let err = GeoKeeperError::file_operation(format!(
                "create data directory {}: {}",
                self.data_dir.display(),
                e
            ));
            warn!("{}", err);
            for name in names {
                inc_counter!(
                    crate::metrics::METRICS.downloads_total,
                    &[name.as_ref(), "failure"]
                );
                report
                    .entries
                    .push((name.as_ref().to_string(), RefreshOutcome::Failed(err.clone())));
            }
            return report;
        }

        for name in names {
            // 名称只能是三个已知数据库之一，路径由 edition id 推出
            let (name, outcome) = match name.as_ref().parse::<DatabaseKind>() {
                Ok(kind) => (kind.edition_id(), self.refresh_one(kind)),
                Err(e) => (
                    name.as_ref(),
                    RefreshOutcome::Failed(GeoKeeperError::validation(e)),
                ),
            };
            log_outcome(name, &outcome);
            inc_counter!(
                crate::metrics::METRICS.downloads_total,
                &[name, outcome.status()]
            );
            report.entries.push((name.to_string(), outcome));
        }

        report
    }

    fn refresh_one(&self, kind: DatabaseKind) -> RefreshOutcome {
        let name = kind.edition_id();
        let Some(_guard) = self.claim(name) else {
            return RefreshOutcome::InProgress;
        };

        match self.install_latest(name, &kind.path(&self.data_dir)) {
            Ok(outcome) => outcome,
            Err(e) => RefreshOutcome::Failed(e),
        }
    }

    fn claim(&self, name: &str) -> Option<InFlightGuard<'_>> {
        if !self.in_flight.lock().insert(name.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            set: &self.in_flight,
            name: name.to_string(),
        })
    }

    fn install_latest(&self, name: &str, path: &Path) -> Result<RefreshOutcome> {
        let remote = self.source.build_time(name)?;

        let local = local_build_time(path);
        if let Some(local) = local
            && !is_stale(Some(local), remote)
        {
            return Ok(RefreshOutcome::UpToDate { local });
        }
        debug!(
            "{} is stale (local {:?}, remote {}), downloading",
            name, local, remote
        );

        let archive = self.source.fetch(name)?;
        let mut pending = PendingFile::create(temp_path(path))?;
        let entry = extract_database(archive, DATABASE_SUFFIX, pending.writer()?)?;
        debug!(
            "Extracted {} ({} bytes) to {}",
            entry.name,
            entry.size,
            pending.path().display()
        );
        pending.finish(remote)?;

        let backup = match backup_existing(path) {
            Ok(backup) => backup,
            Err(e) => {
                warn!("Failed to back up {}: {}", path.display(), e);
                None
            }
        };

        if let Err(e) = pending.commit(path) {
            if let Some(backup) = &backup {
                restore_backup(backup, path);
            }
            return Err(e);
        }

        Ok(RefreshOutcome::Updated {
            build: remote,
            backup,
        })
    }
}

fn log_outcome(name: &str, outcome: &RefreshOutcome) {
    match outcome {
        RefreshOutcome::Updated { build, backup } => match backup {
            Some(backup) => info!(
                "Installed {} built at {} (previous kept at {})",
                name,
                build,
                backup.display()
            ),
            None => info!("Installed {} built at {}", name, build),
        },
        RefreshOutcome::UpToDate { local } => {
            info!("{} is up to date (local build {})", name, local)
        }
        RefreshOutcome::InProgress => {
            info!("{} refresh already in progress, skipping", name)
        }
        RefreshOutcome::Failed(e) if e.is_transient() => {
            warn!("Failed to refresh {}, retrying next cycle: {}", name, e)
        }
        RefreshOutcome::Failed(e) => warn!("Rejected download of {}: {}", name, e),
    }
}

/// 定时下载循环
///
/// 首次执行在一个周期之后（启动时的那一轮由调用方直接完成）。
/// 每轮在阻塞线程池中运行，并且等上一轮结束后才开始计时下一轮。
pub async fn update_loop(
    updater: Arc<Updater>,
    names: Arc<[String]>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => return,
            _ = ticker.tick() => {}
        }

        let updater = Arc::clone(&updater);
        let names = Arc::clone(&names);
        match tokio::task::spawn_blocking(move || updater.refresh(&names[..])).await {
            Ok(report) => {
                let failed = report.failed().len();
                if failed > 0 {
                    warn!(
                        "Update cycle finished with {} failure(s) out of {}",
                        failed,
                        report.entries.len()
                    );
                } else {
                    debug!("Update cycle finished: {} updated", report.updated().len());
                }
            }
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => warn!("Update cycle was cancelled: {}", e),
        }
    }
}
