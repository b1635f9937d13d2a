//! 本地文件安装
//!
//! - 陈旧判断：本地文件 mtime 与远端构建时间比较
//! - 临时文件：与目标同目录，失败路径上由 Drop 自动删除
//! - 备份：旧文件改名为 `.old`
//! - 原子替换：rename 临时文件到目标路径

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::database::paths::backup_path;
use crate::errors::{GeoKeeperError, Result};

/// 本地文件的修改时间；文件不存在或不可读时为 None
pub fn local_build_time(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

/// 远端构建时间严格晚于本地 mtime 才需要下载；本地缺失视为无限陈旧
pub fn is_stale(local: Option<DateTime<Utc>>, remote: DateTime<Utc>) -> bool {
    match local {
        None => true,
        Some(local) => remote > local,
    }
}

/// 尚未提交的临时文件，未 commit 时在 Drop 中删除
pub struct PendingFile {
    path: PathBuf,
    file: Option<File>,
    committed: bool,
}

impl PendingFile {
    /// 创建（或截断遗留的）临时文件
    pub fn create(path: PathBuf) -> Result<Self> {
        let file = File::create(&path).map_err(|e| {
            GeoKeeperError::file_operation(format!("create {}: {}", path.display(), e))
        })?;
        Ok(Self {
            path,
            file: Some(file),
            committed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn writer(&mut self) -> Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| GeoKeeperError::file_operation("temporary file already closed"))
    }

    /// 落盘并关闭文件，把 mtime 设为远端构建时间
    ///
    /// 设置 mtime 失败只记录日志：下一轮会重新下载，但本次安装仍然有效。
    pub fn finish(&mut self, build: DateTime<Utc>) -> Result<()> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| GeoKeeperError::file_operation("temporary file already closed"))?;

        file.flush()?;
        file.sync_all().map_err(|e| {
            GeoKeeperError::file_operation(format!("sync {}: {}", self.path.display(), e))
        })?;

        if let Err(e) = file.set_modified(SystemTime::from(build)) {
            warn!(
                "Failed to set modification time on {}: {}",
                self.path.display(),
                e
            );
        }
        Ok(())
    }

    /// 原子替换目标文件
    pub fn commit(mut self, dest: &Path) -> Result<()> {
        // 关闭句柄后再 rename
        self.file.take();
        fs::rename(&self.path, dest).map_err(|e| {
            GeoKeeperError::file_operation(format!(
                "rename {} -> {}: {}",
                self.path.display(),
                dest.display(),
                e
            ))
        })?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.file.take();
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed temporary file {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove temporary file {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// 把现有文件改名为 `.old`（替换之前的备份）；目标不存在时返回 None
pub fn backup_existing(path: &Path) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }

    let backup = backup_path(path);
    match fs::remove_file(&backup) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(GeoKeeperError::file_operation(format!(
                "remove {}: {}",
                backup.display(),
                e
            )));
        }
    }

    fs::rename(path, &backup).map_err(|e| {
        GeoKeeperError::file_operation(format!(
            "rename {} -> {}: {}",
            path.display(),
            backup.display(),
            e
        ))
    })?;
    Ok(Some(backup))
}

/// 安装失败后把备份放回原位，保证目标路径上仍有可打开的文件
pub fn restore_backup(backup: &Path, path: &Path) {
    if path.exists() {
        return;
    }
    if let Err(e) = fs::rename(backup, path) {
        warn!(
            "Failed to restore backup {} -> {}: {}",
            backup.display(),
            path.display(),
            e
        );
    }
}
