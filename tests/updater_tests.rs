//! Updater tests
//!
//! Runs full refresh cycles against an in-memory `DatabaseSource` that serves
//! tar.gz archives built on the fly, over temporary data directories.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use chrono::{DateTime, TimeZone, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use geokeeper::config::UpdaterConfig;
use geokeeper::database::paths::{backup_path, database_path, temp_path};
use geokeeper::errors::{GeoKeeperError, Result};
use geokeeper::updater::{DatabaseSource, RefreshOutcome, Updater, local_build_time};
use tempfile::TempDir;

// =============================================================================
// Test Setup
// =============================================================================

const CITY: &str = "GeoLite2-City";
const COUNTRY: &str = "GeoLite2-Country";
const ASN: &str = "GeoLite2-ASN";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 1, 6, 0, 0).unwrap()
}

fn t1() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 15, 8, 12, 31).unwrap()
}

fn tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::fast()));
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// 标准 MaxMind 归档布局：目录 + 许可文件 + 数据库
fn edition_archive(name: &str, content: &[u8]) -> Vec<u8> {
    let dir = format!("{}_20241015", name);
    let copyright = format!("{}/COPYRIGHT.txt", dir);
    let license = format!("{}/LICENSE.txt", dir);
    let database = format!("{}/{}.mmdb", dir, name);
    tar_gz(&[
        (copyright.as_str(), &b"Database and Contents Copyright (c) MaxMind"[..]),
        (license.as_str(), &b"GeoLite2 End User License Agreement"[..]),
        (database.as_str(), content),
    ])
}

/// 在 fetch 中阻塞，直到测试放行
struct FetchGate {
    entered: Sender<()>,
    release: Receiver<()>,
}

#[derive(Default)]
struct FakeSource {
    builds: Mutex<HashMap<String, DateTime<Utc>>>,
    archives: Mutex<HashMap<String, Vec<u8>>>,
    probe_failures: Mutex<HashMap<String, String>>,
    gate: Mutex<Option<FetchGate>>,
    probes: AtomicUsize,
    fetches: AtomicUsize,
}

impl FakeSource {
    fn publish(&self, name: &str, build: DateTime<Utc>, archive: Vec<u8>) {
        self.builds.lock().unwrap().insert(name.to_string(), build);
        self.archives.lock().unwrap().insert(name.to_string(), archive);
    }

    fn fail_probe(&self, name: &str, reason: &str) {
        self.probe_failures
            .lock()
            .unwrap()
            .insert(name.to_string(), reason.to_string());
    }

    fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl DatabaseSource for FakeSource {
    fn build_time(&self, name: &str) -> Result<DateTime<Utc>> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.probe_failures.lock().unwrap().get(name) {
            return Err(GeoKeeperError::http(reason.clone()));
        }
        self.builds
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .ok_or_else(|| GeoKeeperError::http(format!("404 for {}", name)))
    }

    fn fetch(&self, name: &str) -> Result<Box<dyn Read>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.send(()).unwrap();
            gate.release.recv().unwrap();
        }
        let archive = self
            .archives
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| GeoKeeperError::http(format!("404 for {}", name)))?;
        Ok(Box::new(Cursor::new(archive)))
    }
}

fn install_local(dir: &Path, name: &str, content: &[u8], mtime: DateTime<Utc>) {
    let path = database_path(dir, name);
    fs::write(&path, content).unwrap();
    let file = File::options().write(true).open(&path).unwrap();
    file.set_modified(SystemTime::from(mtime)).unwrap();
}

fn setup() -> (TempDir, Arc<FakeSource>, Updater) {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(FakeSource::default());
    let updater = Updater::with_source(dir.path(), source.clone());
    (dir, source, updater)
}

// =============================================================================
// Refresh cycle
// =============================================================================

#[test]
fn test_stale_database_is_replaced_and_backed_up() {
    let (dir, source, updater) = setup();
    install_local(dir.path(), CITY, b"city-t0", t0());
    source.publish(CITY, t1(), edition_archive(CITY, b"city-t1"));

    let report = updater.refresh(&[CITY]);
    assert!(report.is_success());
    assert_eq!(report.updated(), vec![CITY]);

    let path = database_path(dir.path(), CITY);
    let backup = backup_path(&path);
    match report.outcome(CITY) {
        Some(RefreshOutcome::Updated { build, backup: b }) => {
            assert_eq!(*build, t1());
            assert_eq!(b.as_deref(), Some(backup.as_path()));
        }
        other => panic!("expected Updated, got {:?}", other),
    }
    assert_eq!(fs::read(&path).unwrap(), b"city-t1");
    assert_eq!(local_build_time(&path), Some(t1()));
    assert_eq!(fs::read(&backup).unwrap(), b"city-t0");
    assert!(!temp_path(&path).exists());

    // 第二轮只做探测
    let report = updater.refresh(&[CITY]);
    assert!(matches!(
        report.outcome(CITY),
        Some(RefreshOutcome::UpToDate { local }) if *local == t1()
    ));
    assert_eq!(source.fetches(), 1);
    assert_eq!(source.probes(), 2);
    assert_eq!(fs::read(&path).unwrap(), b"city-t1");
    assert_eq!(fs::read(&backup).unwrap(), b"city-t0");
}

#[test]
fn test_equal_or_older_remote_is_skipped() {
    let (dir, source, updater) = setup();
    install_local(dir.path(), CITY, b"city-t1", t1());
    install_local(dir.path(), ASN, b"asn-t1", t1());
    source.publish(CITY, t1(), edition_archive(CITY, b"unused"));
    source.publish(ASN, t0(), edition_archive(ASN, b"unused"));

    let report = updater.refresh(&[CITY, ASN]);
    assert!(report.is_success());
    assert!(report.updated().is_empty());
    assert!(matches!(report.outcome(CITY), Some(RefreshOutcome::UpToDate { .. })));
    assert!(matches!(report.outcome(ASN), Some(RefreshOutcome::UpToDate { .. })));
    assert_eq!(source.fetches(), 0);
    assert_eq!(fs::read(database_path(dir.path(), CITY)).unwrap(), b"city-t1");
}

#[test]
fn test_missing_local_file_is_always_downloaded() {
    let (dir, source, updater) = setup();
    source.publish(COUNTRY, t0(), edition_archive(COUNTRY, b"country"));

    let report = updater.refresh(&[COUNTRY]);
    match report.outcome(COUNTRY) {
        Some(RefreshOutcome::Updated { backup, .. }) => assert!(backup.is_none()),
        other => panic!("expected Updated, got {:?}", other),
    }
    let path = database_path(dir.path(), COUNTRY);
    assert_eq!(fs::read(&path).unwrap(), b"country");
    assert!(!backup_path(&path).exists());
}

#[test]
fn test_probe_failure_only_affects_that_database() {
    let (dir, source, updater) = setup();
    source.fail_probe(COUNTRY, "connection refused");
    source.publish(CITY, t1(), edition_archive(CITY, b"city"));
    source.publish(ASN, t1(), edition_archive(ASN, b"asn"));

    let report = updater.refresh(&[COUNTRY, CITY, ASN]);
    assert!(!report.is_success());
    assert_eq!(report.updated(), vec![CITY, ASN]);

    let failed = report.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, COUNTRY);
    assert!(matches!(failed[0].1, GeoKeeperError::Http(_)));
    assert!(!database_path(dir.path(), COUNTRY).exists());
    assert_eq!(source.fetches(), 2);
}

#[test]
fn test_archive_without_database_leaves_install_untouched() {
    let (dir, source, updater) = setup();
    install_local(dir.path(), ASN, b"asn-t0", t0());
    source.publish(ASN, t1(), tar_gz(&[("GeoLite2-ASN_20241015/README.txt", &b"empty"[..])]));

    let report = updater.refresh(&[ASN]);
    assert!(matches!(
        report.outcome(ASN),
        Some(RefreshOutcome::Failed(GeoKeeperError::Archive(_)))
    ));

    let path = database_path(dir.path(), ASN);
    assert_eq!(fs::read(&path).unwrap(), b"asn-t0");
    assert_eq!(local_build_time(&path), Some(t0()));
    assert!(!temp_path(&path).exists());
    assert!(!backup_path(&path).exists());
}

#[test]
fn test_corrupt_archive_leaves_install_untouched() {
    let (dir, source, updater) = setup();
    install_local(dir.path(), CITY, b"city-t0", t0());
    source.publish(CITY, t1(), b"<html>rate limited</html>".to_vec());

    let report = updater.refresh(&[CITY]);
    assert_eq!(report.failed().len(), 1);

    let path = database_path(dir.path(), CITY);
    assert_eq!(fs::read(&path).unwrap(), b"city-t0");
    assert!(!temp_path(&path).exists());
}

#[test]
fn test_leftover_temp_file_is_overwritten() {
    let (dir, source, updater) = setup();
    let path = database_path(dir.path(), CITY);
    fs::write(temp_path(&path), b"half-written by a crashed run").unwrap();
    source.publish(CITY, t1(), edition_archive(CITY, b"city"));

    assert!(updater.refresh(&[CITY]).is_success());
    assert_eq!(fs::read(&path).unwrap(), b"city");
    assert!(!temp_path(&path).exists());
}

#[test]
fn test_data_directory_is_created() {
    let root = TempDir::new().unwrap();
    let data_dir = root.path().join("var").join("geoip");
    let source = Arc::new(FakeSource::default());
    source.publish(ASN, t0(), edition_archive(ASN, b"asn"));

    let updater = Updater::with_source(&data_dir, source);
    assert!(updater.refresh(&[ASN]).is_success());
    assert!(database_path(&data_dir, ASN).exists());
}

#[test]
fn test_backup_failure_does_not_block_install() {
    let (dir, source, updater) = setup();
    install_local(dir.path(), CITY, b"city-t0", t0());
    source.publish(CITY, t1(), edition_archive(CITY, b"city-t1"));

    // `.old` 被一个非空目录占住，备份无法完成
    let path = database_path(dir.path(), CITY);
    let backup = backup_path(&path);
    fs::create_dir(&backup).unwrap();
    fs::write(backup.join("keep"), b"x").unwrap();

    let report = updater.refresh(&[CITY]);
    assert!(matches!(
        report.outcome(CITY),
        Some(RefreshOutcome::Updated { backup: None, .. })
    ));
    assert_eq!(fs::read(&path).unwrap(), b"city-t1");
    assert_eq!(local_build_time(&path), Some(t1()));
    assert!(backup.join("keep").exists());
    assert!(!temp_path(&path).exists());
}

#[test]
fn test_failed_commit_removes_temp_and_keeps_previous_install() {
    let (dir, source, updater) = setup();
    // 目录的 mtime 是创建时刻，远端构建时间必须更晚
    let build = Utc::now() + chrono::TimeDelta::days(1);
    source.publish(CITY, build, edition_archive(CITY, b"city-t1"));

    // 目标路径和 `.old` 都是非空目录：备份失败，rename 也失败
    let path = database_path(dir.path(), CITY);
    let backup = backup_path(&path);
    fs::create_dir(&path).unwrap();
    fs::write(path.join("previous"), b"city-t0").unwrap();
    fs::create_dir(&backup).unwrap();
    fs::write(backup.join("keep"), b"x").unwrap();

    let report = updater.refresh(&[CITY]);
    assert!(!report.is_success());
    assert!(matches!(
        report.outcome(CITY),
        Some(RefreshOutcome::Failed(GeoKeeperError::FileOperation(_)))
    ));
    assert!(!temp_path(&path).exists());
    assert_eq!(fs::read(path.join("previous")).unwrap(), b"city-t0");
    assert!(backup.join("keep").exists());
}

// =============================================================================
// Database names
// =============================================================================

#[test]
fn test_unknown_database_name_touches_nothing() {
    let root = TempDir::new().unwrap();
    let data_dir = root.path().join("data");
    let source = Arc::new(FakeSource::default());
    source.publish("../escaped", t1(), edition_archive("escaped", b"x"));
    source.publish(ASN, t1(), edition_archive(ASN, b"asn"));
    let updater = Updater::with_source(&data_dir, source.clone());

    let report = updater.refresh(&["../escaped", ASN]);
    assert!(matches!(
        report.outcome("../escaped"),
        Some(RefreshOutcome::Failed(GeoKeeperError::Validation(_)))
    ));
    assert!(matches!(report.outcome(ASN), Some(RefreshOutcome::Updated { .. })));
    assert_eq!(report.failed().len(), 1);

    assert!(!root.path().join("escaped.mmdb").exists());
    assert_eq!(source.probes(), 1);
}

#[test]
fn test_label_resolves_to_edition_path() {
    let (dir, source, updater) = setup();
    source.publish(CITY, t1(), edition_archive(CITY, b"city"));

    let report = updater.refresh(&["city"]);
    assert_eq!(report.updated(), vec![CITY]);
    assert_eq!(fs::read(database_path(dir.path(), CITY)).unwrap(), b"city");
    assert!(!dir.path().join("city.mmdb").exists());
}

// =============================================================================
// Single flight
// =============================================================================

#[test]
fn test_overlapping_refresh_of_same_database_is_skipped() {
    let (dir, source, updater) = setup();
    source.publish(CITY, t1(), edition_archive(CITY, b"city"));
    source.publish(ASN, t1(), edition_archive(ASN, b"asn"));

    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    *source.gate.lock().unwrap() = Some(FetchGate {
        entered: entered_tx,
        release: release_rx,
    });

    std::thread::scope(|s| {
        let slow = s.spawn(|| updater.refresh(&[CITY]));
        entered_rx.recv().unwrap();

        let report = updater.refresh(&[CITY, ASN]);
        assert!(matches!(report.outcome(CITY), Some(RefreshOutcome::InProgress)));
        assert!(matches!(report.outcome(ASN), Some(RefreshOutcome::Updated { .. })));

        release_tx.send(()).unwrap();
        let report = slow.join().unwrap();
        assert!(matches!(report.outcome(CITY), Some(RefreshOutcome::Updated { .. })));
    });

    assert_eq!(fs::read(database_path(dir.path(), CITY)).unwrap(), b"city");
    // 放行后可以再次刷新
    assert!(matches!(
        updater.refresh(&[CITY]).outcome(CITY),
        Some(RefreshOutcome::UpToDate { .. })
    ));
}

#[test]
fn test_from_config_requires_credentials() {
    let dir = TempDir::new().unwrap();
    let err = Updater::from_config(&UpdaterConfig::default(), dir.path())
        .err()
        .unwrap();
    assert!(matches!(err, GeoKeeperError::Config(_)));
}
