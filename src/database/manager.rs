//! Live-reloading database manager
//!
//! Holds the country, city and ASN databases open and swaps in whatever file
//! currently sits at each fixed path on every timer tick. A failed open keeps
//! the previous handle serving; a panic inside a tick is caught by the
//! supervisor and the reload loop is restarted.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{DatabaseKind, DatabaseReader, DatabaseSlot};
use crate::config::GeoIpConfig;
use crate::errors::Result;
use crate::system::backoff::Backoff;
use crate::system::supervisor::{spawn_supervised, wait_for_shutdown};

const RELOAD_TASK_NAME: &str = "geoip-reload";

#[derive(Debug, Clone)]
pub struct ReloadOptions {
    pub interval: Duration,
    pub restart_delay_base: Duration,
    pub restart_delay_max: Duration,
}

impl Default for ReloadOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2 * 60 * 60),
            restart_delay_base: Duration::from_secs(1),
            restart_delay_max: Duration::from_secs(60),
        }
    }
}

impl ReloadOptions {
    pub fn from_config(config: &GeoIpConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.reload_interval_secs),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Running,
    Stopping,
    Stopped,
}

impl std::fmt::Display for ManagerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManagerState::Running => write!(f, "running"),
            ManagerState::Stopping => write!(f, "stopping"),
            ManagerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// The three slots, shared between the manager and its reload task.
struct Databases<D> {
    data_dir: PathBuf,
    country: DatabaseSlot<D>,
    city: DatabaseSlot<D>,
    asn: DatabaseSlot<D>,
    /// Set once `close_all` ran; held across a whole reload tick so a tick
    /// never installs a handle after the slots were emptied.
    closed: Mutex<bool>,
}

impl<D: DatabaseReader> Databases<D> {
    /// Opens every database or none: on the first failure the handles already
    /// opened are closed before the error is returned.
    fn open(data_dir: PathBuf) -> Result<Self> {
        let databases = Self {
            data_dir,
            country: DatabaseSlot::new(),
            city: DatabaseSlot::new(),
            asn: DatabaseSlot::new(),
            closed: Mutex::new(false),
        };

        for kind in DatabaseKind::all() {
            let path = kind.path(&databases.data_dir);
            match D::open(&path) {
                Ok(db) => {
                    debug!(
                        "Opened {} database at {} (build epoch {})",
                        kind,
                        path.display(),
                        db.build_epoch()
                    );
                    databases.slot(kind).swap(Arc::new(db));
                }
                Err(e) => {
                    databases.close_all();
                    return Err(e);
                }
            }
        }

        Ok(databases)
    }

    fn slot(&self, kind: DatabaseKind) -> &DatabaseSlot<D> {
        match kind {
            DatabaseKind::Country => &self.country,
            DatabaseKind::City => &self.city,
            DatabaseKind::Asn => &self.asn,
        }
    }

    fn reload_all(&self) -> usize {
        let closed = self.closed.lock();
        if *closed {
            return 0;
        }
        DatabaseKind::all()
            .filter(|kind| self.reload_one(*kind))
            .count()
    }

    fn reload_one(&self, kind: DatabaseKind) -> bool {
        let path = kind.path(&self.data_dir);
        let db = match D::open(&path) {
            Ok(db) => db,
            Err(e) => {
                warn!(
                    "Failed to reload {} database from {}: {}",
                    kind,
                    path.display(),
                    e
                );
                inc_counter!(crate::metrics::METRICS.reloads_total, &[kind.label(), "failure"]);
                return false;
            }
        };

        let build = db.build_epoch();
        let old = self.slot(kind).swap(Arc::new(db));
        inc_counter!(crate::metrics::METRICS.reloads_total, &[kind.label(), "success"]);

        match old.as_ref().map(|o| o.build_epoch()) {
            Some(previous) if previous == build => {
                debug!("Reloaded {} database, build epoch unchanged ({})", kind, build);
            }
            previous => {
                info!(
                    "Reloaded {} database: build epoch {:?} -> {}",
                    kind, previous, build
                );
            }
        }

        if let Some(old) = old {
            close_handle(kind, old);
        }
        true
    }

    fn close_all(&self) {
        let mut closed = self.closed.lock();
        *closed = true;
        for kind in DatabaseKind::all() {
            if let Some(handle) = self.slot(kind).take() {
                close_handle(kind, handle);
            }
        }
    }
}

/// Closes a handle that is no longer installed in its slot. Readers that
/// still hold it keep it alive; it is then released when the last one drops.
fn close_handle<D: DatabaseReader>(kind: DatabaseKind, handle: Arc<D>) {
    match Arc::try_unwrap(handle) {
        Ok(db) => {
            if let Err(e) = db.close() {
                warn!("Failed to close old {} database: {}", kind, e);
            }
        }
        Err(shared) => {
            debug!(
                "Old {} database still held by {} reader(s), released on last drop",
                kind,
                Arc::strong_count(&shared) - 1
            );
        }
    }
}

async fn reload_loop<D: DatabaseReader>(
    databases: Arc<Databases<D>>,
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

        debug!("Reload tick: reopening GeoIP databases");
        let dbs = Arc::clone(&databases);
        // Runs to completion even if shutdown arrives meanwhile, so a swap is never cut short.
        if let Err(e) = tokio::task::spawn_blocking(move || dbs.reload_all()).await
            && e.is_panic()
        {
            std::panic::resume_unwind(e.into_panic());
        }
    }
}

/// Owns the three database slots and the periodic reload task.
pub struct ReloadManager<D: DatabaseReader> {
    databases: Arc<Databases<D>>,
    state: watch::Sender<ManagerState>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<D: DatabaseReader> ReloadManager<D> {
    /// Opens all three databases and launches the reload task.
    ///
    /// Fails without leaving anything open if any database cannot be opened.
    /// Must be called inside a tokio runtime.
    pub fn start(data_dir: impl Into<PathBuf>, options: ReloadOptions) -> Result<Self> {
        let data_dir = data_dir.into();
        let databases = Arc::new(Databases::open(data_dir)?);
        let (shutdown, rx) = watch::channel(false);

        let task = {
            let databases = Arc::clone(&databases);
            let interval = options.interval;
            let loop_rx = rx.clone();
            spawn_supervised(
                RELOAD_TASK_NAME,
                rx,
                Backoff::new(options.restart_delay_base, options.restart_delay_max),
                move || reload_loop(Arc::clone(&databases), interval, loop_rx.clone()),
            )
        };

        info!(
            "GeoIP reload manager started for {} (interval {:?})",
            databases.data_dir.display(),
            options.interval
        );

        Ok(Self {
            databases,
            state: watch::Sender::new(ManagerState::Running),
            shutdown,
            task: Mutex::new(Some(task)),
        })
    }

    /// Current handle for `kind`; `None` once the manager is stopped.
    pub fn reader(&self, kind: DatabaseKind) -> Option<Arc<D>> {
        self.databases.slot(kind).read()
    }

    pub fn country(&self) -> Option<Arc<D>> {
        self.reader(DatabaseKind::Country)
    }

    pub fn city(&self) -> Option<Arc<D>> {
        self.reader(DatabaseKind::City)
    }

    pub fn asn(&self) -> Option<Arc<D>> {
        self.reader(DatabaseKind::Asn)
    }

    pub fn data_dir(&self) -> &Path {
        &self.databases.data_dir
    }

    pub fn state(&self) -> ManagerState {
        *self.state.borrow()
    }

    /// Runs one reload tick on the calling thread and returns how many
    /// databases were swapped. Blocking.
    pub fn reload_all(&self) -> usize {
        if self.state() != ManagerState::Running {
            return 0;
        }
        self.databases.reload_all()
    }

    /// Stops the reload task at its next wait point, then closes every handle.
    ///
    /// A concurrent or repeated call returns once the manager is `Stopped`.
    pub async fn stop(&self) {
        let first = self.state.send_if_modified(|state| {
            if *state != ManagerState::Running {
                return false;
            }
            *state = ManagerState::Stopping;
            true
        });
        if !first {
            let mut rx = self.state.subscribe();
            let _ = rx.wait_for(|state| *state == ManagerState::Stopped).await;
            return;
        }

        self.shutdown.send_replace(true);
        let task = self.task.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            warn!("GeoIP reload task ended abnormally: {}", e);
        }

        self.databases.close_all();
        self.state.send_replace(ManagerState::Stopped);
        info!("GeoIP reload manager stopped");
    }
}

impl<D: DatabaseReader> Drop for ReloadManager<D> {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}
