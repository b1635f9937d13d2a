//! Supervised background tasks
//!
//! A supervised task runs its body in a child tokio task. A panic in the body
//! is caught at the join boundary, logged, and the body is relaunched after a
//! backoff delay. The supervisor exits when the body returns normally or
//! when shutdown is signalled, including while it waits to restart.

use std::any::Any;
use std::future::Future;
use std::time::Instant;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::backoff::Backoff;

/// Resolves once `true` has been sent on the channel or the sender is gone.
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

pub fn spawn_supervised<F, Fut>(
    name: &'static str,
    mut shutdown: watch::Receiver<bool>,
    mut backoff: Backoff,
    factory: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut restarts: u64 = 0;
        loop {
            if *shutdown.borrow() {
                break;
            }

            let started = Instant::now();
            match tokio::spawn(factory()).await {
                Ok(()) => {
                    debug!("Supervised task '{}' exited", name);
                    break;
                }
                Err(e) if e.is_panic() => {
                    restarts += 1;
                    // A run that outlived the longest delay counts as healthy.
                    if started.elapsed() > backoff.max() {
                        backoff.reset();
                    }
                    let delay = backoff.fail();
                    error!(
                        "Supervised task '{}' panicked: {} (restart #{}, next attempt in {:?})",
                        name,
                        panic_message(e.into_panic()),
                        restarts,
                        delay
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = wait_for_shutdown(&mut shutdown) => break,
                    }
                }
                Err(e) => {
                    warn!("Supervised task '{}' was cancelled: {}", name, e);
                    break;
                }
            }
        }
    })
}

pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
