//! Caller-owned periodic cleanup.
//!
//! The cache never sweeps itself; an application that wants expired
//! entries reclaimed without waiting for reads spawns this task.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use crate::cache::TtlCache;

/// Spawn a task calling [`TtlCache::cleanup`] every `interval` until
/// `shutdown` fires.
pub fn spawn_sweeper<V>(
    cache: TtlCache<V>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()>
where
    V: Send + Sync + 'static,
{
    let interval = interval.max(Duration::from_millis(1));

    tokio::spawn(async move {
        tracing::debug!(interval = ?interval, "Cache sweeper starting");
        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    cache.cleanup();
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Cache sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    })
}
