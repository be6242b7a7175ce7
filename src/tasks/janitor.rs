//! Expiry Janitor
//!
//! Background task that periodically walks the whole keyspace and deletes
//! entries whose expiry has passed, in bounded batches.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::cache::entry::{self, Decoded};
use crate::cache::CacheStore;
use crate::storage::{SharedStorage, WriteBatch, SCAN_PAGE_SIZE};

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries examined
    pub scanned: usize,
    /// Expired entries queued in batches that committed. An entry rewritten
    /// between scan and commit is kept but still counted here.
    pub removed: usize,
    /// Delete batches attempted
    pub batches: usize,
    /// Delete batches the storage rejected
    pub failed_batches: usize,
}

// == Sweep ==
/// Deletes every wrapped entry with `expiry <= now`, flushing a batch each
/// time `chunk_size` deletions accumulate.
///
/// Legacy and malformed entries are left alone. A failed batch is logged and
/// the sweep moves on; its keys are retried on the next pass.
pub async fn sweep_once(storage: &SharedStorage, now: i64, chunk_size: usize) -> SweepReport {
    let chunk_size = chunk_size.max(1);
    let mut report = SweepReport::default();
    let mut batch = WriteBatch::new();
    let mut cursor: Option<Vec<u8>> = None;

    loop {
        let page = match storage.scan(cursor.take(), SCAN_PAGE_SIZE).await {
            Ok(page) => page,
            Err(e) => {
                warn!(error = %e, "janitor scan failed, ending sweep early");
                break;
            }
        };
        let exhausted = page.len() < SCAN_PAGE_SIZE;
        let next = page.last().map(|(key, _)| key.clone());

        for (key, bytes) in page {
            report.scanned += 1;
            if let Ok(Decoded::Entry(e)) = entry::decode(&bytes) {
                if entry::is_sweepable(e.expiry, now) {
                    // Only the bytes judged expired are removed; a newer write survives.
                    batch.delete_if_eq(key, bytes);
                    if batch.len() >= chunk_size {
                        flush(storage, &mut batch, &mut report).await;
                    }
                }
            }
        }

        match next {
            Some(next) if !exhausted => cursor = Some(next),
            _ => break,
        }
    }

    if !batch.is_empty() {
        flush(storage, &mut batch, &mut report).await;
    }
    report
}

async fn flush(storage: &SharedStorage, batch: &mut WriteBatch, report: &mut SweepReport) {
    let pending = batch.take();
    let count = pending.len();
    report.batches += 1;

    match storage.write(pending).await {
        Ok(()) => {
            report.removed += count;
            debug!(count, "janitor flushed delete batch");
        }
        Err(e) => {
            report.failed_batches += 1;
            warn!(count, error = %e, "janitor delete batch failed");
        }
    }
}

// == Spawn ==
/// Spawns the periodic sweep.
///
/// Returns `None` without spawning when the store's TTL is infinite, since
/// nothing can ever expire. The task stops when `shutdown` flips to `true`
/// or its sender is dropped.
///
/// # Arguments
/// * `store` - Store whose storage, clock and counters the sweep uses
/// * `interval` - Time between sweeps; the first runs one interval after start
/// * `chunk_size` - Maximum deletions per batch
/// * `shutdown` - Stop signal
pub fn spawn_janitor(
    store: Arc<CacheStore>,
    interval: Duration,
    chunk_size: usize,
    mut shutdown: watch::Receiver<bool>,
) -> Option<JoinHandle<()>> {
    if store.ttl().is_infinite() {
        info!("TTL is infinite, janitor not started");
        return None;
    }

    Some(tokio::spawn(async move {
        info!(
            interval = %humantime::format_duration(interval),
            chunk_size,
            "starting expiry janitor"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = store.clock().now_nanos();
                    let report = sweep_once(store.storage(), now, chunk_size).await;
                    store.counters().record_swept(report.removed as u64);

                    if report.removed > 0 || report.failed_batches > 0 {
                        info!(
                            scanned = report.scanned,
                            removed = report.removed,
                            failed_batches = report.failed_batches,
                            "janitor sweep finished"
                        );
                    } else {
                        debug!(scanned = report.scanned, "janitor sweep found nothing expired");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("expiry janitor stopping");
                        break;
                    }
                }
            }
        }
    }))
}
