//! Periodic refresh of pooled resources
//!
//! A refresh pass cycles every available resource through the queue once,
//! replacing the ones whose [`Resource::evict`] reports them stale. When
//! `eviction_test` is enabled a [`Refresher`] thread runs a pass on every
//! tick of `evict_test_schedule` until the pool is shut down or dropped.

use crate::errors::{PoolError, PoolResult};
use crate::metrics::MetricsTracker;
use crate::pool::{Shared, Wait};
use crate::resource::Resource;

use crossbeam::channel::{self, Sender};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Outcome of one refresh pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Resources taken from the queue and tested
    pub examined: usize,

    /// Stale resources replaced with a fresh one
    pub evicted: usize,

    /// Stale resources kept because creating a replacement failed
    pub replacement_failures: usize,

    /// Slots that yielded no resource within the timeout, presumably
    /// because a concurrent acquire took it first
    pub skipped: usize,
}

impl<R: Resource> Shared<R> {
    /// Run one refresh pass.
    ///
    /// The refresh lock is held for the whole pass, so two passes never
    /// interleave. A pass can take up to `pool_size * timeout` when
    /// concurrent acquires keep the queue drained. Acquire and release never
    /// touch this lock.
    pub(crate) fn refresh(&self) -> RefreshReport {
        let _pass = self.refresh_lock.lock();
        let mut report = RefreshReport::default();

        if self.is_closed() {
            return report;
        }

        let slots = self.receiver.len();
        for _ in 0..slots {
            let resource = match self.recv_within(self.config.timeout) {
                Ok(resource) => resource,
                Err(Wait::TimedOut) => {
                    report.skipped += 1;
                    continue;
                }
                Err(Wait::Closed) => break,
            };
            report.examined += 1;

            let resource = if resource.evict() {
                match resource.add() {
                    Ok(fresh) => {
                        report.evicted += 1;
                        fresh
                    }
                    Err(err) => {
                        // No caller to report to; keep the stale resource in rotation.
                        report.replacement_failures += 1;
                        tracing::warn!(error = %err, "failed to replace stale resource, keeping it");
                        resource
                    }
                }
            } else {
                resource
            };

            if let Err(resource) = self.requeue(resource) {
                tracing::warn!("pool is full, dropping refreshed resource");
                self.discard(resource);
            }
        }

        self.metrics
            .evictions
            .fetch_add(report.evicted, Ordering::Relaxed);
        self.metrics
            .replacement_failures
            .fetch_add(report.replacement_failures, Ordering::Relaxed);
        MetricsTracker::increment(&self.metrics.refresh_passes);

        tracing::debug!(
            examined = report.examined,
            evicted = report.evicted,
            replacement_failures = report.replacement_failures,
            skipped = report.skipped,
            "Refresh pass complete"
        );

        report
    }
}

/// Handle to the background thread running scheduled refresh passes
pub(crate) struct Refresher {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl Refresher {
    pub fn spawn<R: Resource>(shared: Arc<Shared<R>>, schedule: Duration) -> PoolResult<Self> {
        // Nothing is ever sent on this channel; dropping the sender wakes
        // the thread with a disconnect.
        let (stop, stopped) = channel::bounded::<()>(0);

        let handle = thread::Builder::new()
            .name("resourcepool-refresh".to_string())
            .spawn(move || {
                let ticker = channel::tick(schedule);
                loop {
                    crossbeam::select! {
                        recv(ticker) -> _ => {
                            shared.refresh();
                        }
                        recv(stopped) -> _ => break,
                    }
                }
                tracing::debug!("Refresher stopped");
            })
            .map_err(|err| PoolError::Construction(Box::new(err)))?;

        tracing::debug!(?schedule, "Refresher started");
        Ok(Self { stop, handle })
    }

    /// Signal the thread to exit and wait for it.
    ///
    /// An in-flight pass is allowed to finish first.
    pub fn stop(self) {
        drop(self.stop);
        if self.handle.join().is_err() {
            tracing::warn!("Refresher thread panicked");
        }
    }
}
