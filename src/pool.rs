//! Core resource pool implementation

use crate::config::{AcquireHookPolicy, HookFailurePolicy, PoolConfiguration};
use crate::errors::{BoxError, HookStage, PoolError, PoolResult};
use crate::health::HealthStatus;
use crate::metrics::{MetricsExporter, MetricsTracker, PoolMetrics};
use crate::refresh::{RefreshReport, Refresher};
use crate::resource::Resource;

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// How often [`Pool::acquire_async`] re-checks an empty queue
const ASYNC_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// State shared between the pool handle, its guards and the refresher.
///
/// The bounded channel is both the storage and the hand-off primitive: each
/// queued resource is received by exactly one caller.
pub(crate) struct Shared<R> {
    pub(crate) sender: Sender<R>,
    pub(crate) receiver: Receiver<R>,
    pub(crate) config: PoolConfiguration,
    pub(crate) metrics: MetricsTracker,
    /// Serializes refresh passes against each other
    pub(crate) refresh_lock: Mutex<()>,
    closed: AtomicBool,
    /// Never sent on; taking and dropping it in `close` disconnects
    /// `closed_signal` and wakes every blocked receive
    close_handle: Mutex<Option<Sender<()>>>,
    closed_signal: Receiver<()>,
}

/// Why [`Shared::recv_within`] came back empty-handed
pub(crate) enum Wait {
    TimedOut,
    Closed,
}

impl<R: Resource> Shared<R> {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Mark the pool closed and wake everyone waiting on the queue.
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        drop(self.close_handle.lock().take());
    }

    /// Drop every queued resource, returning how many there were.
    fn drain(&self) -> usize {
        self.receiver.try_iter().count()
    }

    /// Take a resource from the queue, giving up after `timeout` or as soon
    /// as the pool is closed.
    pub(crate) fn recv_within(&self, timeout: Duration) -> Result<R, Wait> {
        crossbeam::select! {
            recv(self.receiver) -> resource => resource.map_err(|_| Wait::Closed),
            recv(self.closed_signal) -> _ => Err(Wait::Closed),
            default(timeout) => Err(Wait::TimedOut),
        }
    }

    fn acquire(&self) -> PoolResult<R> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }

        let timeout = self.config.timeout;
        match self.recv_within(timeout) {
            Ok(resource) if self.is_closed() => {
                self.discard(resource);
                Err(PoolError::Closed)
            }
            Ok(resource) => self.checkout(resource),
            Err(Wait::TimedOut) => {
                MetricsTracker::increment(&self.metrics.acquire_timeouts);
                tracing::trace!(?timeout, "acquire timed out");
                Err(PoolError::Timeout(timeout))
            }
            Err(Wait::Closed) => Err(PoolError::Closed),
        }
    }

    /// Run the acquire hooks on a resource just taken from the queue.
    fn checkout(&self, mut resource: R) -> PoolResult<R> {
        if let Err(err) = resource.pre_acquire() {
            return Err(self.hook_failed(resource, HookStage::PreAcquire, err));
        }

        self.metrics.record_checkout();

        let (stage, outcome) = match self.config.acquire_hooks {
            AcquireHookPolicy::RepeatPreAcquire => (HookStage::PreAcquire, resource.pre_acquire()),
            AcquireHookPolicy::PreThenPost => (HookStage::PostAcquire, resource.post_acquire()),
        };
        if let Err(err) = outcome {
            self.metrics.record_checkin();
            return Err(self.hook_failed(resource, stage, err));
        }

        MetricsTracker::increment(&self.metrics.total_acquired);
        tracing::trace!("resource acquired");
        Ok(resource)
    }

    pub(crate) fn release(&self, mut resource: R) -> PoolResult<()> {
        if self.is_closed() {
            self.metrics.record_checkin();
            tracing::debug!("pool is shut down, dropping released resource");
            return Ok(());
        }

        if let Err(err) = resource.pre_release() {
            self.metrics.record_checkin();
            return Err(self.hook_failed(resource, HookStage::PreRelease, err));
        }

        // The resource is moved into the queue, so post_release runs right
        // before it becomes visible to other callers. Its failure does not
        // keep the resource out of the pool.
        let post_release = resource.post_release().map_err(|err| {
            MetricsTracker::increment(&self.metrics.hook_failures);
            tracing::warn!(stage = %HookStage::PostRelease, error = %err, "resource hook failed");
            Box::new(err) as BoxError
        });

        self.metrics.record_checkin();
        if let Err(resource) = self.requeue(resource) {
            tracing::warn!(
                capacity = self.config.pool_size,
                "pool is full, dropping released resource"
            );
            self.discard(resource);
            return Err(PoolError::PoolFull {
                post_release: post_release.err(),
            });
        }
        MetricsTracker::increment(&self.metrics.total_released);
        tracing::trace!("resource released");

        post_release.map_err(|err| PoolError::Hook {
            stage: HookStage::PostRelease,
            source: err,
        })
    }

    /// Put a resource back into the queue, waiting at most the configured
    /// timeout for room. Hands the resource back if the queue stayed full.
    ///
    /// A shutdown can land between a caller's closed check and the send;
    /// the queue is drained again so nothing lingers in a closed pool.
    pub(crate) fn requeue(&self, resource: R) -> Result<(), R> {
        self.sender
            .send_timeout(resource, self.config.timeout)
            .map_err(|err| err.into_inner())?;
        if self.is_closed() {
            self.drain();
        }
        Ok(())
    }

    pub(crate) fn discard(&self, resource: R) {
        MetricsTracker::increment(&self.metrics.discarded);
        drop(resource);
    }

    /// Apply the configured [`HookFailurePolicy`] to a resource whose hook
    /// failed and build the error for the caller.
    fn hook_failed(&self, resource: R, stage: HookStage, err: R::Error) -> PoolError {
        let policy = self.config.hook_failure;
        MetricsTracker::increment(&self.metrics.hook_failures);
        tracing::warn!(%stage, error = %err, ?policy, "resource hook failed");

        match policy {
            HookFailurePolicy::Discard => self.discard(resource),
            HookFailurePolicy::Requeue => self.put_back(resource),
            HookFailurePolicy::Replace => match resource.add() {
                Ok(fresh) => {
                    self.discard(resource);
                    self.put_back(fresh);
                }
                Err(add_err) => {
                    tracing::warn!(error = %add_err, "failed to replace resource after hook failure");
                    self.discard(resource);
                }
            },
        }

        PoolError::Hook {
            stage,
            source: Box::new(err),
        }
    }

    fn put_back(&self, resource: R) {
        if self.is_closed() {
            self.discard(resource);
            return;
        }
        if let Err(resource) = self.requeue(resource) {
            tracing::warn!("pool is full, dropping resource");
            self.discard(resource);
        }
    }
}

/// A resource checked out through [`Pool::get`] that is released back to
/// the pool when dropped
pub struct Pooled<R: Resource> {
    resource: Option<R>,
    shared: Arc<Shared<R>>,
}

impl<R: Resource> Pooled<R> {
    /// Take the resource out of the pool for good.
    ///
    /// The pool will run one short until it is rebuilt.
    pub fn detach(mut self) -> R {
        self.shared.metrics.record_checkin();
        self.resource.take().expect("Value already taken")
    }
}

impl<R: Resource> Deref for Pooled<R> {
    type Target = R;

    fn deref(&self) -> &Self::Target {
        self.resource.as_ref().expect("Value already taken")
    }
}

impl<R: Resource> DerefMut for Pooled<R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.resource.as_mut().expect("Value already taken")
    }
}

impl<R: Resource> Drop for Pooled<R> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take()
            && let Err(err) = self.shared.release(resource)
        {
            tracing::warn!(error = %err, "failed to release pooled resource on drop");
        }
    }
}

/// Thread-safe pool of a fixed number of resources
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{Pool, PoolConfiguration, Resource};
/// use std::convert::Infallible;
/// use std::time::Duration;
///
/// #[derive(Debug)]
/// struct Handle;
///
/// impl Resource for Handle {
///     type Error = Infallible;
///     fn add(&self) -> Result<Self, Self::Error> {
///         Ok(Handle)
///     }
/// }
///
/// let config = PoolConfiguration::new()
///     .with_pool_size(2)
///     .with_timeout(Duration::from_millis(50));
/// let pool = Pool::initialize(&Handle, config).unwrap();
///
/// let first = pool.acquire().unwrap();
/// let second = pool.acquire().unwrap();
/// assert!(pool.acquire().unwrap_err().is_timeout());
///
/// pool.release(first).unwrap();
/// pool.release(second).unwrap();
/// assert_eq!(pool.available_count(), 2);
/// ```
pub struct Pool<R: Resource> {
    shared: Arc<Shared<R>>,
    refresher: Mutex<Option<Refresher>>,
}

impl<R: Resource> Pool<R> {
    /// Create a pool holding `config.pool_size` resources, each made by
    /// calling `seed.add()`.
    ///
    /// Fails without returning a pool if the configuration is invalid or
    /// any `add()` call fails. Starts the background refresher when
    /// `config.eviction_test` is set.
    pub fn initialize(seed: &R, config: PoolConfiguration) -> PoolResult<Self> {
        config.validate()?;

        let (sender, receiver) = channel::bounded(config.pool_size);
        for created in 0..config.pool_size {
            let resource = seed.add().map_err(|err| {
                tracing::warn!(created, error = %err, "failed to fill resource pool");
                PoolError::Construction(Box::new(err))
            })?;
            sender
                .try_send(resource)
                .expect("Queue is sized to the pool");
        }

        let (close_handle, closed_signal) = channel::bounded::<()>(0);

        let shared = Arc::new(Shared {
            sender,
            receiver,
            config,
            metrics: MetricsTracker::new(),
            refresh_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
            close_handle: Mutex::new(Some(close_handle)),
            closed_signal,
        });

        let refresher = if shared.config.eviction_test {
            Some(Refresher::spawn(Arc::clone(&shared), shared.config.evict_test_schedule)?)
        } else {
            None
        };

        tracing::debug!(
            pool_size = shared.config.pool_size,
            timeout = ?shared.config.timeout,
            eviction_test = shared.config.eviction_test,
            "Created new resource pool"
        );

        Ok(Self {
            shared,
            refresher: Mutex::new(refresher),
        })
    }

    /// Take a resource from the pool, waiting up to the configured timeout.
    ///
    /// The caller owns the resource until it hands it back with
    /// [`release`](Self::release).
    pub fn acquire(&self) -> PoolResult<R> {
        self.shared.acquire()
    }

    /// Return a resource to the pool.
    ///
    /// Runs `pre_release`, then `post_release`, then puts the resource back
    /// into the queue. A resource moved into the queue is no longer the
    /// caller's to touch, so `post_release` runs just before the enqueue. Its
    /// failure does not keep the resource out of the pool; it is reported as
    /// [`PoolError::Hook`] after the resource has been returned. If the queue
    /// stays full for the configured timeout the resource is dropped and
    /// [`PoolError::PoolFull`] carries any `post_release` failure as its
    /// source.
    pub fn release(&self, resource: R) -> PoolResult<()> {
        self.shared.release(resource)
    }

    /// Acquire a resource wrapped in a guard that releases it on drop
    pub fn get(&self) -> PoolResult<Pooled<R>> {
        let resource = self.shared.acquire()?;
        Ok(Pooled {
            resource: Some(resource),
            shared: Arc::clone(&self.shared),
        })
    }

    /// Acquire a resource without blocking the async runtime
    pub async fn acquire_async(&self) -> PoolResult<R> {
        let timeout = self.shared.config.timeout;

        tokio::time::timeout(timeout, async {
            loop {
                if self.shared.is_closed() {
                    return Err(PoolError::Closed);
                }
                match self.shared.receiver.try_recv() {
                    Ok(resource) => return self.shared.checkout(resource),
                    Err(TryRecvError::Empty) => tokio::time::sleep(ASYNC_POLL_INTERVAL).await,
                    Err(TryRecvError::Disconnected) => return Err(PoolError::Closed),
                }
            }
        })
        .await
        .map_err(|_| {
            MetricsTracker::increment(&self.shared.metrics.acquire_timeouts);
            PoolError::Timeout(timeout)
        })?
    }

    /// Run one refresh pass now, replacing every available resource whose
    /// `evict()` returns true.
    pub fn refresh(&self) -> RefreshReport {
        self.shared.refresh()
    }

    /// Stop the background refresher and drop every queued resource.
    ///
    /// Later acquires fail with [`PoolError::Closed`]; resources released
    /// afterwards are dropped. Calling this more than once is harmless.
    /// Callers blocked in [`acquire`](Self::acquire) wake up with
    /// [`PoolError::Closed`].
    pub fn shutdown(&self) {
        self.shared.close();
        self.stop_refresher();

        let drained = self.shared.drain();
        tracing::debug!(drained, "Resource pool shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Resources currently waiting in the queue
    pub fn available_count(&self) -> usize {
        self.shared.receiver.len()
    }

    /// Resources currently checked out by callers
    pub fn checked_out_count(&self) -> usize {
        self.shared.metrics.checked_out.load(Ordering::Relaxed)
    }

    /// Configured pool size
    pub fn capacity(&self) -> usize {
        self.shared.config.pool_size
    }

    /// Get the configuration the pool was created with
    pub fn config(&self) -> &PoolConfiguration {
        &self.shared.config
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        self.shared
            .metrics
            .get_metrics(self.available_count(), self.capacity())
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }

    /// Get health status
    pub fn get_health_status(&self) -> HealthStatus {
        HealthStatus::new(self.available_count(), self.checked_out_count(), self.capacity())
    }

    fn stop_refresher(&self) {
        if let Some(refresher) = self.refresher.lock().take() {
            refresher.stop();
        }
    }
}

impl<R: Resource> Drop for Pool<R> {
    fn drop(&mut self) {
        self.stop_refresher();
    }
}

impl<R: Resource> fmt::Debug for Pool<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("capacity", &self.capacity())
            .field("available", &self.available_count())
            .field("checked_out", &self.checked_out_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug)]
    struct Numbered {
        id: usize,
        next: Arc<AtomicUsize>,
    }

    impl Numbered {
        fn seed() -> Self {
            Numbered {
                id: 0,
                next: Arc::new(AtomicUsize::new(1)),
            }
        }
    }

    impl Resource for Numbered {
        type Error = Infallible;

        fn add(&self) -> Result<Self, Self::Error> {
            Ok(Numbered {
                id: self.next.fetch_add(1, Ordering::Relaxed),
                next: Arc::clone(&self.next),
            })
        }
    }

    fn config(size: usize) -> PoolConfiguration {
        PoolConfiguration::new()
            .with_pool_size(size)
            .with_timeout(Duration::from_millis(50))
    }

    #[test]
    fn test_pool_basic() {
        let pool = Pool::initialize(&Numbered::seed(), config(3)).unwrap();
        assert_eq!(pool.available_count(), 3);

        let resource = pool.acquire().unwrap();
        assert!((1..=3).contains(&resource.id));
        assert_eq!(pool.available_count(), 2);
        assert_eq!(pool.checked_out_count(), 1);

        pool.release(resource).unwrap();
        assert_eq!(pool.available_count(), 3);
        assert_eq!(pool.checked_out_count(), 0);
    }

    #[test]
    fn test_guard_returns_on_drop() {
        let pool = Pool::initialize(&Numbered::seed(), config(1)).unwrap();

        {
            let guard = pool.get().unwrap();
            assert_eq!(guard.id, 1);
            assert_eq!(pool.available_count(), 0);
        }

        assert_eq!(pool.available_count(), 1);
        assert_eq!(pool.get_metrics().total_released, 1);
    }

    #[test]
    fn test_detach_keeps_resource_out() {
        let pool = Pool::initialize(&Numbered::seed(), config(2)).unwrap();

        let resource = pool.get().unwrap().detach();
        assert_eq!(resource.id, 1);
        assert_eq!(pool.available_count(), 1);
        assert_eq!(pool.checked_out_count(), 0);
    }

    #[test]
    fn test_invalid_configuration() {
        let result = Pool::initialize(&Numbered::seed(), config(0));
        assert!(matches!(result, Err(PoolError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_shutdown_closes_pool() {
        let pool = Pool::initialize(&Numbered::seed(), config(2)).unwrap();
        let resource = pool.acquire().unwrap();

        pool.shutdown();
        assert!(pool.is_closed());
        assert_eq!(pool.available_count(), 0);
        assert!(matches!(pool.acquire(), Err(PoolError::Closed)));

        pool.release(resource).unwrap();
        assert_eq!(pool.available_count(), 0);
        pool.shutdown();
    }

    #[test]
    fn test_release_racing_shutdown_leaves_queue_empty() {
        let pool = Pool::initialize(&Numbered::seed(), config(2)).unwrap();
        let resource = pool.acquire().unwrap();

        // Shutdown flips the flag after the release passed its closed check
        // and drained before the send went through.
        pool.shared.close();
        pool.shared.drain();
        assert!(pool.shared.requeue(resource).is_ok());

        assert_eq!(pool.available_count(), 0);
    }

    #[tokio::test]
    async fn test_async_acquire() {
        let pool = Pool::initialize(&Numbered::seed(), config(1)).unwrap();

        let resource = pool.acquire_async().await.unwrap();
        assert_eq!(resource.id, 1);

        let err = pool.acquire_async().await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(pool.get_metrics().acquire_timeouts, 1);

        pool.release(resource).unwrap();
        assert!(pool.acquire_async().await.is_ok());
    }
}
