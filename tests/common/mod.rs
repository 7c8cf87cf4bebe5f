#![allow(dead_code)]

use esox_resourcepool::{PoolConfiguration, Resource};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct TrackedError(pub &'static str);

/// Switches and counters shared by every tracked resource created from one seed
#[derive(Debug, Default)]
pub struct TrackedState {
    pub created: AtomicUsize,
    /// 1-based `add()` call that fails; 0 never fails
    pub fail_add_on: AtomicUsize,
    pub fail_all_adds: AtomicBool,
    pub stale: AtomicBool,
    pub fail_pre_acquire: AtomicBool,
    pub fail_post_acquire: AtomicBool,
    pub fail_pre_release: AtomicBool,
    pub fail_post_release: AtomicBool,
    pub pre_acquire_calls: AtomicUsize,
    pub post_acquire_calls: AtomicUsize,
    pub pre_release_calls: AtomicUsize,
    pub post_release_calls: AtomicUsize,
}

impl TrackedState {
    pub fn set(flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::SeqCst);
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// A resource that records every hook call and can be told to fail
#[derive(Debug)]
pub struct Tracked {
    pub id: usize,
    pub state: Arc<TrackedState>,
}

impl Tracked {
    pub fn seed() -> Self {
        Tracked {
            id: 0,
            state: Arc::new(TrackedState::default()),
        }
    }

    pub fn failing_on(call: usize) -> Self {
        let seed = Self::seed();
        seed.state.fail_add_on.store(call, Ordering::SeqCst);
        seed
    }
}

fn hook(flag: &AtomicBool, calls: &AtomicUsize, name: &'static str) -> Result<(), TrackedError> {
    calls.fetch_add(1, Ordering::SeqCst);
    if flag.load(Ordering::SeqCst) {
        Err(TrackedError(name))
    } else {
        Ok(())
    }
}

impl Resource for Tracked {
    type Error = TrackedError;

    fn add(&self) -> Result<Self, Self::Error> {
        let id = self.state.created.fetch_add(1, Ordering::SeqCst) + 1;
        if self.state.fail_all_adds.load(Ordering::SeqCst)
            || self.state.fail_add_on.load(Ordering::SeqCst) == id
        {
            return Err(TrackedError("connection refused"));
        }
        Ok(Tracked {
            id,
            state: Arc::clone(&self.state),
        })
    }

    fn evict(&self) -> bool {
        self.state.stale.load(Ordering::SeqCst)
    }

    fn pre_acquire(&mut self) -> Result<(), Self::Error> {
        hook(&self.state.fail_pre_acquire, &self.state.pre_acquire_calls, "pre-acquire")
    }

    fn post_acquire(&mut self) -> Result<(), Self::Error> {
        hook(&self.state.fail_post_acquire, &self.state.post_acquire_calls, "post-acquire")
    }

    fn pre_release(&mut self) -> Result<(), Self::Error> {
        hook(&self.state.fail_pre_release, &self.state.pre_release_calls, "pre-release")
    }

    fn post_release(&mut self) -> Result<(), Self::Error> {
        hook(&self.state.fail_post_release, &self.state.post_release_calls, "post-release")
    }
}

pub fn config(size: usize, timeout_ms: u64) -> PoolConfiguration {
    PoolConfiguration::new()
        .with_pool_size(size)
        .with_timeout(Duration::from_millis(timeout_ms))
}
