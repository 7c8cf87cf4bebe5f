//! Basic usage examples for Pool

use esox_resourcepool::{HookFailurePolicy, Pool, PoolConfiguration, Resource};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
#[error("connection to {0} refused")]
struct ConnectError(&'static str);

/// Stand-in for a database connection
struct Connection {
    id: usize,
    host: &'static str,
    opened: Arc<AtomicUsize>,
    healthy: Arc<AtomicBool>,
}

impl Connection {
    fn seed(host: &'static str) -> Self {
        Connection {
            id: 0,
            host,
            opened: Arc::new(AtomicUsize::new(0)),
            healthy: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl Resource for Connection {
    type Error = ConnectError;

    fn add(&self) -> Result<Self, Self::Error> {
        Ok(Connection {
            id: self.opened.fetch_add(1, Ordering::Relaxed) + 1,
            host: self.host,
            opened: Arc::clone(&self.opened),
            healthy: Arc::clone(&self.healthy),
        })
    }

    fn ping(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    fn evict(&self) -> bool {
        !self.ping()
    }

    fn pre_acquire(&mut self) -> Result<(), Self::Error> {
        if self.ping() { Ok(()) } else { Err(ConnectError(self.host)) }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== EsoxSolutions.ResourcePool - Basic Examples ===\n");

    // Example 1: Acquire and release
    acquire_release();

    // Example 2: Guards and timeouts
    guards_and_timeouts();

    // Example 3: Background eviction
    background_eviction();
}

fn acquire_release() {
    println!("1. Acquire and release:");
    let seed = Connection::seed("db.local");
    let pool = Pool::initialize(&seed, PoolConfiguration::new().with_pool_size(3)).unwrap();

    let conn = pool.acquire().unwrap();
    println!("   Got connection #{} to {}", conn.id, conn.host);
    println!("   Available while checked out: {}", pool.available_count());
    pool.release(conn).unwrap();
    println!("   Available after release: {}\n", pool.available_count());
}

fn guards_and_timeouts() {
    println!("2. Guards and timeouts:");
    let seed = Connection::seed("db.local");
    let config = PoolConfiguration::new()
        .with_pool_size(1)
        .with_timeout(Duration::from_millis(100));
    let pool = Pool::initialize(&seed, config).unwrap();

    {
        let conn = pool.get().unwrap();
        println!("   Holding connection #{}", conn.id);
        match pool.acquire() {
            Ok(_) => println!("   Unexpected second connection"),
            Err(err) => println!("   Second acquire: {}", err),
        }
    }

    println!("   After guard dropped - Available: {}\n", pool.available_count());
}

fn background_eviction() {
    println!("3. Background eviction:");
    let seed = Connection::seed("db.local");
    let config = PoolConfiguration::new()
        .with_pool_size(4)
        .with_timeout(Duration::from_millis(100))
        .with_eviction_test(Duration::from_millis(50))
        .with_hook_failure_policy(HookFailurePolicy::Replace);
    let pool = Pool::initialize(&seed, config).unwrap();

    seed.healthy.store(false, Ordering::Relaxed);
    std::thread::sleep(Duration::from_millis(120));
    seed.healthy.store(true, Ordering::Relaxed);

    let conn = pool.acquire().unwrap();
    println!("   Connection after eviction: #{}", conn.id);
    pool.release(conn).unwrap();

    let metrics = pool.export_metrics();
    println!("   Evictions: {}", metrics["evictions"]);
    println!("   Refresh passes: {}", metrics["refresh_passes"]);

    pool.shutdown();
    println!("   Pool shut down: {}", pool.is_closed());
}
