//! # EsoxSolutions.ResourcePool
//!
//! Generic, capability-based resource pool for Rust. The pool manages a
//! fixed number of reusable resources (connections, handles, sessions)
//! behind an acquire/release protocol, runs lifecycle hooks around every
//! borrow and return, and can periodically evict stale resources in the
//! background.
//!
//! ## Features
//!
//! - Bounded pool whose queue is both storage and hand-off primitive
//! - Acquire with timeout, blocking or async
//! - Automatic release via RAII guards ([`Pooled`])
//! - Lifecycle hooks with configurable failure handling
//! - Background eviction with explicit shutdown
//! - Metrics, Prometheus export and health status
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_resourcepool::{Pool, PoolConfiguration, Resource};
//! use std::convert::Infallible;
//! use std::time::Duration;
//!
//! struct Connection;
//!
//! impl Resource for Connection {
//!     type Error = Infallible;
//!
//!     fn add(&self) -> Result<Self, Self::Error> {
//!         Ok(Connection)
//!     }
//! }
//!
//! let config = PoolConfiguration::new()
//!     .with_pool_size(4)
//!     .with_timeout(Duration::from_millis(100));
//! let pool = Pool::initialize(&Connection, config).unwrap();
//!
//! let conn = pool.acquire().unwrap();
//! pool.release(conn).unwrap();
//!
//! {
//!     let _conn = pool.get().unwrap();
//!     // Released when `_conn` goes out of scope
//! }
//! assert_eq!(pool.available_count(), 4);
//! ```

mod config;
mod errors;
mod health;
mod metrics;
mod pool;
mod refresh;
mod resource;

pub use config::{AcquireHookPolicy, HookFailurePolicy, PoolConfiguration};
pub use errors::{BoxError, HookStage, PoolError, PoolResult};
pub use health::HealthStatus;
pub use metrics::{MetricsExporter, PoolMetrics};
pub use pool::{Pool, Pooled};
pub use refresh::RefreshReport;
pub use resource::Resource;
