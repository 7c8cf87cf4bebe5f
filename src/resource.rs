//! The capability set a pooled resource must provide

/// A reusable object managed by a [`Pool`](crate::Pool).
///
/// The pool never creates resources on its own: it calls [`add`](Resource::add)
/// on the seed passed to [`Pool::initialize`](crate::Pool::initialize), and on
/// stale or failed instances when they need replacing. The remaining methods
/// are lifecycle hooks with no-op defaults.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::Resource;
/// use std::convert::Infallible;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// struct Connection {
///     id: usize,
///     next_id: Arc<AtomicUsize>,
/// }
///
/// impl Resource for Connection {
///     type Error = Infallible;
///
///     fn add(&self) -> Result<Self, Self::Error> {
///         Ok(Connection {
///             id: self.next_id.fetch_add(1, Ordering::Relaxed),
///             next_id: Arc::clone(&self.next_id),
///         })
///     }
/// }
/// ```
pub trait Resource: Send + Sized + 'static {
    /// Error reported by creation and lifecycle hooks
    type Error: std::error::Error + Send + Sync + 'static;

    /// Create a new, ready-to-use instance
    fn add(&self) -> Result<Self, Self::Error>;

    /// Liveness check.
    ///
    /// The pool never calls this itself; it exists for use inside the
    /// lifecycle hooks.
    fn ping(&self) -> bool {
        true
    }

    /// Whether this instance is stale and should be replaced during a
    /// refresh pass
    fn evict(&self) -> bool {
        false
    }

    fn pre_acquire(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn post_acquire(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn pre_release(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn post_release(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
