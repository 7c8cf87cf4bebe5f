//! Error types for the resource pool

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Boxed error produced by a [`Resource`](crate::Resource) implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The lifecycle hook that reported a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    PreAcquire,
    PostAcquire,
    PreRelease,
    PostRelease,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookStage::PreAcquire => "pre-acquire",
            HookStage::PostAcquire => "post-acquire",
            HookStage::PreRelease => "pre-release",
            HookStage::PostRelease => "post-release",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Failed to create a resource while filling the pool: {0}")]
    Construction(#[source] BoxError),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("The {stage} hook failed: {source}")]
    Hook {
        stage: HookStage,
        #[source]
        source: BoxError,
    },

    /// A release found the queue full for the whole timeout. The resource
    /// was dropped; a `post_release` failure, if any, is the source.
    #[error("Pool is at maximum capacity - the released resource was dropped")]
    PoolFull {
        #[source]
        post_release: Option<BoxError>,
    },

    #[error("Invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Pool has been shut down")]
    Closed,
}

impl PoolError {
    /// Whether this error is an acquire timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, PoolError::Timeout(_))
    }

    /// The failing hook, if this is a hook failure
    pub fn hook_stage(&self) -> Option<HookStage> {
        match self {
            PoolError::Hook { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
