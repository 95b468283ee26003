//! Error kinds for the pool and the proxy.
//!
//! Grounded on `nebula-resource/src/error.rs`'s enum-plus-helper-constructor
//! style, folded down to the four kinds spec.md §6/§7 names.

use std::fmt;

/// Errors the pool itself can raise.
#[derive(thiserror::Error, Debug)]
pub enum PoolError {
    /// The pool is shut down and rejects new acquisitions.
    #[error("pool '{pool_id}' is closed")]
    Closed {
        /// Diagnostic identifier of the pool (`pool_id` in spec.md §3).
        pool_id: String,
    },

    /// A capacity permit could not be obtained within the configured timeout.
    #[error("timed out after {waited:?} waiting for a resource from pool '{pool_id}'")]
    Timeout {
        /// Diagnostic identifier of the pool.
        pool_id: String,
        /// How long the caller actually waited.
        waited: std::time::Duration,
    },

    /// The user factory failed while constructing a new resource.
    #[error("factory failed for pool '{pool_id}'")]
    Factory {
        /// Diagnostic identifier of the pool.
        pool_id: String,
        /// The underlying error the factory returned.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The pool configuration itself is invalid.
    #[error("invalid pool configuration: {0}")]
    Configuration(String),

    /// A `getter`/`retter` hook rejected a resource at acquire time.
    #[error("lifecycle hook failed for pool '{pool_id}'")]
    Hook {
        /// Diagnostic identifier of the pool.
        pool_id: String,
        /// The underlying error the hook returned.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl PoolError {
    pub(crate) fn closed(pool_id: impl Into<String>) -> Self {
        Self::Closed { pool_id: pool_id.into() }
    }

    pub(crate) fn timeout(pool_id: impl Into<String>, waited: std::time::Duration) -> Self {
        Self::Timeout { pool_id: pool_id.into(), waited }
    }

    pub(crate) fn factory(
        pool_id: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Factory { pool_id: pool_id.into(), source: source.into() }
    }

    pub(crate) fn hook(
        pool_id: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Hook { pool_id: pool_id.into(), source: source.into() }
    }

    /// Configuration errors are a caller bug; factory/closed are what's left.
    pub(crate) fn configuration(msg: impl fmt::Display) -> Self {
        Self::Configuration(msg.to_string())
    }

    /// Whether retrying the same call later has a reasonable chance of
    /// succeeding. Only capacity exhaustion qualifies — a closed pool or a
    /// broken factory will not heal itself.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Errors the proxy (C7) can raise, wrapping pool errors for forwarded calls.
#[derive(thiserror::Error, Debug)]
pub enum ProxyError {
    /// No object is bound and no factory/pool is configured to create one.
    #[error("proxy has no bound object; call set_obj()/set_fun() first")]
    NoObject,

    /// A pool configuration override arrived after the proxy's pool was
    /// already built; the pool's configuration is immutable once constructed.
    #[error("proxy is already bound to a pool; set_pool_config() must run before set_fun()")]
    AlreadyBound,

    /// A pool operation failed while the proxy was delegating to it.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Convenience alias mirroring the style used throughout the teacher crate.
pub type PoolResult<T> = Result<T, PoolError>;

/// Convenience alias for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;
