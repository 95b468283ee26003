//! A generic, thread-safe resource pool with a scoped proxy access layer.
//!
//! The pool (`Pool<T>`) is a bounded, self-healing container: it admits
//! callers up to a configured capacity, recycles returned resources,
//! evicts them on idle/use/age policies via a background housekeeper, and
//! reports usage through a point-in-time statistics snapshot. The proxy
//! (`Proxy<T>`) sits on top of a pool (or a fixed shared object) and routes
//! each caller to "its" resource according to a scoping discipline
//! (process-wide, per-thread, or per-task).
//!
//! ```no_run
//! use respool::{Hooks, Pool, PoolConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PoolConfig { max_size: 10, min_size: 1, ..Default::default() };
//! let pool: Pool<String> = Pool::new(
//!     Arc::new(|id| Ok(format!("connection-{id}"))),
//!     config,
//!     Hooks::new(),
//! )?;
//!
//! let conn = pool.acquire(0).await?;
//! println!("{}", *conn);
//! # Ok(())
//! # }
//! ```

mod config;
mod entry;
mod error;
mod guard;
mod hooks;
mod housekeeper;
mod pool;
mod proxy;
mod stats;

pub use config::{PoolConfig, ProxyConfig, Scope};
pub use error::{PoolError, PoolResult, ProxyError, ProxyResult};
pub use guard::Guard;
pub use hooks::{CloserFn, GetterFn, Hooks, HealthFn, OpenerFn, RetterFn, StatsFn, TracerFn};
pub use pool::{FactoryFn, Pool};
pub use proxy::{Proxy, ProxyHandle, ScopedHandle, TaskKeyFn};
pub use stats::{EntryStats, PoolConfigStats, PoolStats};
