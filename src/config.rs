//! Pool and proxy configuration records.
//!
//! Grounded on `nebula-resource/src/pool.rs`'s `PoolConfig` and
//! `autoscale.rs`'s `AutoScalePolicy`, both of which pair a `Default` impl
//! with a `validate()` that is called once, at construction time.

use std::time::Duration;

use crate::error::PoolError;

/// Construction-time configuration for a [`crate::pool::Pool`].
///
/// Field names and defaults follow the table in spec.md §6 exactly; `0`
/// continues to mean "disabled"/"unbounded" for every field that documents
/// that sentinel.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Upper bound on live resources; `0` means unbounded (no capacity gate).
    pub max_size: usize,
    /// Aspired lower bound; the housekeeper tops up toward this.
    pub min_size: usize,
    /// Max wait for a capacity permit. `Duration::ZERO` means wait forever
    /// (spec.md §9, "open questions": `timeout = 0` chosen to mean
    /// wait-forever to match historical behavior).
    pub timeout: Duration,
    /// Retire a resource after this many uses. `0` means unlimited.
    pub max_use: u64,
    /// Retire idle resources older than this. `Duration::ZERO` means never.
    pub max_avail_delay: Duration,
    /// Warn when a resource has been held longer than this. `Duration::ZERO` means never.
    pub max_using_delay: Duration,
    /// Forcibly retire a resource held longer than this. `Duration::ZERO` means never.
    pub max_using_delay_kill: Duration,
    /// Run the health probe every N housekeeper sweeps.
    pub health_freq: u32,
    /// Housekeeper period. `Duration::ZERO` picks a sensible value derived
    /// from the other timers (spec.md §4.3 / §9).
    pub hk_delay: Duration,
    /// Diagnostic identifier embedded in errors and the stats snapshot.
    pub pool_id: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 0,
            min_size: 1,
            timeout: Duration::ZERO,
            max_use: 0,
            max_avail_delay: Duration::ZERO,
            max_using_delay: Duration::ZERO,
            max_using_delay_kill: Duration::ZERO,
            health_freq: 1,
            hk_delay: Duration::ZERO,
            pool_id: "pool".to_string(),
        }
    }
}

impl PoolConfig {
    /// Reject configurations that can never be satisfied.
    pub(crate) fn validate(&self) -> Result<(), PoolError> {
        if self.max_size > 0 && self.min_size > self.max_size {
            return Err(PoolError::configuration(format!(
                "min_size ({}) exceeds max_size ({})",
                self.min_size, self.max_size
            )));
        }
        if self.health_freq == 0 {
            return Err(PoolError::configuration("health_freq must be >= 1"));
        }
        if self.max_using_delay_kill > Duration::ZERO
            && self.max_using_delay > Duration::ZERO
            && self.max_using_delay_kill < self.max_using_delay
        {
            return Err(PoolError::configuration(
                "max_using_delay_kill must not be shorter than max_using_delay",
            ));
        }
        Ok(())
    }

    /// The effective housekeeper period: the configured `hk_delay` if set,
    /// otherwise half the tightest positive timer, capped to `[1s, 3600s]`
    /// (spec.md §9's resolution of the "exact housekeeper period" open
    /// question).
    pub(crate) fn effective_hk_delay(&self) -> Duration {
        if self.hk_delay > Duration::ZERO {
            return self.hk_delay;
        }
        let candidates = [self.max_avail_delay, self.max_using_delay, self.max_using_delay_kill];
        let tightest = candidates
            .into_iter()
            .filter(|d| *d > Duration::ZERO)
            .min()
            .unwrap_or(Duration::from_secs(7200));
        (tightest / 2).clamp(Duration::from_secs(1), Duration::from_secs(3600))
    }
}

/// Scoping discipline for a [`crate::proxy::Proxy`] (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// One resource for the whole process; no pool needed.
    Shared,
    /// One resource per OS thread.
    Thread,
    /// One resource per cooperative task, keyed by an injected provider.
    Task,
}

/// Construction-time configuration for a [`crate::proxy::Proxy`].
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Scoping discipline.
    pub scope: Scope,
    /// Pool configuration, used when the proxy owns a pool (i.e. a factory
    /// was supplied rather than a fixed shared object).
    pub pool: PoolConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self { scope: Scope::Shared, pool: PoolConfig::default() }
    }
}
