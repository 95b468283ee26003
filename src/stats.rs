//! Statistics view (C6, spec.md §4.5/§6).

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::config::PoolConfig;

/// The configuration sub-object of a [`PoolStats`] snapshot (spec.md §6:
/// `stats()`'s shape nests `config:{…}`, not a handful of flattened fields).
/// Mirrors every field of [`PoolConfig`] except `pool_id` (already a
/// top-level field of [`PoolStats`]) and the factory/hooks, which are not
/// data and have no snapshot representation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PoolConfigStats {
    /// Configured `max_size` (0 = unbounded).
    pub max_size: usize,
    /// Configured `min_size`.
    pub min_size: usize,
    /// Configured capacity-wait timeout (`Duration::ZERO` = wait forever).
    pub timeout: Duration,
    /// Configured `max_use` (0 = unlimited).
    pub max_use: u64,
    /// Configured `max_avail_delay` (`Duration::ZERO` = never).
    pub max_avail_delay: Duration,
    /// Configured `max_using_delay` (`Duration::ZERO` = never).
    pub max_using_delay: Duration,
    /// Configured `max_using_delay_kill` (`Duration::ZERO` = never).
    pub max_using_delay_kill: Duration,
    /// Configured health-probe frequency, in sweeps.
    pub health_freq: u32,
    /// Configured housekeeper period (`Duration::ZERO` = auto).
    pub hk_delay: Duration,
}

impl From<&PoolConfig> for PoolConfigStats {
    fn from(config: &PoolConfig) -> Self {
        Self {
            max_size: config.max_size,
            min_size: config.min_size,
            timeout: config.timeout,
            max_use: config.max_use,
            max_avail_delay: config.max_avail_delay,
            max_using_delay: config.max_using_delay,
            max_using_delay_kill: config.max_using_delay_kill,
            health_freq: config.health_freq,
            hk_delay: config.hk_delay,
        }
    }
}

/// A snapshot of one live entry, as surfaced in `PoolStats::avail`/`busy`.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct EntryStats {
    /// Creation index of the entry.
    pub id: u64,
    /// When the entry was constructed.
    pub created_at: DateTime<Utc>,
    /// When the entry was last acquired, if ever.
    pub last_get_at: Option<DateTime<Utc>>,
    /// When the entry was last returned, if ever.
    pub last_ret_at: Option<DateTime<Utc>>,
    /// Number of successful acquisitions of this entry.
    pub uses: u64,
    /// Scope key of the current holder, if checked out.
    pub holder: Option<u64>,
    /// Diagnostic annotation from the `tracer` hook, if configured.
    pub trace: Option<String>,
}

/// A point-in-time snapshot of pool counters, configuration, and per-entry
/// state, taken under `lock` (spec.md §4.5). Shape matches spec.md §6's
/// `stats()` table field-for-field.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PoolStats {
    /// Diagnostic identifier of the pool.
    pub pool_id: String,
    /// Crate version, for operator diagnostics.
    pub version: &'static str,
    /// When the pool was created.
    pub started_at: DateTime<Utc>,
    /// When this snapshot was taken.
    pub now: DateTime<Utc>,
    /// Total number of live entries (`avail` + `busy`).
    pub n_total: usize,
    /// Number of entries currently available.
    pub n_avail: usize,
    /// Number of entries currently checked out.
    pub n_busy: usize,
    /// Total entries ever successfully constructed.
    pub n_created: u64,
    /// Total entries ever destroyed.
    pub n_destroyed: u64,
    /// Total successful acquisitions.
    pub n_acquisitions: u64,
    /// Total returns.
    pub n_returns: u64,
    /// Total capacity-wait timeouts.
    pub n_timeouts: u64,
    /// Total health-probe failures.
    pub n_health_fail: u64,
    /// Total forced kills by the housekeeper's long-hold policy.
    pub n_killed: u64,
    /// Total `release()` calls on an unknown object.
    pub n_bad_returns: u64,
    /// The pool's construction-time configuration (spec.md §6's `config:{…}`).
    pub config: PoolConfigStats,
    /// Snapshot of the `avail` list, oldest-returned first.
    pub avail: Vec<EntryStats>,
    /// Snapshot of the `busy` map.
    pub busy: Vec<EntryStats>,
    /// User-specific counters from the `stats` hook.
    pub user: HashMap<String, String>,
}

impl PoolStats {
    /// How long the pool has been running.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        (self.now - self.started_at).to_std().unwrap_or(Duration::ZERO)
    }
}
