//! Background sweep task (C4, spec.md §4.3).
//!
//! Grounded on `nebula-resource/src/autoscale.rs`'s `AutoScaler::start`: a
//! single `tokio::select!` loop racing a sleep against a
//! `CancellationToken`, so shutdown is immediate rather than waiting out
//! the current sleep. The sweep period is spec.md §9's resolution of "exact
//! housekeeper period": the configured `hk_delay`, or half the tightest
//! positive timer clamped to `[1s, 3600s]` when unset.

use tokio_util::sync::CancellationToken;

use crate::pool::Pool;

pub(crate) async fn run<T: Send + Sync + 'static>(pool: Pool<T>, cancel: CancellationToken) {
    loop {
        let delay = pool.effective_hk_delay();
        tokio::select! {
            () = tokio::time::sleep(delay) => {
                pool.sweep().await;
            }
            () = cancel.cancelled() => {
                break;
            }
        }
    }
}
