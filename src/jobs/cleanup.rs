//! Background job: reclaim idle rate buckets.
//!
//! Buckets are created lazily per client and never removed on the request
//! path; this sweep keeps the map bounded by recently active clients.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::AppState;

/// Spawn the background sweep task. Call this once at startup.
pub fn spawn(state: Arc<AppState>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            sweep(&state);
        }
    })
}

/// One sweep pass. Returns the number of buckets removed.
pub fn sweep(state: &AppState) -> usize {
    let evicted = state.limiter.evict_expired();
    if evicted > 0 {
        state.metrics.buckets_evicted(evicted);
        tracing::debug!(
            evicted,
            remaining = state.limiter.tracked_clients(),
            "evicted idle rate buckets"
        );
    }
    evicted
}
