//! Per-client admission control.
//!
//! Fixed-window counter per client key, held in a `DashMap`. The reset,
//! increment and compare for one key happen under that key's entry lock, so
//! concurrent requests from the same client are each counted exactly once.
//! Buckets whose window has elapsed are dropped by `evict_expired()`, which a
//! background job calls periodically.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use dashmap::DashMap;

use crate::errors::AppError;
use crate::AppState;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u64,
    window_start: Instant,
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: u64 },
    Denied { retry_after: Duration },
}

pub struct AdmissionController {
    /// Requests admitted per window. 0 disables limiting.
    max_requests: u64,
    window: Duration,
    buckets: DashMap<String, Bucket>,
}

impl AdmissionController {
    pub fn new(max_requests: u64, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            buckets: DashMap::new(),
        }
    }

    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    pub fn check(&self, key: &str) -> Admission {
        self.check_at(key, Instant::now())
    }

    /// Admission check against an explicit clock reading.
    pub fn check_at(&self, key: &str, now: Instant) -> Admission {
        if self.max_requests == 0 {
            return Admission::Allowed { remaining: u64::MAX };
        }

        // `entry` holds the shard write lock until `bucket` is dropped.
        let mut bucket = self.buckets.entry(key.to_string()).or_insert(Bucket {
            count: 0,
            window_start: now,
        });

        if now.saturating_duration_since(bucket.window_start) >= self.window {
            bucket.count = 0;
            bucket.window_start = now;
        }

        bucket.count = bucket.count.saturating_add(1);

        if bucket.count > self.max_requests {
            let elapsed = now.saturating_duration_since(bucket.window_start);
            Admission::Denied {
                retry_after: self.window.saturating_sub(elapsed),
            }
        } else {
            Admission::Allowed {
                remaining: self.max_requests - bucket.count,
            }
        }
    }

    /// Requests counted for `key` in its current window (0 if none or the window elapsed).
    pub fn current_count(&self, key: &str) -> u64 {
        match self.buckets.get(key) {
            Some(b) if b.window_start.elapsed() < self.window => b.count,
            _ => 0,
        }
    }

    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Instant::now())
    }

    /// Drop every bucket whose window has elapsed at `now`. A dropped bucket
    /// would have been reset on its next request anyway.
    pub fn evict_expired_at(&self, now: Instant) -> usize {
        let mut evicted = 0;
        self.buckets.retain(|_, b| {
            let live = now.saturating_duration_since(b.window_start) < self.window;
            if !live {
                evicted += 1;
            }
            live
        });
        evicted
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

/// Resolve the key a request is counted under: the peer address, or the first
/// `X-Forwarded-For` hop when the deployment trusts its proxy.
pub fn client_key(req: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .and_then(|v| v.parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware: admit or reject every inbound request before routing.
pub async fn admit(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = client_key(&req, state.config.trust_forwarded_for);

    match state.limiter.check(&key) {
        Admission::Allowed { .. } => {
            state.metrics.admission("allowed");
            Ok(next.run(req).await)
        }
        Admission::Denied { retry_after } => {
            state.metrics.admission("denied");
            tracing::warn!(
                rate_limit = true,
                client = %key,
                limit = state.limiter.max_requests(),
                "admission denied"
            );
            Err(AppError::RateLimited {
                retry_after_secs: retry_after_secs(retry_after),
            })
        }
    }
}

/// Whole seconds for the `Retry-After` header, rounded up, at least 1.
fn retry_after_secs(d: Duration) -> u64 {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    secs.max(1)
}
