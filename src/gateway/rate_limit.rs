use crate::types::AppError;
use crate::utils::toml_config::RateLimitConfig;
use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use lru::LruCache;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

const X_FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Per-client token-bucket limiter with continuous refill.
///
/// Each bucket holds at most `capacity` tokens and regains `capacity` tokens
/// per `window`. Buckets are created full on first sight of a key and live in
/// an LRU map bounded by `max_clients`.
pub struct RateLimiter {
    capacity: f64,
    window: Duration,
    buckets: Mutex<LruCache<String, Bucket>>,
}

impl RateLimiter {
    /// Create a limiter. Zero values are clamped to one.
    pub fn new(capacity: u32, window: Duration, max_clients: usize) -> Self {
        let max_clients = NonZeroUsize::new(max_clients).unwrap_or(NonZeroUsize::MIN);
        let window = if window.is_zero() {
            Duration::from_millis(1)
        } else {
            window
        };

        Self {
            capacity: f64::from(capacity.max(1)),
            window,
            buckets: Mutex::new(LruCache::new(max_clients)),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.capacity,
            Duration::from_millis(config.window_ms),
            config.max_clients,
        )
    }

    /// Admits or rejects one request for `key`.
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    /// [`allow`](Self::allow) evaluated at an explicit instant.
    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock();

        let mut bucket = buckets.get(key).copied().unwrap_or(Bucket {
            tokens: self.capacity,
            last_refill: now,
        });
        bucket.tokens = self.refilled(&bucket, now);
        bucket.last_refill = now.max(bucket.last_refill);

        let admitted = bucket.tokens >= 1.0;
        if admitted {
            bucket.tokens -= 1.0;
        }

        // A rejected bucket is still written back so the elapsed time counts
        buckets.put(key.to_string(), bucket);
        admitted
    }

    /// Drops buckets that have refilled completely. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut buckets = self.buckets.lock();

        let full: Vec<String> = buckets
            .iter()
            .filter(|(_, bucket)| self.refilled(bucket, now) >= self.capacity)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &full {
            buckets.pop(key);
        }
        full.len()
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.buckets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn refilled(&self, bucket: &Bucket, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        let gained = elapsed.as_secs_f64() * self.capacity / self.window.as_secs_f64();
        (bucket.tokens + gained).min(self.capacity)
    }
}

/// Client identity used for bucket keys: first `X-Forwarded-For` entry, else
/// the socket peer address, else `"unknown"`.
pub fn client_key(req: &Request) -> String {
    let forwarded = req
        .headers()
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(client) = forwarded {
        return client.to_string();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Gates non-safe requests of a route group through `limiter`.
///
/// Buckets are keyed `scope:client`, so each route group keeps its own budget.
pub async fn enforce(
    limiter: Arc<RateLimiter>,
    scope: &'static str,
    req: Request,
    next: Next,
) -> Response {
    if req.method().is_safe() {
        return next.run(req).await;
    }

    let client = client_key(&req);
    if !limiter.allow(&format!("{}:{}", scope, client)) {
        tracing::warn!(%client, scope, "rate limit exceeded");
        return AppError::RateLimited.into_response();
    }

    next.run(req).await
}

/// Periodically sweeps refilled buckets until the runtime shuts down.
pub fn spawn_sweeper(limiter: Arc<RateLimiter>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every.max(Duration::from_secs(1)));
        // First tick fires immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = limiter.sweep();
            if removed > 0 {
                tracing::debug!(removed, remaining = limiter.len(), "swept rate-limit buckets");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn limiter(capacity: u32, window_ms: u64) -> RateLimiter {
        RateLimiter::new(capacity, Duration::from_millis(window_ms), 100)
    }

    #[test]
    fn test_capacity_then_reject() {
        let limiter = limiter(3, 1000);
        let t0 = Instant::now();

        assert!(limiter.allow_at("a", t0));
        assert!(limiter.allow_at("a", t0));
        assert!(limiter.allow_at("a", t0));
        assert!(!limiter.allow_at("a", t0));
    }

    #[test]
    fn test_continuous_refill() {
        // 2 tokens per second
        let limiter = limiter(2, 1000);
        let t0 = Instant::now();

        assert!(limiter.allow_at("a", t0));
        assert!(limiter.allow_at("a", t0));
        assert!(!limiter.allow_at("a", t0));

        // Half a window regains one token
        assert!(limiter.allow_at("a", t0 + Duration::from_millis(500)));
        assert!(!limiter.allow_at("a", t0 + Duration::from_millis(500)));
    }

    #[test]
    fn test_rejection_still_accumulates_elapsed_time() {
        let limiter = limiter(1, 1000);
        let t0 = Instant::now();

        assert!(limiter.allow_at("a", t0));
        assert!(!limiter.allow_at("a", t0 + Duration::from_millis(400)));
        // 400ms + 600ms = one full token, even though a rejection happened in between
        assert!(limiter.allow_at("a", t0 + Duration::from_millis(1000)));
    }

    #[test]
    fn test_no_burst_beyond_capacity() {
        let limiter = limiter(2, 1000);
        let t0 = Instant::now();
        assert!(limiter.allow_at("a", t0));

        // A long idle period refills only up to capacity
        let later = t0 + Duration::from_secs(60);
        assert!(limiter.allow_at("a", later));
        assert!(limiter.allow_at("a", later));
        assert!(!limiter.allow_at("a", later));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = limiter(1, 60_000);
        let t0 = Instant::now();

        assert!(limiter.allow_at("orders:1.1.1.1", t0));
        assert!(!limiter.allow_at("orders:1.1.1.1", t0));
        assert!(limiter.allow_at("orders:2.2.2.2", t0));
        assert!(limiter.allow_at("training:1.1.1.1", t0));
    }

    #[test]
    fn test_lru_bound_evicts_oldest_client() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60), 2);
        let t0 = Instant::now();

        assert!(limiter.allow_at("a", t0));
        assert!(limiter.allow_at("b", t0));
        assert!(limiter.allow_at("c", t0));

        assert_eq!(limiter.len(), 2);
        // "a" was evicted and starts again from a full bucket
        assert!(limiter.allow_at("a", t0));
    }

    #[test]
    fn test_sweep_drops_only_refilled_buckets() {
        let limiter = limiter(2, 1000);
        let t0 = Instant::now();

        limiter.allow_at("idle", t0);
        limiter.allow_at("busy", t0 + Duration::from_millis(900));

        let removed = limiter.sweep_at(t0 + Duration::from_millis(1000));

        assert_eq!(removed, 1);
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn test_client_key_sources() {
        let forwarded = Request::builder()
            .header(X_FORWARDED_FOR, "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&forwarded), "203.0.113.7");

        let mut direct = Request::builder().body(Body::empty()).unwrap();
        direct
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 5555))));
        assert_eq!(client_key(&direct), "192.0.2.1");

        let anonymous = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&anonymous), "unknown");
    }
}
