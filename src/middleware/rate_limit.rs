use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

const WINDOW: Duration = Duration::from_secs(1);
const MAX_TRACKED_KEYS: usize = 4096;

#[derive(Debug)]
struct WindowState {
    start: Instant,
    count: u32,
}

/// Fixed one-second window per client key, so one user hammering submits
/// cannot starve everyone else's sessions. Keys are the bearer credential
/// when present; unauthenticated traffic shares one bucket.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    rps: u32,
    windows: Arc<Mutex<HashMap<String, WindowState>>>,
}

impl RateLimiter {
    fn new(rps: u32) -> Self {
        Self {
            rps: rps.max(1),
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn allow(&self, key: &str) -> bool {
        let mut guard = self.windows.lock().expect("rate limiter mutex poisoned");
        let now = Instant::now();
        if guard.len() > MAX_TRACKED_KEYS {
            guard.retain(|_, w| now.duration_since(w.start) < WINDOW);
        }
        let window = guard.entry(key.to_string()).or_insert(WindowState {
            start: now,
            count: 0,
        });
        if now.duration_since(window.start) >= WINDOW {
            window.start = now;
            window.count = 0;
        }
        if window.count < self.rps {
            window.count += 1;
            true
        } else {
            false
        }
    }
}

pub async fn rps_middleware(
    State(state): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let key = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("anonymous");
    if !state.allow(key) {
        return (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded").into_response();
    }
    next.run(req).await
}

pub fn new_rps_state(rps: u32) -> RateLimiter {
    RateLimiter::new(rps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_within_one_window_per_key() {
        let limiter = RateLimiter::new(2);
        assert!(limiter.allow("bearer-a"));
        assert!(limiter.allow("bearer-a"));
        assert!(!limiter.allow("bearer-a"));
    }

    #[test]
    fn keys_are_throttled_independently() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.allow("bearer-a"));
        assert!(!limiter.allow("bearer-a"));
        // A different client still has a full window.
        assert!(limiter.allow("bearer-b"));
        assert!(limiter.allow("anonymous"));
    }
}
