//! Login throttling
//!
//! Limits how many login attempts a single username can make per time window,
//! which slows down password guessing against one account.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

/// Rate limiter state
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// Map of key to (request count, window start)
    requests: Arc<RwLock<HashMap<String, (u32, Instant)>>>,
    /// Maximum requests per window
    max_requests: u32,
    /// Time window duration
    window: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(60)) // 10 attempts per minute
    }
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    /// Check if a request should be allowed
    /// Returns true if allowed, false if rate limited
    pub async fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        match requests.get_mut(key) {
            Some((count, window_start)) => {
                if now.duration_since(*window_start) >= self.window {
                    *count = 1;
                    *window_start = now;
                    true
                } else if *count >= self.max_requests {
                    false
                } else {
                    *count += 1;
                    true
                }
            }
            None => {
                requests.insert(key.to_string(), (1, now));
                true
            }
        }
    }

    /// Forget a key (after a successful login)
    pub async fn reset(&self, key: &str) {
        self.requests.write().await.remove(key);
    }

    /// Clean up old entries (call periodically)
    pub async fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut requests = self.requests.write().await;
        let before = requests.len();
        requests.retain(|_, (_, window_start)| now.duration_since(*window_start) < self.window * 2);
        before - requests.len()
    }
}

/// Anti-abuse configuration
#[derive(Debug, Clone)]
pub struct AbuseConfig {
    /// Login rate limiter (None = disabled)
    pub login_limiter: Option<RateLimiter>,
}

impl Default for AbuseConfig {
    fn default() -> Self {
        Self {
            login_limiter: Some(RateLimiter::default()),
        }
    }
}

impl AbuseConfig {
    /// No throttling at all
    pub fn disabled() -> Self {
        Self {
            login_limiter: None,
        }
    }

    /// Load config from environment variables
    pub fn from_env() -> Self {
        let rate_limit_enabled = std::env::var("LOGIN_RATE_LIMIT")
            .map(|v| v != "0" && v.to_lowercase() != "false")
            .unwrap_or(true);

        let login_limiter = if rate_limit_enabled {
            let max_requests = std::env::var("LOGIN_RATE_LIMIT_MAX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10);

            let window_secs = std::env::var("LOGIN_RATE_LIMIT_WINDOW")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);

            Some(RateLimiter::new(
                max_requests,
                Duration::from_secs(window_secs),
            ))
        } else {
            None
        };

        tracing::info!(rate_limit_enabled, "Login throttling config loaded");

        Self { login_limiter }
    }
}

/// Rate limit key for login attempts against one account
pub fn login_key(username: &str) -> String {
    format!("login:{}", username.trim().to_lowercase())
}
