use std::{
    collections::HashMap,
    sync::Mutex,
    time::Duration,
};

use moon_config::Settings;
use moon_dialect::Dialect;
use moon_repositories::RotationLocks;
use moon_schema::Registry;
use moon_storage::Pool;

/// Everything a request handler needs, bundled behind one `web::Data`.
pub struct AppState {
    pub settings: Settings,
    pub registry: Registry,
    pub pool: Pool,
    pub dialect: Box<dyn Dialect>,
    pub rotation_locks: RotationLocks,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.database.query_timeout)
    }

    pub fn slow_query_threshold(&self) -> Duration {
        Duration::from_millis(self.settings.database.slow_query_threshold)
    }
}

/// Per-principal fixed-window counter. A principal that hasn't made a
/// request since the window rolled over starts fresh, matching the
/// rate-limit fairness property: remaining == limit on the first request of
/// a window.
#[derive(Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
}

struct Window {
    started_at: i64,
    count: u32,
}

pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_in: u64,
}

impl RateLimiter {
    pub fn check(&self, key: &str, limit: u32, window_seconds: u64, now: i64) -> RateLimitDecision {
        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");
        let window = windows.entry(key.to_owned()).or_insert(Window { started_at: now, count: 0 });
        if now - window.started_at >= window_seconds as i64 {
            window.started_at = now;
            window.count = 0;
        }
        let reset_in = (window_seconds as i64 - (now - window.started_at)).max(0) as u64;
        if window.count >= limit {
            return RateLimitDecision { allowed: false, limit, remaining: 0, reset_in };
        }
        window.count += 1;
        RateLimitDecision {
            allowed: true,
            limit,
            remaining: limit - window.count,
            reset_in,
        }
    }
}
