//! Per-user sliding-window rate limiting for chat messages.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Sliding one-minute window per user. `check` records the attempt when it
/// is allowed; denied attempts do not consume capacity.
pub struct RateLimiter {
    max_per_minute: usize,
    window: Duration,
    hits: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_per_minute: usize) -> Self {
        Self {
            max_per_minute,
            window: Duration::from_secs(60),
            hits: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    fn with_window(max: usize, window: Duration) -> Self {
        Self {
            max_per_minute: max,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true when the user is under the limit; the attempt is
    /// recorded. Expired entries are pruned on every check.
    pub fn check(&self, user_id: &str) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.lock();
        let entries = hits.entry(user_id.to_owned()).or_default();
        entries.retain(|t| now.duration_since(*t) < self.window);

        if entries.len() >= self.max_per_minute {
            return false;
        }
        entries.push(now);
        true
    }

    /// Drop users with no live entries so the map stays bounded by the
    /// active user set.
    pub fn prune(&self) {
        let now = Instant::now();
        let mut hits = self.hits.lock();
        hits.retain(|_, entries| {
            entries.retain(|t| now.duration_since(*t) < self.window);
            !entries.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_limit() {
        let limiter = RateLimiter::new(3);
        assert!(limiter.check("alice"));
        assert!(limiter.check("alice"));
        assert!(limiter.check("alice"));
        assert!(!limiter.check("alice"), "fourth message within the window");
        assert!(limiter.check("bob"), "limits are per user");
    }

    #[test]
    fn window_expiry_restores_capacity() {
        let limiter = RateLimiter::with_window(1, Duration::from_millis(10));
        assert!(limiter.check("alice"));
        assert!(!limiter.check("alice"));
        std::thread::sleep(Duration::from_millis(15));
        assert!(limiter.check("alice"));
    }

    #[test]
    fn prune_drops_idle_users() {
        let limiter = RateLimiter::with_window(1, Duration::from_millis(5));
        limiter.check("alice");
        std::thread::sleep(Duration::from_millis(10));
        limiter.prune();
        assert!(limiter.hits.lock().is_empty());
    }
}
