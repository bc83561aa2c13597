//! Per-identity, per-operation request limiting.
//!
//! Fixed windows keyed by `(identity, operation)`. Every check counts,
//! including checks for requests that are rejected later in the pipeline.
//! State is process-local and is lost on restart.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

use pkg_constants::ratelimit::{
    DEV_CREATE_LIMIT, DEV_DELETE_LIMIT, DEV_GET_LIMIT, DEV_LIST_LIMIT, PROD_CREATE_LIMIT,
    PROD_DELETE_LIMIT, PROD_GET_LIMIT, PROD_LIST_LIMIT, SWEEP_INTERVAL,
};
use pkg_types::config::{Environment, LimitConfigFile, RateLimitsConfigFile};

/// Lease operations that are limited independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Get,
    Create,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::List => write!(f, "list"),
            Operation::Get => write!(f, "get"),
            Operation::Create => write!(f, "create"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// Request cap for one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimit {
    pub max_requests: u32,
    pub window: Duration,
}

impl WindowLimit {
    pub const fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    const fn from_pair(pair: (u32, u64)) -> Self {
        Self::new(pair.0, pair.1)
    }
}

impl From<LimitConfigFile> for WindowLimit {
    fn from(cfg: LimitConfigFile) -> Self {
        Self::new(cfg.max_requests, cfg.window_secs)
    }
}

/// Limits for every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub list: WindowLimit,
    pub get: WindowLimit,
    pub create: WindowLimit,
    pub delete: WindowLimit,
}

impl RateLimitPolicy {
    pub const fn production() -> Self {
        Self {
            list: WindowLimit::from_pair(PROD_LIST_LIMIT),
            get: WindowLimit::from_pair(PROD_GET_LIMIT),
            create: WindowLimit::from_pair(PROD_CREATE_LIMIT),
            delete: WindowLimit::from_pair(PROD_DELETE_LIMIT),
        }
    }

    pub const fn development() -> Self {
        Self {
            list: WindowLimit::from_pair(DEV_LIST_LIMIT),
            get: WindowLimit::from_pair(DEV_GET_LIMIT),
            create: WindowLimit::from_pair(DEV_CREATE_LIMIT),
            delete: WindowLimit::from_pair(DEV_DELETE_LIMIT),
        }
    }

    /// Environment preset with any per-operation overrides from the config file.
    pub fn from_config(env: Environment, overrides: &RateLimitsConfigFile) -> Self {
        let mut policy = match env {
            Environment::Production => Self::production(),
            Environment::Development => Self::development(),
        };
        if let Some(l) = overrides.list {
            policy.list = l.into();
        }
        if let Some(l) = overrides.get {
            policy.get = l.into();
        }
        if let Some(l) = overrides.create {
            policy.create = l.into();
        }
        if let Some(l) = overrides.delete {
            policy.delete = l.into();
        }
        policy
    }

    pub fn limit_for(&self, op: Operation) -> WindowLimit {
        match op {
            Operation::List => self.list,
            Operation::Get => self.get,
            Operation::Create => self.create,
            Operation::Delete => self.delete,
        }
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
    length: Duration,
}

impl Window {
    fn reset_at(&self) -> Instant {
        self.started + self.length
    }
}

/// Process-wide keyed counter table.
pub struct RateLimiter {
    policy: RateLimitPolicy,
    windows: Mutex<HashMap<(String, Operation), Window>>,
    checks: AtomicU64,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            windows: Mutex::new(HashMap::new()),
            checks: AtomicU64::new(0),
        }
    }

    /// Count one request for `(identity, op)` and decide whether it may run.
    pub fn check(&self, identity: &str, op: Operation) -> Decision {
        self.check_at(identity, op, Instant::now())
    }

    /// Same as [`RateLimiter::check`] with an explicit clock.
    pub fn check_at(&self, identity: &str, op: Operation, now: Instant) -> Decision {
        let limit = self.policy.limit_for(op);
        let mut windows = self.windows.lock();

        let n = self.checks.fetch_add(1, Ordering::Relaxed);
        if n > 0 && n % SWEEP_INTERVAL == 0 {
            sweep(&mut windows, now);
        }

        let window = windows
            .entry((identity.to_string(), op))
            .or_insert(Window {
                started: now,
                count: 0,
                length: limit.window,
            });
        if now >= window.reset_at() {
            *window = Window {
                started: now,
                count: 0,
                length: limit.window,
            };
        }
        window.count = window.count.saturating_add(1);

        let decision = if window.count > limit.max_requests {
            Decision::Limited {
                retry_after: window.reset_at().saturating_duration_since(now),
            }
        } else {
            Decision::Allowed {
                remaining: limit.max_requests - window.count,
            }
        };
        debug!(
            identity = %identity,
            operation = %op,
            count = window.count,
            max = limit.max_requests,
            allowed = decision.is_allowed(),
            "rate limit check"
        );
        decision
    }

    /// Number of live `(identity, operation)` windows.
    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.windows.lock().len()
    }

    /// Drop every window that has already reset.
    #[cfg(test)]
    fn sweep_expired(&self) {
        let mut windows = self.windows.lock();
        sweep(&mut windows, Instant::now());
    }
}

fn sweep(windows: &mut HashMap<(String, Operation), Window>, now: Instant) {
    let before = windows.len();
    windows.retain(|_, w| now < w.reset_at());
    let removed = before - windows.len();
    if removed > 0 {
        debug!(removed, remaining = windows.len(), "swept expired rate limit windows");
    }
}

/// Human-readable remaining window, e.g. "Try again in 5 minutes."
pub fn retry_message(retry_after: Duration) -> String {
    let secs = retry_after.as_secs().max(1);
    let (amount, unit) = if secs >= 3600 {
        (secs.div_ceil(3600), "hour")
    } else if secs >= 60 {
        (secs.div_ceil(60), "minute")
    } else {
        (secs, "second")
    };
    let plural = if amount == 1 { "" } else { "s" };
    format!(
        "Too many requests. Try again in {} {}{}.",
        amount, unit, plural
    )
}
