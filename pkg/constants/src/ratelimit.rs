//! Rate limit defaults, as `(max_requests, window_secs)`.

// ─── Production ───────────────────────────────────────────────────────────

pub const PROD_LIST_LIMIT: (u32, u64) = (60, 60);
pub const PROD_GET_LIMIT: (u32, u64) = (120, 60);
pub const PROD_CREATE_LIMIT: (u32, u64) = (3, 60 * 60);
pub const PROD_DELETE_LIMIT: (u32, u64) = (10, 60 * 60);

// ─── Development ──────────────────────────────────────────────────────────

pub const DEV_LIST_LIMIT: (u32, u64) = (1000, 60);
pub const DEV_GET_LIMIT: (u32, u64) = (1000, 60);
pub const DEV_CREATE_LIMIT: (u32, u64) = (100, 60);
pub const DEV_DELETE_LIMIT: (u32, u64) = (100, 60);

/// Expired windows are swept every this many checks.
pub const SWEEP_INTERVAL: u64 = 256;
