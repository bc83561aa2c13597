//! Identity constants.

/// Identity injected for every request when running in development mode.
pub const DEFAULT_DEV_USER: &str = "dev-user";

/// Bearer scheme prefix on the `Authorization` header.
pub const BEARER_PREFIX: &str = "Bearer ";
