pub mod auth;
pub mod error;
pub mod handlers;
pub mod request_id;
pub mod server;

use std::sync::Arc;

use pkg_lifecycle::LeaseCoordinator;
use pkg_ratelimit::{Decision, Operation, RateLimiter, retry_message};
use pkg_types::config::Environment;
use tracing::warn;

use crate::auth::{CallerIdentity, IdentityResolver};
use crate::error::ApiError;

/// Shared application state injected into all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: LeaseCoordinator,
    pub limiter: Arc<RateLimiter>,
    pub identity: Arc<IdentityResolver>,
    pub environment: Environment,
}

impl AppState {
    /// Count this request against the caller's limit for `op`.
    pub fn admit(&self, caller: &CallerIdentity, op: Operation) -> Result<(), ApiError> {
        match self.limiter.check(&caller.user_id, op) {
            Decision::Allowed { .. } => Ok(()),
            Decision::Limited { retry_after } => {
                warn!("Rate limited: user={} operation={}", caller.user_id, op);
                Err(ApiError::RateLimited {
                    retry_after,
                    message: retry_message(retry_after),
                })
            }
        }
    }
}
