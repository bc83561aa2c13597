use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use pkg_constants::auth::BEARER_PREFIX;
use pkg_types::validate::validate_user_id;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::AppState;
use crate::error::ApiError;

/// The resolved caller, inserted into request extensions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: String,
}

/// Maps an inbound request to a stable caller identity.
#[derive(Debug, Clone)]
pub enum IdentityResolver {
    /// Authentication disabled: every request acts as `user_id`.
    Development { user_id: String },
    /// Bearer token -> user id.
    Tokens(HashMap<String, String>),
}

impl IdentityResolver {
    pub fn resolve(&self, headers: &HeaderMap) -> Option<CallerIdentity> {
        match self {
            IdentityResolver::Development { user_id } => Some(CallerIdentity {
                user_id: user_id.clone(),
            }),
            IdentityResolver::Tokens(tokens) => {
                let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
                let token = value.strip_prefix(BEARER_PREFIX)?.trim();
                let user_id = tokens.get(token)?;
                // A bad entry in the token table must not become a storage key.
                validate_user_id(user_id).ok()?;
                Some(CallerIdentity {
                    user_id: user_id.clone(),
                })
            }
        }
    }
}

/// Middleware: resolves the caller and injects a [`CallerIdentity`].
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match state.identity.resolve(req.headers()) {
        Some(caller) => {
            debug!("Resolved caller {}", caller.user_id);
            req.extensions_mut().insert(caller);
            Ok(next.run(req).await)
        }
        None => {
            warn!("Unauthenticated request to {}", req.uri().path());
            Err(ApiError::Unauthorized)
        }
    }
}
