use pkg_provisioner::ProviderError;
use pkg_state::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Malformed or missing input. Never retried.
    #[error("{0}")]
    Validation(String),

    #[error("lease not found: {0}")]
    NotFound(String),

    /// An active lease already holds the key.
    #[error("{0}")]
    Conflict(String),

    /// Provider credentials are not configured, so provider state cannot be changed.
    #[error("node provisioning is not configured on this server")]
    ServiceUnavailable,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("internal error: {0}")]
    Internal(anyhow::Error),
}

impl From<StoreError> for LifecycleError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(key) => {
                LifecycleError::Conflict(format!("an active lease already exists ({})", key))
            }
            StoreError::NotFound(key) => LifecycleError::NotFound(key),
            StoreError::InvalidKey(msg) => LifecycleError::Validation(msg),
            StoreError::Backend(err) => LifecycleError::Internal(err),
        }
    }
}
