//! Lease lifecycle: create, revive, list, inspect and delete, keeping the
//! local lease store and the remote provisioning service in step.

pub mod coordinator;
pub mod error;

pub use coordinator::{LeaseCoordinator, LifecycleConfig};
pub use error::LifecycleError;
