pub mod client;
pub mod repository;

pub use client::StateStore;
pub use repository::{LeaseRepository, StoreError};
