//! Centralized constants for the nodelease project.
//!
//! All project-wide constant values live here.
//! Change a value in one place and it applies everywhere.

pub mod auth;
pub mod lease;
pub mod network;
pub mod paths;
pub mod provider;
pub mod ratelimit;
pub mod state;
