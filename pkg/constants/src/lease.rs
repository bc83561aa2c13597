//! Lease policy and validation bounds.

/// Default lease lifetime: three days.
pub const DEFAULT_LEASE_TTL_SECS: u64 = 3 * 24 * 60 * 60;

/// Longest accepted lease lifetime: one year.
pub const MAX_LEASE_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Minimum accepted subnet id length.
pub const SUBNET_ID_MIN_LEN: usize = 40;

/// Maximum accepted subnet id length.
pub const SUBNET_ID_MAX_LEN: usize = 60;

/// Maximum accepted blockchain id length.
pub const BLOCKCHAIN_ID_MAX_LEN: usize = 100;

/// Minimum length of a provider node id.
pub const NODE_ID_MIN_LEN: usize = 40;

/// Minimum length of a BLS public key as returned by the provider.
pub const PUBLIC_KEY_MIN_LEN: usize = 98;

/// Minimum length of a BLS proof of possession as returned by the provider.
pub const PROOF_OF_POSSESSION_MIN_LEN: usize = 194;
