//! Provisioning service constants.

/// Default per-request timeout for provider calls, in seconds.
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

/// Timeout for live status reads, in seconds. Reads fall back to stored
/// leases, so this stays well below the write timeout.
pub const DEFAULT_PROVIDER_STATUS_TIMEOUT_SECS: u64 = 5;

/// Connect timeout for provider calls, in seconds.
pub const PROVIDER_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Environment variable consulted for the provider shared secret.
pub const PROVIDER_PASSWORD_ENV: &str = "NODELEASE_PROVIDER_PASSWORD";

/// Default chain metadata API used for chain name enrichment.
pub const DEFAULT_CHAIN_DIRECTORY_URL: &str = "https://glacier-api.avax.network";

/// Default network queried on the chain metadata API.
pub const DEFAULT_CHAIN_NETWORK: &str = "fuji";

/// Timeout for chain name lookups, in seconds. Enrichment must stay cheap.
pub const CHAIN_DIRECTORY_TIMEOUT_SECS: u64 = 5;
