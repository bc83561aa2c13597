//! Network-related constants.

/// Default port for the nodelease API server.
pub const DEFAULT_API_PORT: u16 = 8080;

/// Default API server address (HTTP), used by the CLI.
pub const DEFAULT_API_ADDR: &str = "http://127.0.0.1:8080";

/// Response header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Default base URL for derived lease RPC endpoints.
pub const DEFAULT_RPC_BASE_URL: &str = "http://127.0.0.1:9650";
