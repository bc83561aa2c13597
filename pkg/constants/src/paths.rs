//! Filesystem path constants.

/// Default config file path for the server.
pub const DEFAULT_SERVER_CONFIG: &str = "/etc/nodelease/config.yaml";

/// Default data directory for the lease state store.
pub const DEFAULT_SERVER_DATA_DIR: &str = "/tmp/nodelease-data";
