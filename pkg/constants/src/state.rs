//! State store key layout.

/// Key prefix for lease records.
/// Full key = `/registry/leases/<user>/<subnet>/<slot>`.
pub const LEASE_KEY_PREFIX: &str = "/registry/leases/";

/// Width of the zero-padded node index in a lease key, so lexical order
/// matches numeric order.
pub const NODE_INDEX_KEY_WIDTH: usize = 10;

/// Slot prefix for lease records that carry no node index.
pub const UNINDEXED_SLOT_PREFIX: &str = "id-";
