use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity material of a provider node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeIdentity {
    pub node_id: String,
    pub public_key: String,
    pub proof_of_possession: String,
}

/// One node as reported by the provisioning service, after validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeSnapshot {
    pub node_index: u32,
    pub identity: NodeIdentity,
    pub created_at: DateTime<Utc>,
    /// Provider-side expiry. Informational only, never used as lease expiry.
    pub expires_at: DateTime<Utc>,
}
