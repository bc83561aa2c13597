use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::node::{NodeIdentity, NodeSnapshot};

/// Lease status. Leases are never hard-deleted, only terminated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LeaseStatus {
    Active,
    Terminated,
}

impl std::fmt::Display for LeaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeaseStatus::Active => write!(f, "active"),
            LeaseStatus::Terminated => write!(f, "terminated"),
        }
    }
}

/// A user's claim on a provider-provisioned testnet node.
/// Stored at `/registry/leases/<user>/<subnet>/<slot>` in SlateDB.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeLease {
    /// Repository-assigned identifier
    pub id: String,
    /// Owning identity
    pub user_id: String,
    pub subnet_id: String,
    pub blockchain_id: String,
    /// Remote node id (NodeID-...)
    pub node_id: String,
    /// Provider-assigned index within the subnet. `None` only for legacy
    /// records that were never backed by a provider node.
    #[serde(default)]
    pub node_index: Option<u32>,
    pub public_key: String,
    pub proof_of_possession: String,
    /// Derived from `blockchain_id`, never taken from the provider
    pub rpc_url: String,
    #[serde(default)]
    pub chain_name: Option<String>,
    /// Local time the lease was created or last revived
    pub created_at: DateTime<Utc>,
    /// Creation time as reported by the provider, display only
    #[serde(default)]
    pub provider_created_at: Option<DateTime<Utc>>,
    /// Always `created_at + TTL`
    pub expires_at: DateTime<Utc>,
    pub status: LeaseStatus,
}

impl NodeLease {
    pub fn is_active(&self) -> bool {
        self.status == LeaseStatus::Active
    }

    /// Check if the lease lifetime has run out.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// How a caller addresses a single lease within a subnet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeSelector {
    /// Provider node index (the normal case)
    Index(u32),
    /// Lease id, for records without a node index
    LeaseId(String),
}

impl NodeSelector {
    /// Parse a path segment: digits select by index, anything else by lease id.
    pub fn parse(segment: &str) -> Self {
        match segment.parse::<u32>() {
            Ok(index) => NodeSelector::Index(index),
            Err(_) => NodeSelector::LeaseId(segment.to_string()),
        }
    }
}

impl std::fmt::Display for NodeSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeSelector::Index(index) => write!(f, "{}", index),
            NodeSelector::LeaseId(id) => write!(f, "{}", id),
        }
    }
}

// --- API messages ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLeaseRequest {
    #[serde(default)]
    pub subnet_id: String,
    #[serde(default)]
    pub blockchain_id: String,
}

/// A lease as returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseView {
    #[serde(flatten)]
    pub lease: NodeLease,
    /// Whether `expires_at` has passed at the time of the response
    pub expired: bool,
}

impl LeaseView {
    pub fn new(lease: NodeLease, now: DateTime<Utc>) -> Self {
        let expired = lease.is_expired(now);
        Self { lease, expired }
    }
}

/// Single-lease response, optionally annotated with live provider status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseDetail {
    #[serde(flatten)]
    pub view: LeaseView,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live: Option<NodeSnapshot>,
}

/// Response to a successful create (or revive).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedLease {
    pub lease: NodeLease,
    /// Raw identity block reported by the provider for the new node
    pub node: NodeIdentity,
    /// True when an earlier terminated lease was reused
    pub revived: bool,
}

/// How the provider side of a delete went. The local lease is terminated in
/// every case.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    ProviderDeleted,
    ProviderAlreadyGone,
    ProviderFailed,
    LocalOnly,
}

impl DeleteOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            DeleteOutcome::ProviderDeleted => "Node deleted and lease terminated",
            DeleteOutcome::ProviderAlreadyGone => {
                "Node was already gone on the provider; lease terminated"
            }
            DeleteOutcome::ProviderFailed => {
                "Lease terminated locally; the provider delete failed and the node will expire on its own"
            }
            DeleteOutcome::LocalOnly => "Lease terminated (no provider node attached)",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteLeaseResponse {
    pub outcome: DeleteOutcome,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_parses_index_or_id() {
        assert_eq!(NodeSelector::parse("7"), NodeSelector::Index(7));
        assert_eq!(
            NodeSelector::parse("3f1c-legacy"),
            NodeSelector::LeaseId("3f1c-legacy".to_string())
        );
        assert_eq!(
            NodeSelector::parse("-1"),
            NodeSelector::LeaseId("-1".to_string())
        );
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&LeaseStatus::Terminated).unwrap(),
            "\"terminated\""
        );
    }

    #[test]
    fn legacy_record_without_index_deserializes() {
        let json = serde_json::json!({
            "id": "l1",
            "user_id": "u",
            "subnet_id": "s",
            "blockchain_id": "b",
            "node_id": "n",
            "public_key": "",
            "proof_of_possession": "",
            "rpc_url": "",
            "created_at": "2026-01-01T00:00:00Z",
            "expires_at": "2026-01-04T00:00:00Z",
            "status": "active"
        });
        let lease: NodeLease = serde_json::from_value(json).unwrap();
        assert_eq!(lease.node_index, None);
        assert!(lease.is_active());
        assert!(lease.chain_name.is_none());
    }
}
