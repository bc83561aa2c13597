//! Client side of the remote node provisioning service.

pub mod chain;
pub mod client;
pub mod wire;

use async_trait::async_trait;
use pkg_types::node::NodeSnapshot;
use thiserror::Error;

/// Failures talking to the provisioning service.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection failure, timeout, or unreadable body.
    #[error("provider unreachable: {0}")]
    Transport(String),

    /// Non-success HTTP status.
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The provider reported an error in an otherwise well-formed response.
    #[error("provider reported an error: {0}")]
    Reported(String),

    /// The body failed schema validation.
    #[error("malformed provider response: {0}")]
    Malformed(String),

    /// The add-node response listed no nodes at all.
    #[error("provider returned no nodes for subnet {0}")]
    NoNodes(String),
}

/// Successful provider-side delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteResult {
    Deleted,
    /// The provider answered 404: the node is already gone.
    AlreadyGone,
}

/// The three operations of the provisioning API.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Ask the provider to add a node. Returns every node of the subnet.
    async fn add_node(&self, subnet_id: &str) -> Result<Vec<NodeSnapshot>, ProviderError>;

    async fn delete_node(
        &self,
        subnet_id: &str,
        node_index: u32,
    ) -> Result<DeleteResult, ProviderError>;

    async fn subnet_status(&self, subnet_id: &str) -> Result<Vec<NodeSnapshot>, ProviderError>;

    /// Add a node and identify the one just created.
    ///
    /// The provider does not echo the created node back, so the node with the
    /// highest index is taken. Concurrent adds to the same subnet can make this
    /// pick someone else's node; implementations with a real correlation id
    /// should override this.
    async fn provision(&self, subnet_id: &str) -> Result<NodeSnapshot, ProviderError> {
        let nodes = self.add_node(subnet_id).await?;
        newest_node(nodes).ok_or_else(|| ProviderError::NoNodes(subnet_id.to_string()))
    }
}

/// The node with the maximum index, regardless of its position in the list.
pub fn newest_node(nodes: Vec<NodeSnapshot>) -> Option<NodeSnapshot> {
    nodes.into_iter().max_by_key(|n| n.node_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{fixtures, parse_node_list};

    #[test]
    fn newest_is_max_index_not_last() {
        let body = fixtures::subnet_json(&[0, 2, 1]).to_string();
        let nodes = parse_node_list(&body, fixtures::SUBNET).unwrap();
        assert_eq!(newest_node(nodes).map(|n| n.node_index), Some(2));
    }

    #[test]
    fn newest_of_empty_is_none() {
        assert!(newest_node(Vec::new()).is_none());
    }
}
