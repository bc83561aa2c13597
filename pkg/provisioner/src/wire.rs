//! Provisioning API response schema.
//!
//! The provider is untrusted: a body is only turned into [`NodeSnapshot`]s
//! after every field has been checked.

use chrono::{DateTime, Utc};
use pkg_constants::lease::{NODE_ID_MIN_LEN, PROOF_OF_POSSESSION_MIN_LEN, PUBLIC_KEY_MIN_LEN};
use pkg_types::node::{NodeIdentity, NodeSnapshot};
use serde::Deserialize;

use crate::ProviderError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubnetNodesResponse {
    subnet_id: String,
    nodes: Vec<WireNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireNode {
    node_index: u32,
    node_info: WireNodeInfo,
    date_created: WireTimestamp,
    expires_at: WireTimestamp,
}

#[derive(Debug, Deserialize)]
struct WireNodeInfo {
    result: WireNodeResult,
}

#[derive(Debug, Deserialize)]
struct WireNodeResult {
    #[serde(rename = "nodeID")]
    node_id: String,
    #[serde(rename = "nodePOP")]
    node_pop: WireProofOfPossession,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireProofOfPossession {
    public_key: String,
    proof_of_possession: String,
}

/// The provider has been seen sending both epoch millis and RFC 3339.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Millis(i64),
    Text(String),
}

impl WireTimestamp {
    fn to_utc(&self, field: &str) -> Result<DateTime<Utc>, ProviderError> {
        match self {
            WireTimestamp::Millis(ms) => DateTime::from_timestamp_millis(*ms).ok_or_else(|| {
                ProviderError::Malformed(format!("{} out of range: {}", field, ms))
            }),
            WireTimestamp::Text(s) => DateTime::parse_from_rfc3339(s)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| ProviderError::Malformed(format!("{} is not RFC 3339: {}", field, e))),
        }
    }
}

/// Parse and validate a subnet node list body.
pub fn parse_node_list(
    body: &str,
    expected_subnet: &str,
) -> Result<Vec<NodeSnapshot>, ProviderError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::Malformed(format!("response is not JSON: {}", e)))?;

    // Some failures come back with a 2xx status and an `error` field.
    if let Some(err) = value.get("error").filter(|v| !v.is_null()) {
        let message = match err {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(ProviderError::Reported(message));
    }

    let response: SubnetNodesResponse = serde_json::from_value(value)
        .map_err(|e| ProviderError::Malformed(format!("unexpected response shape: {}", e)))?;

    if response.subnet_id != expected_subnet {
        return Err(ProviderError::Malformed(format!(
            "response is for subnet {}, expected {}",
            response.subnet_id, expected_subnet
        )));
    }

    response.nodes.into_iter().map(validate_node).collect()
}

fn validate_node(node: WireNode) -> Result<NodeSnapshot, ProviderError> {
    let result = node.node_info.result;
    check_min_len("nodeID", &result.node_id, NODE_ID_MIN_LEN)?;
    check_min_len("publicKey", &result.node_pop.public_key, PUBLIC_KEY_MIN_LEN)?;
    check_min_len(
        "proofOfPossession",
        &result.node_pop.proof_of_possession,
        PROOF_OF_POSSESSION_MIN_LEN,
    )?;

    Ok(NodeSnapshot {
        node_index: node.node_index,
        identity: NodeIdentity {
            node_id: result.node_id,
            public_key: result.node_pop.public_key,
            proof_of_possession: result.node_pop.proof_of_possession,
        },
        created_at: node.date_created.to_utc("dateCreated")?,
        expires_at: node.expires_at.to_utc("expiresAt")?,
    })
}

fn check_min_len(field: &str, value: &str, min: usize) -> Result<(), ProviderError> {
    if value.len() < min {
        return Err(ProviderError::Malformed(format!(
            "{} shorter than {} characters (got {})",
            field,
            min,
            value.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{Value, json};

    pub const SUBNET: &str = "abcdefghijklmnopqrstuvwxyz0123456789ABCD";

    pub fn node_json(index: u32) -> Value {
        json!({
            "nodeIndex": index,
            "nodeInfo": {
                "result": {
                    "nodeID": format!("NodeID-{}{}", index, "a".repeat(40)),
                    "nodePOP": {
                        "publicKey": format!("0x{}", "ab".repeat(48)),
                        "proofOfPossession": format!("0x{}", "cd".repeat(96)),
                    }
                }
            },
            "dateCreated": 1_767_225_600_000_i64,
            "expiresAt": "2026-01-04T00:00:00Z",
        })
    }

    pub fn subnet_json(indices: &[u32]) -> Value {
        json!({
            "subnetId": SUBNET,
            "nodes": indices.iter().map(|i| node_json(*i)).collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn parses_valid_body() {
        let body = subnet_json(&[0, 2, 1]).to_string();
        let nodes = parse_node_list(&body, SUBNET).unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[1].node_index, 2);
        assert!(nodes[1].identity.node_id.starts_with("NodeID-2"));
        assert_eq!(nodes[0].created_at.to_rfc3339(), "2026-01-01T00:00:00+00:00");
        assert_eq!(nodes[0].expires_at.to_rfc3339(), "2026-01-04T00:00:00+00:00");
    }

    #[test]
    fn rejects_non_json() {
        let err = parse_node_list("<html>502</html>", SUBNET).unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }

    #[test]
    fn reports_error_field_even_with_nodes() {
        let mut body = subnet_json(&[0]);
        body["error"] = serde_json::json!("subnet quota exhausted");
        let err = parse_node_list(&body.to_string(), SUBNET).unwrap_err();
        match err {
            ProviderError::Reported(msg) => assert_eq!(msg, "subnet quota exhausted"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn null_error_field_is_ignored() {
        let mut body = subnet_json(&[0]);
        body["error"] = serde_json::Value::Null;
        assert_eq!(parse_node_list(&body.to_string(), SUBNET).unwrap().len(), 1);
    }

    #[test]
    fn rejects_missing_identity_block() {
        let mut body = subnet_json(&[0]);
        body["nodes"][0]["nodeInfo"] = serde_json::json!({});
        assert!(matches!(
            parse_node_list(&body.to_string(), SUBNET),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_short_proof_of_possession() {
        let mut body = subnet_json(&[0]);
        body["nodes"][0]["nodeInfo"]["result"]["nodePOP"]["proofOfPossession"] =
            serde_json::json!("0x1234");
        let err = parse_node_list(&body.to_string(), SUBNET).unwrap_err();
        assert!(err.to_string().contains("proofOfPossession"));
    }

    #[test]
    fn rejects_other_subnet() {
        let body = subnet_json(&[0]).to_string();
        let other = "Z".repeat(40);
        assert!(parse_node_list(&body, &other).is_err());
    }
}
