use async_trait::async_trait;
use pkg_constants::provider::CHAIN_DIRECTORY_TIMEOUT_SECS;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// Looks up a human-readable chain name for a blockchain id.
#[async_trait]
pub trait ChainDirectory: Send + Sync {
    /// `Ok(None)` when the directory does not know the chain.
    async fn chain_name(&self, blockchain_id: &str) -> anyhow::Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockchainInfo {
    #[serde(default)]
    blockchain_name: Option<String>,
}

/// Chain directory backed by the Glacier data API.
pub struct GlacierChainDirectory {
    client: reqwest::Client,
    base_url: String,
    network: String,
}

impl GlacierChainDirectory {
    pub fn new(base_url: &str, network: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(CHAIN_DIRECTORY_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            network: network.to_string(),
        })
    }
}

#[async_trait]
impl ChainDirectory for GlacierChainDirectory {
    async fn chain_name(&self, blockchain_id: &str) -> anyhow::Result<Option<String>> {
        let url = format!(
            "{}/v1/networks/{}/blockchains/{}",
            self.base_url, self.network, blockchain_id
        );
        let resp = self.client.get(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            anyhow::bail!("chain directory returned {}", resp.status());
        }
        let info: BlockchainInfo = resp.json().await?;
        Ok(info.blockchain_name.filter(|n| !n.is_empty()))
    }
}
