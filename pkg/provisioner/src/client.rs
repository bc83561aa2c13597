use async_trait::async_trait;
use pkg_constants::provider::PROVIDER_CONNECT_TIMEOUT_SECS;
use pkg_types::node::NodeSnapshot;
use reqwest::{StatusCode, Url};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::wire::parse_node_list;
use crate::{DeleteResult, ProviderError, Provisioner};

/// Longest provider error body echoed into an error message.
const MAX_ERROR_BODY: usize = 512;

/// Connection settings for the provisioning API.
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    pub base_url: String,
    pub password: String,
    /// Add and delete calls
    pub timeout: Duration,
    /// Subnet status reads
    pub status_timeout: Duration,
}

/// HTTP implementation of [`Provisioner`].
///
/// The shared secret travels as the `password` query parameter, so request
/// URLs are stripped from every error before it leaves this type.
pub struct HttpProvisioner {
    client: reqwest::Client,
    base_url: String,
    password: String,
    status_timeout: Duration,
}

impl HttpProvisioner {
    pub fn new(config: ProvisionerConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(PROVIDER_CONNECT_TIMEOUT_SECS))
            .build()?;
        // Validate once so per-call URL building cannot fail on the base.
        Url::parse(&config.base_url)
            .map_err(|e| anyhow::anyhow!("invalid provider base URL {}: {}", config.base_url, e))?;

        info!(
            "Provisioning client configured for {} (timeout={}s, status timeout={}ms)",
            config.base_url,
            config.timeout.as_secs(),
            config.status_timeout.as_millis()
        );
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            password: config.password,
            status_timeout: config.status_timeout,
        })
    }

    fn url(&self, path: &str) -> Result<Url, ProviderError> {
        Url::parse_with_params(
            &format!("{}{}", self.base_url, path),
            &[("password", self.password.as_str())],
        )
        .map_err(|e| ProviderError::Transport(format!("bad request URL: {}", e)))
    }

    /// Read the body of a response, failing on any non-success status.
    async fn success_body(resp: reqwest::Response) -> Result<String, ProviderError> {
        let status = resp.status();
        let body = resp.text().await.map_err(transport)?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: truncate(body),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl Provisioner for HttpProvisioner {
    async fn add_node(&self, subnet_id: &str) -> Result<Vec<NodeSnapshot>, ProviderError> {
        let url = self.url(&format!("/node_admin/subnets/add/{}", subnet_id))?;
        debug!("Provider add_node subnet={}", subnet_id);
        let resp = self.client.post(url).send().await.map_err(transport)?;
        let body = Self::success_body(resp).await?;
        let nodes = parse_node_list(&body, subnet_id)?;
        info!(
            "Provider add_node subnet={} returned {} node(s)",
            subnet_id,
            nodes.len()
        );
        Ok(nodes)
    }

    async fn delete_node(
        &self,
        subnet_id: &str,
        node_index: u32,
    ) -> Result<DeleteResult, ProviderError> {
        let url = self.url(&format!(
            "/node_admin/subnets/delete/{}/{}",
            subnet_id, node_index
        ))?;
        debug!("Provider delete_node subnet={} index={}", subnet_id, node_index);
        let resp = self.client.delete(url).send().await.map_err(transport)?;

        if resp.status() == StatusCode::NOT_FOUND {
            info!(
                "Provider has no node {}/{}; treating delete as done",
                subnet_id, node_index
            );
            return Ok(DeleteResult::AlreadyGone);
        }
        Self::success_body(resp).await?;
        Ok(DeleteResult::Deleted)
    }

    async fn subnet_status(&self, subnet_id: &str) -> Result<Vec<NodeSnapshot>, ProviderError> {
        let url = self.url(&format!("/node_admin/subnets/status/{}", subnet_id))?;
        let resp = self
            .client
            .get(url)
            .timeout(self.status_timeout)
            .send()
            .await
            .map_err(transport)?;
        let body = Self::success_body(resp).await.inspect_err(|e| {
            warn!("Provider status for subnet {} failed: {}", subnet_id, e);
        })?;
        parse_node_list(&body, subnet_id)
    }
}

fn transport(e: reqwest::Error) -> ProviderError {
    let timed_out = e.is_timeout();
    let e = e.without_url();
    if timed_out {
        ProviderError::Transport(format!("timed out: {}", e))
    } else {
        ProviderError::Transport(e.to_string())
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::fixtures::{SUBNET, subnet_json};
    use axum::{
        Json, Router,
        extract::{Path, Query},
        http::StatusCode as AxumStatus,
        response::IntoResponse,
        routing::{delete, get, post},
    };
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    const PASSWORD: &str = "s3cret";
    const SLOW_SUBNET: &str = "slowslowslowslowslowslowslowslowslowslow";

    fn authorized(q: &HashMap<String, String>) -> bool {
        q.get("password").map(String::as_str) == Some(PASSWORD)
    }

    async fn add(
        Path(subnet): Path<String>,
        Query(q): Query<HashMap<String, String>>,
    ) -> impl IntoResponse {
        if !authorized(&q) {
            return (AxumStatus::UNAUTHORIZED, "bad password").into_response();
        }
        if subnet == SUBNET {
            Json(subnet_json(&[0, 2, 1])).into_response()
        } else {
            // 2xx with an error payload
            Json(serde_json::json!({ "error": "unknown subnet" })).into_response()
        }
    }

    async fn remove(
        Path((_subnet, index)): Path<(String, u32)>,
        Query(q): Query<HashMap<String, String>>,
    ) -> impl IntoResponse {
        if !authorized(&q) {
            return AxumStatus::UNAUTHORIZED.into_response();
        }
        match index {
            0 => AxumStatus::OK.into_response(),
            1 => AxumStatus::NOT_FOUND.into_response(),
            _ => (AxumStatus::INTERNAL_SERVER_ERROR, "boom").into_response(),
        }
    }

    async fn status(Path(subnet): Path<String>) -> impl IntoResponse {
        if subnet == SLOW_SUBNET {
            tokio::time::sleep(Duration::from_secs(3)).await;
            return Json(subnet_json(&[0])).into_response();
        }
        (AxumStatus::OK, "not json").into_response()
    }

    async fn spawn_provider() -> String {
        let app = Router::new()
            .route("/node_admin/subnets/add/{subnet}", post(add))
            .route("/node_admin/subnets/delete/{subnet}/{index}", delete(remove))
            .route("/node_admin/subnets/status/{subnet}", get(status));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(base_url: String, password: &str) -> HttpProvisioner {
        HttpProvisioner::new(ProvisionerConfig {
            base_url,
            password: password.to_string(),
            timeout: Duration::from_secs(5),
            status_timeout: Duration::from_millis(300),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_add_node_and_provision() {
        let p = client(spawn_provider().await, PASSWORD);
        let nodes = p.add_node(SUBNET).await.unwrap();
        assert_eq!(nodes.len(), 3);

        let newest = p.provision(SUBNET).await.unwrap();
        assert_eq!(newest.node_index, 2);
    }

    #[tokio::test]
    async fn test_add_node_error_payload() {
        let p = client(spawn_provider().await, PASSWORD);
        let other = "Q".repeat(40);
        assert!(matches!(
            p.add_node(&other).await,
            Err(ProviderError::Reported(_))
        ));
    }

    #[tokio::test]
    async fn test_bad_password_is_status_error() {
        let p = client(spawn_provider().await, "wrong");
        match p.add_node(SUBNET).await {
            Err(ProviderError::Status { status, .. }) => assert_eq!(status, 401),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_classification() {
        let p = client(spawn_provider().await, PASSWORD);
        assert_eq!(p.delete_node(SUBNET, 0).await.unwrap(), DeleteResult::Deleted);
        assert_eq!(
            p.delete_node(SUBNET, 1).await.unwrap(),
            DeleteResult::AlreadyGone
        );
        match p.delete_node(SUBNET, 5).await {
            Err(ProviderError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_status_parse_failure() {
        let p = client(spawn_provider().await, PASSWORD);
        assert!(matches!(
            p.subnet_status(SUBNET).await,
            Err(ProviderError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_status_uses_short_timeout() {
        let p = client(spawn_provider().await, PASSWORD);
        let started = std::time::Instant::now();
        let err = p.subnet_status(SLOW_SUBNET).await.unwrap_err();
        match &err {
            ProviderError::Transport(msg) => assert!(msg.starts_with("timed out"), "{}", msg),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(!err.to_string().contains(PASSWORD));
    }

    #[tokio::test]
    async fn test_unreachable_provider_hides_password() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let p = client(format!("http://{}", addr), PASSWORD);
        let err = p.add_node(SUBNET).await.unwrap_err();
        assert!(matches!(err, ProviderError::Transport(_)));
        assert!(!err.to_string().contains(PASSWORD));
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "é".repeat(400);
        let out = truncate(body);
        assert!(out.ends_with("..."));
        assert!(out.len() <= MAX_ERROR_BODY + 3);
    }
}
