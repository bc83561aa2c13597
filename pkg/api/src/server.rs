use axum::{Router, middleware, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::AppState;
use crate::auth::{IdentityResolver, identity_middleware};
use crate::handlers::{health, leases};
use crate::request_id::request_id_middleware;
use pkg_lifecycle::{LeaseCoordinator, LifecycleConfig};
use pkg_provisioner::Provisioner;
use pkg_provisioner::chain::{ChainDirectory, GlacierChainDirectory};
use pkg_provisioner::client::{HttpProvisioner, ProvisionerConfig};
use pkg_ratelimit::{RateLimitPolicy, RateLimiter};
use pkg_state::{LeaseRepository, StateStore};
use pkg_types::config::Environment;

/// Chain name enrichment endpoint.
#[derive(Debug, Clone)]
pub struct ChainDirectoryConfig {
    pub base_url: String,
    pub network: String,
}

/// Server configuration passed from the binary's CLI.
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub data_dir: String,
    pub environment: Environment,
    pub lease_ttl: chrono::Duration,
    pub rpc_base_url: String,
    /// `None` when no provider secret is configured: reads serve local data,
    /// mutations answer 503.
    pub provider: Option<ProvisionerConfig>,
    pub chain_directory: Option<ChainDirectoryConfig>,
    pub identity: IdentityResolver,
    pub rate_limits: RateLimitPolicy,
}

/// Wire the coordinator, limiter and identity resolver over an open store.
pub fn build_state(config: &ServerConfig, store: StateStore) -> anyhow::Result<AppState> {
    let provisioner: Option<Arc<dyn Provisioner>> = match &config.provider {
        Some(p) => Some(Arc::new(HttpProvisioner::new(p.clone())?)),
        None => {
            warn!("No provider password configured; create and delete will answer 503");
            None
        }
    };
    let chains: Option<Arc<dyn ChainDirectory>> = match &config.chain_directory {
        Some(c) => Some(Arc::new(GlacierChainDirectory::new(&c.base_url, &c.network)?)),
        None => None,
    };

    let coordinator = LeaseCoordinator::new(
        LeaseRepository::new(store),
        provisioner,
        chains,
        LifecycleConfig {
            lease_ttl: config.lease_ttl,
            rpc_base_url: config.rpc_base_url.clone(),
        },
    );

    if let IdentityResolver::Tokens(tokens) = &config.identity {
        if tokens.is_empty() {
            warn!("Production mode with an empty token table; every request will be rejected");
        }
    }

    Ok(AppState {
        coordinator,
        limiter: Arc::new(RateLimiter::new(config.rate_limits)),
        identity: Arc::new(config.identity.clone()),
        environment: config.environment,
    })
}

/// The full HTTP surface.
pub fn router(state: AppState) -> Router {
    // Protected API routes
    let api_routes = Router::new()
        .route(
            "/api/v1/leases",
            get(leases::list_leases).post(leases::create_lease),
        )
        .route(
            "/api/v1/leases/{subnet_id}/{node}",
            get(leases::get_lease).delete(leases::delete_lease),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ));

    // Public routes + merged
    Router::new()
        .route("/healthz", get(health::healthz))
        .merge(api_routes)
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    let store = StateStore::new(&config.data_dir).await?;
    let state = build_state(&config, store.clone())?;
    let app = router(state);

    info!("Starting API server on {}", config.addr);
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, extract::Path, http::StatusCode, routing::post};
    use pkg_ratelimit::WindowLimit;
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::time::Duration;

    const SUBNET: &str = "abcdefghijklmnopqrstuvwxyz0123456789ABCD";
    const CHAIN: &str = "yH8D7ThNJkxmtkuv2jgBa4P1Rn3Qpr4pPr7QYNfcdoS6k6HWp";

    fn node(index: u32) -> Value {
        json!({
            "nodeIndex": index,
            "nodeInfo": { "result": {
                "nodeID": format!("NodeID-{}{}", index, "n".repeat(40)),
                "nodePOP": {
                    "publicKey": format!("0x{}", "ab".repeat(48)),
                    "proofOfPossession": format!("0x{}", "cd".repeat(96)),
                }
            }},
            "dateCreated": "2026-01-01T00:00:00Z",
            "expiresAt": "2026-01-01T08:00:00Z",
        })
    }

    async fn spawn(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// Provider that always knows nodes 0, 2 and 1 and deletes anything.
    async fn spawn_fake_provider() -> String {
        async fn nodes(Path(subnet): Path<String>) -> Json<Value> {
            Json(json!({ "subnetId": subnet, "nodes": [node(0), node(2), node(1)] }))
        }
        async fn remove(Path(_p): Path<(String, u32)>) -> StatusCode {
            StatusCode::OK
        }
        let app = Router::new()
            .route("/node_admin/subnets/add/{subnet}", post(nodes))
            .route("/node_admin/subnets/status/{subnet}", get(nodes))
            .route(
                "/node_admin/subnets/delete/{subnet}/{index}",
                axum::routing::delete(remove),
            );
        spawn(app).await
    }

    fn config(provider_url: Option<String>, identity: IdentityResolver) -> ServerConfig {
        ServerConfig {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            data_dir: String::new(),
            environment: Environment::Development,
            lease_ttl: chrono::Duration::hours(72),
            rpc_base_url: "https://rpc.example.org".to_string(),
            provider: provider_url.map(|base_url| ProvisionerConfig {
                base_url,
                password: "pw".to_string(),
                timeout: Duration::from_secs(5),
                status_timeout: Duration::from_secs(2),
            }),
            chain_directory: None,
            identity,
            rate_limits: RateLimitPolicy::development(),
        }
    }

    fn dev() -> IdentityResolver {
        IdentityResolver::Development {
            user_id: "dev-user".to_string(),
        }
    }

    async fn serve(config: ServerConfig) -> String {
        let store = StateStore::in_memory().await.unwrap();
        let state = build_state(&config, store).unwrap();
        spawn(router(state)).await
    }

    #[tokio::test]
    async fn test_health_and_empty_list() {
        let base = serve(config(None, dev())).await;
        let client = reqwest::Client::new();

        let resp = client.get(format!("{}/healthz", base)).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        assert!(resp.headers().contains_key("x-request-id"));
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["provider_configured"], json!(false));

        let resp = client
            .get(format!("{}/api/v1/leases", base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_token_identity() {
        let mut tokens = HashMap::new();
        tokens.insert("tok-alice".to_string(), "alice".to_string());
        let mut cfg = config(None, IdentityResolver::Tokens(tokens));
        cfg.environment = Environment::Production;
        let base = serve(cfg).await;
        let client = reqwest::Client::new();
        let url = format!("{}/api/v1/leases", base);

        let resp = client.get(&url).send().await.unwrap();
        assert_eq!(resp.status(), 401);

        let resp = client
            .get(&url)
            .header("Authorization", "Bearer tok-alice")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        // Health stays public.
        let resp = client.get(format!("{}/healthz", base)).send().await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn test_create_errors() {
        let base = serve(config(None, dev())).await;
        let client = reqwest::Client::new();
        let url = format!("{}/api/v1/leases", base);

        let resp = client
            .post(&url)
            .json(&json!({ "subnet_id": SUBNET, "blockchain_id": CHAIN }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 503);

        let resp = client
            .post(&url)
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let resp = client
            .post(&url)
            .json(&json!({ "subnet_id": "tooshort", "blockchain_id": CHAIN }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn test_rate_limit_returns_429() {
        let mut cfg = config(None, dev());
        cfg.rate_limits.list = WindowLimit::new(2, 60);
        let base = serve(cfg).await;
        let client = reqwest::Client::new();
        let url = format!("{}/api/v1/leases", base);

        for _ in 0..2 {
            assert_eq!(client.get(&url).send().await.unwrap().status(), 200);
        }
        let resp = client.get(&url).send().await.unwrap();
        assert_eq!(resp.status(), 429);
        assert!(resp.headers().contains_key("retry-after"));
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("Try again in"));
    }

    #[tokio::test]
    async fn test_lease_round_trip_through_provider() {
        let provider = spawn_fake_provider().await;
        let base = serve(config(Some(provider), dev())).await;
        let client = reqwest::Client::new();
        let leases = format!("{}/api/v1/leases", base);
        let one = format!("{}/{}/2", leases, SUBNET);

        let resp = client
            .post(&leases)
            .json(&json!({ "subnet_id": SUBNET, "blockchain_id": CHAIN }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let created: Value = resp.json().await.unwrap();
        assert_eq!(created["lease"]["node_index"], json!(2));
        assert_eq!(created["revived"], json!(false));
        assert_eq!(
            created["lease"]["rpc_url"],
            json!(format!("https://rpc.example.org/ext/bc/{}/rpc", CHAIN))
        );

        // Same index again while active.
        let resp = client
            .post(&leases)
            .json(&json!({ "subnet_id": SUBNET, "blockchain_id": CHAIN }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 409);

        let resp = client.get(&one).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        let detail: Value = resp.json().await.unwrap();
        assert_eq!(detail["status"], json!("active"));
        assert_eq!(detail["live"]["node_index"], json!(2));

        let resp = client.delete(&one).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        let deleted: Value = resp.json().await.unwrap();
        assert_eq!(deleted["outcome"], json!("provider_deleted"));

        assert_eq!(client.get(&one).send().await.unwrap().status(), 404);
        assert_eq!(client.delete(&one).send().await.unwrap().status(), 404);

        // Provisioning the same index again revives the lease.
        let resp = client
            .post(&leases)
            .json(&json!({ "subnet_id": SUBNET, "blockchain_id": "otherchain" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let revived: Value = resp.json().await.unwrap();
        assert_eq!(revived["revived"], json!(true));
        assert_eq!(revived["lease"]["id"], created["lease"]["id"]);
        assert_eq!(revived["lease"]["blockchain_id"], json!("otherchain"));
    }
}
