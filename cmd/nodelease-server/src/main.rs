use anyhow::bail;
use clap::{Parser, ValueEnum};
use pkg_api::auth::IdentityResolver;
use pkg_api::server::{ChainDirectoryConfig, ServerConfig, start_server};
use pkg_constants::auth::DEFAULT_DEV_USER;
use pkg_constants::lease::DEFAULT_LEASE_TTL_SECS;
use pkg_constants::network::{DEFAULT_API_PORT, DEFAULT_RPC_BASE_URL};
use pkg_constants::paths::{DEFAULT_SERVER_CONFIG, DEFAULT_SERVER_DATA_DIR};
use pkg_constants::provider::{
    DEFAULT_CHAIN_DIRECTORY_URL, DEFAULT_CHAIN_NETWORK, DEFAULT_PROVIDER_STATUS_TIMEOUT_SECS,
    DEFAULT_PROVIDER_TIMEOUT_SECS, PROVIDER_PASSWORD_ENV,
};
use pkg_provisioner::client::ProvisionerConfig;
use pkg_ratelimit::RateLimitPolicy;
use pkg_types::config::{Environment, ServerConfigFile, load_config_file};
use pkg_types::validate::validate_lease_ttl_secs;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "nodelease-server", about = "Testnet node lease server")]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = DEFAULT_SERVER_CONFIG)]
    config: String,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Directory for SlateDB state storage
    #[arg(long)]
    data_dir: Option<String>,

    /// development or production
    #[arg(long)]
    environment: Option<Environment>,

    /// Base URL of the node provisioning service
    #[arg(long)]
    provider_url: Option<String>,

    /// Shared secret for the provisioning service
    #[arg(long, env = PROVIDER_PASSWORD_ENV, hide_env_values = true)]
    provider_password: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
    }
}

fn mask(secret: &str) -> String {
    format!("{}***", secret.chars().take(2).collect::<String>())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    // Load config file (returns defaults if file not found)
    let file_cfg: ServerConfigFile = load_config_file(&cli.config)?;
    info!("Config file: {}", cli.config);

    // Merge: CLI args (and env) > config file > defaults
    let port = cli.port.or(file_cfg.port).unwrap_or(DEFAULT_API_PORT);
    let data_dir = cli
        .data_dir
        .or(file_cfg.data_dir)
        .unwrap_or_else(|| DEFAULT_SERVER_DATA_DIR.to_string());
    let environment = cli
        .environment
        .or(file_cfg.environment)
        .unwrap_or_default();
    let lease_ttl_secs = file_cfg.lease_ttl_secs.unwrap_or(DEFAULT_LEASE_TTL_SECS);
    let rpc_base_url = file_cfg
        .rpc_base_url
        .unwrap_or_else(|| DEFAULT_RPC_BASE_URL.to_string());

    let provider_url = cli.provider_url.or(file_cfg.provider.base_url);
    let provider_password = cli.provider_password.or(file_cfg.provider.password);
    let provider = match (provider_url, provider_password) {
        (Some(base_url), Some(password)) => Some(ProvisionerConfig {
            base_url,
            password,
            timeout: Duration::from_secs(
                file_cfg
                    .provider
                    .timeout_secs
                    .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS),
            ),
            status_timeout: Duration::from_secs(
                file_cfg
                    .provider
                    .status_timeout_secs
                    .unwrap_or(DEFAULT_PROVIDER_STATUS_TIMEOUT_SECS),
            ),
        }),
        (None, Some(_)) => {
            bail!("provider password is set but no provider base URL is configured")
        }
        _ => None,
    };

    let chain_directory = if file_cfg.chain_directory.enabled.unwrap_or(true) {
        Some(ChainDirectoryConfig {
            base_url: file_cfg
                .chain_directory
                .base_url
                .unwrap_or_else(|| DEFAULT_CHAIN_DIRECTORY_URL.to_string()),
            network: file_cfg
                .chain_directory
                .network
                .unwrap_or_else(|| DEFAULT_CHAIN_NETWORK.to_string()),
        })
    } else {
        None
    };

    let identity = match environment {
        Environment::Development => IdentityResolver::Development {
            user_id: file_cfg
                .auth
                .dev_user
                .unwrap_or_else(|| DEFAULT_DEV_USER.to_string()),
        },
        Environment::Production => IdentityResolver::Tokens(file_cfg.auth.tokens),
    };
    let rate_limits = RateLimitPolicy::from_config(environment, &file_cfg.rate_limits);
    let lease_ttl = validate_lease_ttl_secs(lease_ttl_secs)?;

    info!("Starting nodelease-server");
    info!("  Port:         {}", port);
    info!("  Data dir:     {}", data_dir);
    info!("  Environment:  {:?}", environment);
    info!("  Lease TTL:    {}s", lease_ttl_secs);
    info!("  RPC base:     {}", rpc_base_url);
    match &provider {
        Some(p) => info!(
            "  Provider:     {} (password {})",
            p.base_url,
            mask(&p.password)
        ),
        None => info!("  Provider:     not configured"),
    }
    match &chain_directory {
        Some(c) => info!("  Chain names:  {} ({})", c.base_url, c.network),
        None => info!("  Chain names:  disabled"),
    }
    info!("  Rate limits:  {:?}", rate_limits);

    let config = ServerConfig {
        addr: SocketAddr::from(([0, 0, 0, 0], port)),
        data_dir,
        environment,
        lease_ttl,
        rpc_base_url,
        provider,
        chain_directory,
        identity,
        rate_limits,
    };

    start_server(config).await?;

    Ok(())
}
