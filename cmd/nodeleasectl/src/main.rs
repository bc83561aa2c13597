use clap::{Parser, Subcommand};
use pkg_constants::network::DEFAULT_API_ADDR;
use pkg_types::lease::{CreateLeaseRequest, LeaseView};
use serde_json::Value;
use std::fmt::Write as _;
use tracing::info;

#[derive(Parser)]
#[command(name = "nodeleasectl", about = "CLI tool for testnet node leases")]
struct Cli {
    /// Server API endpoint
    #[arg(long, default_value = DEFAULT_API_ADDR)]
    server: String,

    /// Bearer token (required when the server runs in production mode)
    #[arg(long, env = "NODELEASE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage node leases
    Leases {
        #[command(subcommand)]
        action: LeaseAction,
    },
}

#[derive(Subcommand)]
enum LeaseAction {
    /// List your active leases
    List,
    /// Show one lease with live provider status
    Get {
        subnet_id: String,
        /// Node index (or lease id for records without one)
        node: String,
    },
    /// Provision a node and lease it
    Create {
        subnet_id: String,
        blockchain_id: String,
    },
    /// Release a lease and its provider node
    Delete { subnet_id: String, node: String },
}

fn render_table(leases: &[LeaseView]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<48} {:<6} {:<44} {:<8} {}",
        "SUBNET", "INDEX", "NODE ID", "EXPIRED", "EXPIRES"
    );
    for view in leases {
        let lease = &view.lease;
        let index = lease
            .node_index
            .map(|i| i.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<48} {:<6} {:<44} {:<8} {}",
            lease.subnet_id,
            index,
            lease.node_id,
            view.expired,
            lease.expires_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    if leases.is_empty() {
        out.push_str("(no active leases)\n");
    }
    out
}

async fn send(req: reqwest::RequestBuilder, token: Option<&str>) -> anyhow::Result<Value> {
    let req = match token {
        Some(t) => req.bearer_auth(t),
        None => req,
    };
    let resp = req.send().await?;
    let status = resp.status();
    let body: Value = resp.json().await.unwrap_or(Value::Null);

    if !status.is_success() {
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("no error message");
        eprintln!("Error: server returned {}: {}", status, message);
        std::process::exit(1);
    }
    Ok(body)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let client = reqwest::Client::new();
    let base = format!("{}/api/v1/leases", cli.server.trim_end_matches('/'));
    let token = cli.token.as_deref();

    match &cli.command {
        Commands::Leases { action } => match action {
            LeaseAction::List => {
                info!("Querying leases from {}", cli.server);
                let body = send(client.get(&base), token).await?;
                let leases: Vec<LeaseView> = serde_json::from_value(body)?;
                print!("{}", render_table(&leases));
            }
            LeaseAction::Get { subnet_id, node } => {
                let url = format!("{}/{}/{}", base, subnet_id, node);
                let body = send(client.get(&url), token).await?;
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
            LeaseAction::Create {
                subnet_id,
                blockchain_id,
            } => {
                info!("Requesting a node on subnet {}", subnet_id);
                let req = CreateLeaseRequest {
                    subnet_id: subnet_id.clone(),
                    blockchain_id: blockchain_id.clone(),
                };
                let body = send(client.post(&base).json(&req), token).await?;
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
            LeaseAction::Delete { subnet_id, node } => {
                let url = format!("{}/{}/{}", base, subnet_id, node);
                let body = send(client.delete(&url), token).await?;
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
        },
    }

    Ok(())
}
