use clap::Parser;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use cronmesh::agent::Agent;
use cronmesh::cluster::MeshHub;
use cronmesh::config::{AgentConfig, DEFAULT_RPC_PORT};
use cronmesh::http::run_http;
use cronmesh::store::MemStore;

#[derive(Parser, Debug)]
#[command(name = "cronmesh")]
#[command(about = "A clustered cron scheduler with tag-targeted dispatch")]
struct Args {
    /// Member name advertised to the cluster
    #[arg(long, default_value = "node1")]
    node_name: String,

    /// Gossip bind address
    #[arg(long, default_value = "127.0.0.1:8946")]
    bind: SocketAddr,

    /// Port for the HTTP API (optional)
    #[arg(long)]
    http_port: Option<u16>,

    /// Port for the execution-done RPC listener
    #[arg(long, default_value_t = DEFAULT_RPC_PORT)]
    rpc_port: u16,

    /// Tags advertised for job targeting (repeatable, format: "key=value")
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// How long a broadcast query stays open, in milliseconds
    #[arg(long, default_value = "2000")]
    query_timeout_ms: u64,
}

fn parse_tags(raw: &[String]) -> HashMap<String, String> {
    let mut tags = HashMap::new();
    for entry in raw {
        match entry.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                tags.insert(key.to_string(), value.to_string());
            }
            _ => tracing::warn!(tag = %entry, "Invalid tag format, expected key=value"),
        }
    }
    tags
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = AgentConfig {
        node_name: args.node_name,
        bind_addr: args.bind,
        tags: parse_tags(&args.tags),
        rpc_port: args.rpc_port,
        query_timeout_ms: args.query_timeout_ms,
        ..Default::default()
    };

    tracing::info!(
        node = %config.node_name,
        bind = %config.bind_addr,
        tags = ?config.tags,
        "Starting cronmesh agent"
    );

    let hub = MeshHub::new(config.query_timeout_ms);
    let store = Arc::new(MemStore::new());

    let member = {
        let mut m = cronmesh::cluster::Member::new(&config.node_name, config.bind_addr.to_string());
        m.tags = config.tags.clone();
        m
    };
    let (view, inbound) = hub.join(member);

    let agent = Agent::new(config, store, Arc::new(view));

    if let Some(port) = args.http_port {
        let http_addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
        let http_agent = agent.clone();
        tokio::spawn(async move {
            run_http(http_addr, http_agent).await;
        });
    }

    let shutdown = agent.shutdown_token();
    agent.run(inbound, shutdown).await;

    Ok(())
}
