use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use policy_gateway::gateway::TunnelGateway;
use policy_gateway::{app, AppState, GatewayConfig};

#[derive(Parser)]
#[command(name = "policy-gateway")]
#[command(about = "Per-request SSH tunnel gateway for policy records")]
#[command(version)]
struct Args {
    #[arg(long, help = "Bind host (overrides GATEWAY_HOST)")]
    host: Option<String>,

    #[arg(long, help = "Bind port (overrides GATEWAY_PORT)")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so SSH_HOST, MYSQL_* etc. can live next to the binary
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = GatewayConfig::from_env().context("invalid gateway configuration")?;
    if let Some(host) = args.host {
        config.api.bind_host = host;
    }
    if let Some(port) = args.port {
        config.api.bind_port = port;
    }
    let config = Arc::new(config);

    tracing::info!(
        ssh = %format!("{}:{}", config.ssh.host, config.ssh.port),
        mysql = %format!("{}:{}", config.mysql.host, config.mysql.port),
        "starting policy gateway"
    );

    let state = AppState::new(Arc::new(TunnelGateway::new(Arc::clone(&config))));
    let router = app(state, &config.api);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("policy gateway listening on http://{}", bind_addr);

    axum::serve(listener, router).await.context("server error")?;
    Ok(())
}
