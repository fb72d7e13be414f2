use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tenant_proxy::cluster::RedisClusterTransport;
use tenant_proxy::tenant::TenantDirectory;
use tenant_proxy::{Config, Router, Server};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tenant-proxy", version, about = "Tenant-isolating Redis Cluster proxy")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the listen address from the configuration
    #[arg(short, long)]
    listen: Option<String>,
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match Config::from_file(&args.config) {
        Ok(config) => config,
        Err(file_err) => {
            eprintln!(
                "Could not load {} ({}), falling back to environment",
                args.config.display(),
                file_err
            );
            Config::from_env().context("Failed to load configuration")?
        }
    };
    if let Some(listen) = &args.listen {
        config.server.listen_addr = listen.clone();
    }
    Ok(config)
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_logging(&config.logging.level);

    let directory = Arc::new(
        TenantDirectory::from_config(&config.tenants).context("Invalid tenant directory")?,
    );
    info!(
        "Loaded {} tenants (auth {})",
        directory.len(),
        if config.auth.enabled { "required" } else { "optional" }
    );
    if !config.auth.enabled {
        warn!("Authentication disabled: unauthenticated clients share the unprefixed key space");
    }
    info!(
        "max_connections = {} (informational, not enforced)",
        config.server.max_connections
    );

    let transport = RedisClusterTransport::connect(&config.cluster.nodes)
        .await
        .context("Failed to connect to Redis cluster")?;

    let router = Router::new(directory, Arc::new(transport), config.auth.enabled);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut server = Server::new(config.server.listen_addr.clone(), router, shutdown_rx);

    let mut server_task = tokio::spawn(async move { server.run().await });

    tokio::select! {
        result = &mut server_task => {
            result.context("Server task panicked")?.context("Server error")?;
            return Ok(());
        }
        _ = shutdown_signal() => {}
    }
    info!("Shutting down proxy...");
    let _ = shutdown_tx.send(true);

    server_task
        .await
        .context("Server task panicked")?
        .context("Server error")?;
    info!("Proxy shutdown complete");
    Ok(())
}
