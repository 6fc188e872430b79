use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use wcf_bridge::{
    config::{WcfOptions, DEFAULT_HOST, DEFAULT_PORT},
    infra::transport_tcp::FacadeServer,
    BridgeService, Wcferry,
};

/// CLI arguments.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
struct Args {
    /// TCP bind address for the JSONL façade, e.g. 127.0.0.1:8000
    #[arg(long, default_value = "127.0.0.1:8000")]
    bind: String,

    /// Host running the WeChatFerry RPC server
    #[arg(long, default_value = DEFAULT_HOST)]
    rpc_host: String,

    /// Command channel port; events are read from the next port up
    #[arg(long, default_value_t = DEFAULT_PORT)]
    rpc_port: u16,

    /// Staging directory for downloaded or inline send payloads
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Include moments-feed messages when receiving
    #[arg(long)]
    recv_pyq: bool,
}

impl Args {
    fn options(&self) -> WcfOptions {
        let mut options = WcfOptions {
            host: self.rpc_host.clone(),
            port: self.rpc_port,
            recv_pyq: self.recv_pyq,
            ..WcfOptions::default()
        };
        if let Some(dir) = &self.cache_dir {
            options.cache_dir = dir.clone();
        }
        options
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Structured logs; can be controlled with:
    // RUST_LOG=info or RUST_LOG=debug
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    info!(bind=%args.bind, rpc_host=%args.rpc_host, rpc_port=args.rpc_port, "wcf-bridge starting");

    let wcferry = Arc::new(Wcferry::new(args.options()).context("cannot build engine")?);
    wcferry
        .start()
        .await
        .context("cannot connect to the wcferry RPC server")?;

    let service = BridgeService::new(wcferry.clone());

    let server = FacadeServer::new(args.bind.parse().context("invalid --bind address")?);
    let server_handle = tokio::spawn({
        let service = service.clone();
        async move {
            if let Err(e) = server.run(service).await {
                warn!(error=%e, "façade server exited with error");
            }
        }
    });

    info!("bridge running (terminate with Ctrl+C)");

    tokio::signal::ctrl_c().await?;
    info!("Ctrl+C received; shutting down");

    server_handle.abort();
    wcferry.stop().await;

    Ok(())
}
