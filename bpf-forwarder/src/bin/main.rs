//! `bpf-forwarder` binary: a thin CLI and logging shell around
//! [`bpf_forwarder::Forwarder`]. Binds the reference UDP transport and edge,
//! wires in the neighbors and routes named on the command line, and runs
//! the main loop until interrupted.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use bpf_config::BpfConfig;
use bpf_forwarder::{Forwarder, HeaderClassifier};
use bpf_pool::PacketPool;
use bpf_transport::{NeighborId, Transport, UdpEdge, UdpTransport};
use bpf_types::BinIndex;
use clap::Parser;
use tracing::info;

#[derive(Parser)]
#[command(name = "bpf-forwarder")]
#[command(about = "Backpressure-forwarding gradient scheduler for one overlay node")]
struct Args {
    /// Configuration file (YAML or TOML). Omit for an all-defaults config.
    #[arg(long)]
    config: Option<String>,

    /// Address the neighbor transport socket binds to.
    #[arg(long, default_value = "0.0.0.0:9400")]
    transport_bind: String,

    /// Address the local edge-ingress socket binds to.
    #[arg(long, default_value = "0.0.0.0:9401")]
    edge_bind: String,

    /// Neighbor to register, as `id=host:port`. Repeatable.
    #[arg(long = "neighbor", value_name = "ID=ADDR")]
    neighbors: Vec<String>,

    /// Route to register, as `bin=neighbor_id`. Repeatable.
    #[arg(long = "route", value_name = "BIN=ID")]
    routes: Vec<String>,

    /// Enable debug logging.
    #[arg(short, long)]
    debug: bool,
}

fn parse_neighbor(spec: &str) -> Result<(NeighborId, SocketAddr)> {
    let (id, addr) = spec
        .split_once('=')
        .with_context(|| format!("--neighbor expects ID=ADDR, got `{spec}`"))?;
    let id: u32 = id.parse().with_context(|| format!("invalid neighbor id in `{spec}`"))?;
    let addr: SocketAddr = addr.parse().with_context(|| format!("invalid neighbor address in `{spec}`"))?;
    Ok((NeighborId(id), addr))
}

fn parse_route(spec: &str) -> Result<(BinIndex, NeighborId)> {
    let (bin, id) = spec
        .split_once('=')
        .with_context(|| format!("--route expects BIN=ID, got `{spec}`"))?;
    let bin: u8 = bin.parse().with_context(|| format!("invalid bin in `{spec}`"))?;
    let id: u32 = id.parse().with_context(|| format!("invalid neighbor id in `{spec}`"))?;
    Ok((BinIndex(bin), NeighborId(id)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = bpf_config::load(args.config.as_deref()).context("loading configuration")?;
    info!(transport_bind = %args.transport_bind, edge_bind = %args.edge_bind, "starting forwarder");

    let pool = Arc::new(PacketPool::new_standalone());
    let transport = UdpTransport::bind(&args.transport_bind).await.context("binding transport socket")?;
    for spec in &args.neighbors {
        let (id, addr) = parse_neighbor(spec)?;
        transport.add_neighbor(id, addr);
        info!(neighbor = id.0, %addr, "registered neighbor");
    }
    let transport: Arc<dyn Transport> = Arc::new(transport);

    let edge_in = Arc::new(UdpEdge::bind(&args.edge_bind).await.context("binding edge socket")?);

    let mut forwarder = Forwarder::new(config, pool, transport, Box::new(HeaderClassifier)).with_edge_in(edge_in);
    for spec in &args.routes {
        let (bin, neighbor) = parse_route(spec)?;
        forwarder.topology_mut().add_route(bin, neighbor);
        info!(bin = bin.0, neighbor = neighbor.0, "registered route");
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal");
            let _ = shutdown_tx.send(true);
        }
    });

    forwarder.run(shutdown_rx).await.context("forwarder main loop")?;
    Ok(())
}
