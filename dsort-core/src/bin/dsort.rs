//! Distributed sort binary
//!
//! Runs every node of the cluster in this process and prints the sorted items.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use dsort_core::input::read_items;
use dsort_core::worker::BackoffConfig;
use dsort_core::{ClusterConfig, SortCluster};
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(name = "dsort")]
#[command(about = "Sort a list of names across an elected coordinator and its workers")]
struct Args {
    /// Total nodes, coordinator included
    #[arg(short, long, env = "DSORT_NODES", default_value_t = dsort_core::DEFAULT_NODES)]
    nodes: usize,

    /// Address every node binds and dials
    #[arg(long, env = "DSORT_CLUSTER_IP", default_value = "127.0.0.1")]
    cluster_ip: String,

    /// Base port; node i uses port + i + 1
    #[arg(short, long, env = "DSORT_PORT", default_value_t = 3000)]
    port: u16,

    /// File with one item per line
    #[arg(short, long, env = "DSORT_FILE", default_value = "names.txt")]
    file: PathBuf,

    /// Dial attempts per worker before giving up
    #[arg(long, default_value_t = 10)]
    max_attempts: u32,

    /// Base delay between dial attempts, in milliseconds
    #[arg(long, default_value_t = 50)]
    retry_base_ms: u64,

    /// Deadline for each socket read or write, in seconds
    #[arg(long, default_value_t = 30)]
    io_timeout_secs: u64,

    /// Print cluster metrics to stderr once the run ends
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = ClusterConfig {
        nodes: args.nodes,
        cluster_ip: args.cluster_ip,
        base_port: args.port,
        input: args.file,
        io_timeout: Duration::from_secs(args.io_timeout_secs),
        backoff: BackoffConfig {
            max_attempts: args.max_attempts,
            initial: Duration::from_millis(args.retry_base_ms),
            ..Default::default()
        },
        ..Default::default()
    };

    let cluster = SortCluster::new(config)?;
    let items = read_items(&cluster.config().input).await?;

    info!(
        "Sorting {} items on {} nodes",
        items.len(),
        cluster.config().nodes
    );

    let abort = cluster.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort.shutdown();
        }
    });

    let outcome = cluster.run(items).await;
    if args.metrics {
        eprint!("{}", dsort_core::metrics::gather_cluster_metrics());
    } else {
        debug!("Cluster metrics:\n{}", dsort_core::metrics::gather_cluster_metrics());
    }

    match outcome {
        Ok(sorted) => {
            for item in &sorted {
                println!("{}", item);
            }
            info!("Sorted {} items", sorted.len());
            Ok(())
        }
        Err(e) => {
            error!("Sort failed: {}", e);
            Err(e.into())
        }
    }
}
