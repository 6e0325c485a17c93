use std::path::PathBuf;

use clap::Parser;

use umesh_node::{Node, NodeConfig};

#[derive(Parser)]
#[command(name = "umesh-node", about = "umesh mesh network node")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "umesh.toml")]
    config: PathBuf,

    /// Start as the mesh leader regardless of the configuration file
    #[arg(long)]
    leader: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match NodeConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config from {}: {e}", cli.config.display());
            std::process::exit(1);
        }
    };
    if cli.leader {
        config.node.leader = true;
    }

    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        umesh_node::logging::init_json(&config.logging.level);
    } else {
        umesh_node::logging::init(&config.logging.level);
    }

    let mut node = match Node::new(&config).await {
        Ok(n) => n,
        Err(e) => {
            tracing::error!("failed to start node: {e}");
            std::process::exit(1);
        }
    };
    let handle = node.shutdown_handle();

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received SIGINT, shutting down");
        handle.shutdown();
    });

    if let Err(e) = node.run().await {
        tracing::error!("node failed: {e}");
        std::process::exit(1);
    }
}
