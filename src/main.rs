//! crd-viz
//!
//! Web browser for the CustomResourceDefinitions of a Kubernetes cluster.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crd_viz::{
    ClusterConfig, CrdCatalog, CrdSourceRef, FileCrdSource, KubeCrdSource, Result,
    SchemaRenderer, ServerConfig, WebServer, MAX_RENDER_DEPTH,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// crd-viz - browse the CRDs registered in a Kubernetes cluster
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Set when running inside a cluster; otherwise --kubeconfig is used
    #[arg(long, env = "IN_CLUSTER")]
    in_cluster: bool,

    /// Path to the kubeconfig file (defaults to the standard lookup)
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long, env = "KUBE_CONTEXT")]
    context: Option<String>,

    /// Browse CRD manifests from this directory instead of a cluster
    #[arg(long, env = "CRD_DIR", conflicts_with = "in_cluster")]
    crd_dir: Option<PathBuf>,

    /// Hostname or IP for the http server
    #[arg(long, env = "HOSTNAME", default_value = "0.0.0.0")]
    hostname: String,

    /// Port for the http server to listen on
    #[arg(long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Connect/read timeout for Kubernetes API calls, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "10")]
    request_timeout_secs: u64,

    /// Schema nesting rendered before truncation
    #[arg(long, env = "MAX_DEPTH", default_value_t = MAX_RENDER_DEPTH)]
    max_depth: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    info!("Starting crd-viz");
    info!("  Version: {}", crd_viz::VERSION);
    info!("  In-cluster: {}", args.in_cluster);
    info!("  Max depth: {}", args.max_depth);

    let source: CrdSourceRef = match &args.crd_dir {
        Some(dir) => Arc::new(FileCrdSource::new(dir)),
        None => {
            let cluster = ClusterConfig {
                in_cluster: args.in_cluster,
                kubeconfig: args.kubeconfig.clone(),
                context: args.context.clone(),
                request_timeout: Duration::from_secs(args.request_timeout_secs),
            };
            Arc::new(KubeCrdSource::connect(&cluster).await?)
        }
    };

    let catalog =
        CrdCatalog::new(source).with_renderer(SchemaRenderer::with_max_depth(args.max_depth));

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    let server_config = ServerConfig::from_host_port(&args.hostname, args.port)?;
    WebServer::new(server_config, catalog, shutdown).run().await?;

    info!("crd-viz shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "kube=info", "tower=warn", "tower_http=info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Signals
// =============================================================================

async fn watch_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
    shutdown.cancel();
}
