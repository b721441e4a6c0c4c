mod access_log;
mod handlers;
mod state;

use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use vmware_exporter_core::inventory::{VsphereClient, VsphereConfig};
use vmware_exporter_core::metrics;
use vmware_exporter_core::refresh::{Refresher, TokioSpawner};
use vmware_exporter_core::registry::MetricRegistry;

use state::AppState;

// ============================================================
// CLI
// ============================================================

#[derive(Parser)]
#[command(
    name = "vmware-exporter",
    about = "Prometheus exporter for VMware ESXi and vCenter",
    version = vmware_exporter_core::VERSION
)]
struct Args {
    /// Listen address.
    #[arg(long, default_value = "0.0.0.0:9879", env = "ESX_LISTEN")]
    listen: String,

    /// ESXi host or vCenter server (host name or URL).
    #[arg(long, env = "ESX_HOST")]
    host: String,

    #[arg(long, env = "ESX_USERNAME")]
    username: String,

    #[arg(long, env = "ESX_PASSWORD", hide_env_values = true)]
    password: String,

    /// Log level for the exporter crates; RUST_LOG takes precedence.
    #[arg(long, default_value = "info", env = "ESX_LOG")]
    log: String,

    /// Accept invalid TLS certificates from the endpoint.
    #[arg(long, env = "ESX_INSECURE")]
    insecure: bool,

    /// VI/JSON API release.
    #[arg(long, default_value = VsphereConfig::DEFAULT_API_RELEASE, env = "ESX_API_RELEASE")]
    api_release: String,

    /// Timeout for a single request to the endpoint, in seconds.
    #[arg(long, default_value = "30")]
    request_timeout: u64,

    /// Path under which metrics are exposed.
    #[arg(long, default_value = "/metrics")]
    telemetry_path: String,

    /// Skip a resource type on scrape while its previous collection is still running.
    #[arg(long)]
    single_flight: bool,
}

// ============================================================
// Main
// ============================================================

fn main() {
    let args = Args::parse();

    init_logging(&args.log);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            process::exit(1);
        }
    };
    runtime.block_on(async_main(args));
}

fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "vmware_exporter={level},vmware_exporter_core={level}"
        ))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn async_main(args: Args) {
    info!(version = vmware_exporter_core::VERSION, endpoint = %args.host, "starting");

    if let Err(e) = handlers::validate_telemetry_path(&args.telemetry_path) {
        error!(error = %e, "invalid configuration");
        process::exit(1);
    }

    let mut registry = MetricRegistry::new();
    if let Err(e) = metrics::register_all(&mut registry) {
        error!(error = %e, "failed to register metrics");
        process::exit(1);
    }

    let mut config = VsphereConfig::new(args.host, args.username, args.password);
    config.api_release = args.api_release;
    config.insecure = args.insecure;
    config.timeout = Duration::from_secs(args.request_timeout);
    if config.insecure {
        warn!("TLS certificate verification disabled");
    }
    let client = match VsphereClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "failed to create vSphere client");
            process::exit(1);
        }
    };
    info!(endpoint_host = client.endpoint_host(), "vSphere client ready");

    let refresher = Refresher::new(Arc::new(client), Arc::new(registry), Arc::new(TokioSpawner))
        .with_single_flight(args.single_flight);
    let state = AppState::new(refresher, &args.telemetry_path);

    let app = handlers::router(state).into_make_service_with_connect_info::<SocketAddr>();

    let addr: SocketAddr = match args.listen.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(listen = %args.listen, error = %e, "invalid listen address");
            process::exit(1);
        }
    };
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "failed to bind");
            process::exit(1);
        }
    };
    info!(%addr, telemetry_path = %args.telemetry_path, "listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "server error");
        process::exit(1);
    }
    info!("stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
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
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
