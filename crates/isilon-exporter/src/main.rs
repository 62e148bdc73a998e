//! isilon-exporter - pull-metrics exporter for OneFS clusters.
//!
//! Each scrape of the telemetry path runs the enabled collectors
//! concurrently against the cluster's management API and answers with
//! the Prometheus text format.

mod config;
mod handlers;
mod state;

use std::fmt;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use isilon_core::client::types::QuotaType;
use isilon_core::client::{ClientError, HttpTransport, StatClient};
use isilon_core::collector::Registry;
use isilon_core::metrics::ConstLabels;

use config::{ConfigError, ExporterSettings, parse_quota_type};
use state::AppInner;

// ============================================================
// CLI
// ============================================================

#[derive(Parser, Debug)]
#[command(
    name = "isilon-exporter",
    about = "Prometheus exporter for OneFS clusters",
    version = isilon_core::VERSION
)]
pub(crate) struct Args {
    /// Address to listen on for scrapes.
    #[arg(long = "web.listen-address", default_value = "0.0.0.0:9300", env = "ISILON_EXPORTER_LISTEN")]
    listen_address: String,

    /// Path under which metrics are exposed.
    #[arg(long = "web.telemetry-path", default_value = "/metrics", env = "ISILON_EXPORTER_TELEMETRY_PATH")]
    telemetry_path: String,

    /// Seconds subtracted from the scraper's advertised timeout.
    #[arg(long = "web.scrape-timeout-offset", default_value_t = 0.5)]
    scrape_timeout_offset: f64,

    /// Upper bound for one scrape in seconds; also used when no timeout is advertised.
    #[arg(long = "web.max-scrape-timeout", default_value_t = 120.0)]
    max_scrape_timeout: f64,

    /// Cluster management address.
    #[arg(long = "isilon.cluster.fqdn", default_value = "localhost", env = "ISILON_CLUSTER_FQDN")]
    fqdn: String,

    #[arg(long = "isilon.cluster.port", default_value_t = 8080, env = "ISILON_CLUSTER_PORT")]
    port: u16,

    /// Management API user.
    #[arg(long = "isilon.cluster.username", default_value = "", env = "ISILON_CLUSTER_USERNAME")]
    username: String,

    /// Name of the environment variable holding the password.
    #[arg(long = "isilon.cluster.password.env", default_value = "ISILON_CLUSTER_PASSWORD")]
    password_env: String,

    /// Value of the `site` label on every sample.
    #[arg(long = "isilon.cluster.site", default_value = "", env = "ISILON_CLUSTER_SITE")]
    site: String,

    /// Accept invalid TLS certificates. Disable with --isilon.cluster.insecure=false.
    #[arg(long = "isilon.cluster.insecure", default_value_t = true, action = clap::ArgAction::Set)]
    insecure: bool,

    /// Timeout of a single API request in seconds.
    #[arg(long = "isilon.cluster.request-timeout", default_value_t = 30.0)]
    request_timeout: f64,

    /// Run only the quota collector and reconcile it against the summary count.
    #[arg(long = "quota-only")]
    quota_only: bool,

    /// Quota type to list: directory, user, group, default-user, default-group or all.
    #[arg(long = "collector.quota.type", default_value = "all", value_parser = parse_quota_type)]
    quota_type: QuotaType,

    /// List only quotas with an exceeded threshold.
    #[arg(long = "collector.quota.exceeded")]
    quota_exceeded: bool,

    /// Extra full listings allowed when the quota count falls short.
    #[arg(long = "collector.quota.retry", default_value_t = 3)]
    quota_retry: u32,

    /// Collectors to enable in addition to the defaults (comma-separated).
    #[arg(long = "collector.enable", value_delimiter = ',')]
    collector_enable: Vec<String>,

    /// Collectors to disable (comma-separated).
    #[arg(long = "collector.disable", value_delimiter = ',')]
    collector_disable: Vec<String>,

    /// Protocols to enable in addition to the defaults (comma-separated).
    #[arg(long = "protocol.enable", value_delimiter = ',')]
    protocol_enable: Vec<String>,

    /// Protocols to disable (comma-separated).
    #[arg(long = "protocol.disable", value_delimiter = ',')]
    protocol_disable: Vec<String>,

    /// Increase logging verbosity (-v for info, -vv for debug). Default is warn.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long)]
    quiet: bool,
}

// ============================================================
// Startup errors
// ============================================================

#[derive(Debug)]
enum StartupError {
    Config(ConfigError),
    /// Client construction or a startup check failed.
    Cluster { step: &'static str, source: ClientError },
    Io(std::io::Error),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::Config(e) => write!(f, "configuration: {e}"),
            StartupError::Cluster { step, source } => write!(f, "{step}: {source}"),
            StartupError::Io(e) => write!(f, "server: {e}"),
        }
    }
}

impl std::error::Error for StartupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StartupError::Config(e) => Some(e),
            StartupError::Cluster { source, .. } => Some(source),
            StartupError::Io(e) => Some(e),
        }
    }
}

impl From<ConfigError> for StartupError {
    fn from(e: ConfigError) -> Self {
        StartupError::Config(e)
    }
}

impl From<std::io::Error> for StartupError {
    fn from(e: std::io::Error) -> Self {
        StartupError::Io(e)
    }
}

fn cluster_step(step: &'static str) -> impl FnOnce(ClientError) -> StartupError {
    move |source| StartupError::Cluster { step, source }
}

// ============================================================
// Main
// ============================================================

/// RUST_LOG wins when set; otherwise -v/-q pick the level.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},hyper=warn,reqwest=warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(async_main(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "exporter stopped");
            ExitCode::FAILURE
        }
    }
}

async fn async_main(args: Args) -> Result<(), StartupError> {
    let settings = ExporterSettings::resolve(&args, |name| std::env::var(name).ok())?;
    info!(
        version = isilon_core::VERSION,
        cluster = %settings.transport.fqdn,
        port = settings.transport.port,
        "starting"
    );
    if settings.transport.insecure {
        warn!("TLS certificate verification is disabled");
    }

    let transport =
        HttpTransport::new(settings.transport.clone()).map_err(cluster_step("http client"))?;
    let client = StatClient::new(transport);

    let identity = client
        .cluster_identity()
        .await
        .map_err(cluster_step("cluster identity check"))?;
    info!(cluster = %identity.name, "connected to cluster");

    let mut collectors = settings.collectors.clone();
    if settings.quota_only {
        let summary = client
            .quota_summary()
            .await
            .map_err(cluster_step("quota summary check"))?;
        let expected = summary.count.max(0.0) as u64;
        info!(expected, "quota-only mode");
        collectors.quota_only(expected);
    }
    let enabled: Vec<&str> = collectors.enabled_names().collect();
    info!(collectors = ?enabled, "collectors enabled");

    let state = Arc::new(AppInner {
        registry: Registry::new(client, collectors),
        const_labels: ConstLabels {
            cluster: identity.name,
            site: settings.site.clone(),
        },
        telemetry_path: settings.telemetry_path.clone(),
        timing: settings.timing,
    });
    let app = handlers::router(state);

    let listener = tokio::net::TcpListener::bind(&settings.listen).await?;
    info!(addr = %settings.listen, path = %settings.telemetry_path, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
