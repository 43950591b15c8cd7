//! `reqctx-server`: answers every request with the identifier generated for it.
//!
//! Usage:
//!   reqctx-server                          # 0.0.0.0:3000, pretty logs
//!   reqctx-server --port 8080 --metrics    # custom port, expose /metrics
//!   reqctx-server --log-format json        # JSON logs with request spans

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::Parser;
use reqctx_server::network::{TlsConfig, DEFAULT_PORT};
use reqctx_server::telemetry::{init_tracing, install_metrics_recorder, LogFormat};
use reqctx_server::{NetworkConfig, NetworkModule};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "reqctx-server", about = "Request-scoped context demo server")]
struct Cli {
    /// Address to bind
    #[arg(long, env = "REQCTX_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on (0 for OS-assigned)
    #[arg(long, env = "REQCTX_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Seconds before a running request is answered with 408
    #[arg(long, env = "REQCTX_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    /// Seconds to wait for in-flight requests on shutdown
    #[arg(long, env = "REQCTX_DRAIN_TIMEOUT_SECS", default_value_t = 30)]
    drain_timeout_secs: u64,

    /// Allowed CORS origin; repeat or comma-separate. `*` allows any
    #[arg(
        long = "cors-origin",
        env = "REQCTX_CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "*"
    )]
    cors_origins: Vec<String>,

    /// PEM certificate; enables TLS together with --tls-key
    #[arg(long, env = "REQCTX_TLS_CERT", requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    /// PEM private key
    #[arg(long, env = "REQCTX_TLS_KEY", requires = "tls_cert")]
    tls_key: Option<PathBuf>,

    /// Log output format
    #[arg(long, env = "REQCTX_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Record request metrics and serve them at /metrics
    #[arg(long, env = "REQCTX_METRICS", value_parser = BoolishValueParser::new())]
    metrics: bool,
}

impl Cli {
    fn network_config(&self) -> NetworkConfig {
        let tls = match (&self.tls_cert, &self.tls_key) {
            (Some(cert_path), Some(key_path)) => Some(TlsConfig {
                cert_path: cert_path.clone(),
                key_path: key_path.clone(),
            }),
            _ => None,
        };

        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            tls,
            cors_origins: self.cors_origins.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            drain_timeout: Duration::from_secs(self.drain_timeout_secs),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    let config = cli.network_config();
    let scheme = if config.tls.is_some() { "https" } else { "http" };

    let mut module = NetworkModule::new(config);
    if cli.metrics {
        module = module.with_metrics(install_metrics_recorder()?);
    }

    let port = module.start().await?;
    info!("Server is running on {scheme}://{}:{port}", display_host(&cli.host));

    module.serve(shutdown_signal()).await
}

/// Host to show in the startup URL. An unspecified bind address accepts local
/// connections, so it is shown as `localhost`.
fn display_host(host: &str) -> &str {
    let ip = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    match ip.parse::<IpAddr>() {
        Ok(addr) if addr.is_unspecified() => "localhost",
        _ => host,
    }
}

/// Resolves on ctrl-c. If the handler cannot be installed, never resolves.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
