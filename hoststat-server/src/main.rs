use anyhow::Context;
use axum::{Router, routing::any};
use clap::{ArgAction, Parser};
use confique::Config;
use time::UtcOffset;
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::{info, trace, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod format;
mod query;
mod route;

#[derive(Debug, Parser)]
#[command(name = "hoststat-server", disable_help_flag = true)]
struct Cli {
    #[arg(short = 'h', long, value_name = "ADDRESS", help = "Server listen address")]
    address: Option<String>,
    #[arg(short = 'p', long, value_name = "PORT", help = "Server listen port")]
    port: Option<u16>,
    #[arg(short, long, value_name = "FILE", help = "Path to config file")]
    config_path: Option<String>,
    #[arg(long, action = ArgAction::Help, help = "Print help")]
    help: Option<bool>,
}

#[derive(Config, Debug)]
struct Conf {
    /// Bind address, either an IP or a host name
    #[config(env = "HOSTSTAT_ADDRESS", default = "127.0.0.1")]
    address: String,

    /// Port to listen on
    #[config(env = "HOSTSTAT_PORT", default = 9090)]
    port: u16,
}

fn config(path: &str) -> anyhow::Result<Conf> {
    Conf::builder()
        .env()
        .file(path)
        .load()
        .map_err(|e| e.into())
}

#[derive(Clone, Debug)]
pub(crate) struct AppState {
    /// Local offset at the host's boot instant, resolved once at startup.
    pub boot_offset: UtcOffset,
}

fn app(state: AppState) -> Router {
    Router::new()
        .route(route::STATS_PREFIX, any(route::stats))
        .route("/stats/{*key}", any(route::stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn main() -> anyhow::Result<()> {
    // only sound before the runtime spawns its workers
    let boot_offset = query::boot_local_offset();

    init_tracing();

    let cli = Cli::parse();
    trace!("using command line arguments {:?}", cli);

    let config = config(cli.config_path.as_deref().unwrap_or("hoststat.toml"))?;
    trace!("using config {:?}", config);

    let boot_offset = boot_offset.unwrap_or_else(|e| {
        warn!("unable to determine local UTC offset, falling back to UTC: {e}");
        UtcOffset::UTC
    });

    let addr = format!(
        "{}:{}",
        cli.address.unwrap_or(config.address),
        cli.port.unwrap_or(config.port)
    );

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(serve(addr, AppState { boot_offset }))
}

async fn serve(addr: String, state: AppState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to listen on {addr}"))?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                #[cfg(debug_assertions)]
                let default_log_level =
                    format!("{}=debug,tower_http=debug", env!("CARGO_CRATE_NAME")).into();

                #[cfg(not(debug_assertions))]
                let default_log_level =
                    format!("{}=info,tower_http=info", env!("CARGO_CRATE_NAME")).into();

                default_log_level
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutting down");
}
