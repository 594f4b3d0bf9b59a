#![forbid(unsafe_code)]

//! `wa-relay` server binary.
//!
//! Bootstraps configuration, connects the durable store, and serves the
//! webhook, send, and inbox HTTP endpoints.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use wa_relay::config::GlobalConfig;
use wa_relay::dispatch::Dispatcher;
use wa_relay::graph::GraphClient;
use wa_relay::http::{self, AppState};
use wa_relay::inbox::InboxStore;
use wa_relay::persistence::message_repo::MessageRepo;
use wa_relay::persistence::{db, retention};
use wa_relay::window::WindowEvaluator;
use wa_relay::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "wa-relay", about = "WhatsApp Business Cloud API relay", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the configured HTTP port.
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("wa-relay server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    if let Some(port) = args.port {
        config.http_port = port;
    }
    config.load_credentials()?;
    let config = Arc::new(config);
    info!("configuration loaded");

    // ── Initialize database ─────────────────────────────
    let db = Arc::new(db::connect(&config.db_path).await?);
    info!("database connected");

    // ── Start retention service ─────────────────────────
    let ct = CancellationToken::new();
    let retention_handle =
        retention::spawn_retention_task(Arc::clone(&db), config.retention_days, ct.clone());
    info!("retention service started");

    // ── Build shared application state ──────────────────
    let inbox = Arc::new(InboxStore::new());
    let repo = MessageRepo::new(Arc::clone(&db));
    let window = WindowEvaluator::new(Arc::clone(&inbox), repo.clone());
    let graph = GraphClient::new(&config.whatsapp);
    let dispatcher = Dispatcher::new(
        Arc::clone(&inbox),
        repo.clone(),
        window.clone(),
        graph.clone(),
        config.whatsapp.session_template.clone(),
        config.whatsapp.session_language.clone(),
    );

    let state = Arc::new(AppState {
        config: Arc::clone(&config),
        inbox,
        repo,
        window,
        graph,
        dispatcher,
    });

    // ── Serve HTTP until shutdown ───────────────────────
    let server_ct = ct.clone();
    let server_state = Arc::clone(&state);
    let server_handle = tokio::spawn(async move {
        if let Err(err) = http::serve(server_state, server_ct).await {
            error!(%err, "http transport failed");
        }
    });

    info!("wa-relay ready");

    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    let _ = tokio::join!(server_handle, retention_handle);
    info!("wa-relay shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
