use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use qguardarr::app::AppContext;
use qguardarr::config;

#[derive(Parser, Debug)]
#[command(name = "qguardarr", about = "Per-tracker upload cap enforcer for qBittorrent")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Force dry-run mode regardless of the config file.
    #[arg(long)]
    dry_run: bool,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut loaded = match config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };
    if cli.dry_run {
        loaded.global.dry_run = true;
    }

    if cli.quiet {
        loaded.logging.level = "error".to_string();
    } else if cli.verbose > 0 {
        loaded.logging.level = match cli.verbose {
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        };
    }

    qguardarr::telemetry::init(&loaded.logging);
    info!(config_path = %cli.config, "starting qguardarr");

    let config = Arc::new(loaded);
    let ctx = match AppContext::bootstrap(config.clone(), cli.config.clone()).await {
        Ok(ctx) => Arc::new(ctx),
        Err(e) => {
            error!(error = %e, "failed to initialize");
            std::process::exit(1);
        }
    };

    let update_interval = std::time::Duration::from_secs(config.global.update_interval);
    let cycle_ctx = ctx.clone();
    let cycle_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(update_interval);
        loop {
            ticker.tick().await;
            cycle_ctx.engine.run_cycle().await;
        }
    });

    let http_ctx = ctx.clone();
    let host = config.global.host.clone();
    let port = config.global.port;
    let http_task = tokio::spawn(async move {
        let router = qguardarr::http::router(http_ctx);
        let listener = tokio::net::TcpListener::bind((host.as_str(), port))
            .await
            .expect("failed to bind http listener");
        axum::serve(listener, router)
            .await
            .expect("http server failed");
    });

    #[cfg(unix)]
    let reload_task = {
        let reload_ctx = ctx.clone();
        tokio::spawn(async move {
            let mut hangup = signal::unix::signal(signal::unix::SignalKind::hangup())
                .expect("failed to install SIGHUP handler");
            loop {
                hangup.recv().await;
                info!("SIGHUP received, reloading configuration");
                match qguardarr::config::load(&reload_ctx.config_path) {
                    Ok(reloaded) => reload_ctx.engine.replace_config(Arc::new(reloaded)).await,
                    Err(e) => error!(error = %e, "config reload failed"),
                }
            }
        })
    };

    shutdown_signal().await;
    info!("shutdown signal received");
    cycle_task.abort();
    http_task.abort();
    #[cfg(unix)]
    reload_task.abort();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
