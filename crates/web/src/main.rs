//! strcalc web server
//!
//! `serve` hosts the application (this is what the container image runs);
//! `package` builds the artifact the test harness can host from.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use strcalc_web::{artifact, AppConfig, ContextPath, WebApp};

#[derive(Parser)]
#[command(name = "strcalc-web")]
#[command(about = "strcalc web application")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the application
    Serve {
        /// Listen address
        #[arg(long, env = "STRCALC_WEB_ADDR", default_value = "0.0.0.0:8080")]
        addr: SocketAddr,

        /// URL prefix the application is served under
        #[arg(long, env = "STRCALC_CONTEXT_PATH", default_value = strcalc_common::DEFAULT_CONTEXT_PATH)]
        context_path: ContextPath,

        /// Directory containing app.toml
        #[arg(long, env = "STRCALC_CONFIG_DIR", default_value = strcalc_web::WEBAPP_CONFIG_DIR)]
        config_dir: PathBuf,

        /// Static file roots, searched in order
        #[arg(long = "static-dir", env = "STRCALC_STATIC_DIR", default_value = strcalc_web::WEBAPP_STATIC_DIR)]
        static_dirs: Vec<PathBuf>,
    },

    /// Package the application into an artifact
    Package {
        /// Directory containing app.toml
        #[arg(long, default_value = strcalc_web::WEBAPP_CONFIG_DIR)]
        config_dir: PathBuf,

        /// Static file roots; earlier roots shadow later ones
        #[arg(long = "static-dir", default_value = strcalc_web::WEBAPP_STATIC_DIR)]
        static_dirs: Vec<PathBuf>,

        /// Output archive path
        #[arg(short, long, default_value = "target/artifacts/strcalc.tar.gz")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve {
            addr,
            context_path,
            config_dir,
            static_dirs,
        } => {
            let config = AppConfig::load_from_dir(&config_dir)?;
            let app = WebApp::from_config(context_path, &config, static_dirs);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            strcalc_web::server::serve(listener, app, shutdown_signal()).await?;
            info!("strcalc stopped");
        }
        Command::Package {
            config_dir,
            static_dirs,
            output,
        } => {
            artifact::package(&config_dir, &static_dirs, &output)?;
            println!("{}", output.display());
        }
    }

    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix (the container's stop signal)
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
