//! # Lumen Server
//!
//! Indexes local media libraries into PostgreSQL, generates thumbnails in
//! the background and streams files back with HTTP range support.

use std::sync::Arc;

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use lumen_core::scan::RealFs;
use lumen_core::{
    CatalogStore, CommandThumbnailer, PostgresDatabase, Scanner,
    ThumbnailWorker,
};
use lumen_model::LibraryId;
use lumen_server::{
    AppState, create_app,
    infra::config::{Config, ConfigLoad, ConfigLoader},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "lumen-server")]
#[command(about = "Media catalog server with background thumbnails and range streaming")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct ServeArgs {
    /// Server port (overrides config)
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,

    /// Path to a lumen.toml (overrides LUMEN_CONFIG and default locations)
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand)]
    Db(DbCommand),
    /// Scan one library in the foreground and exit
    Scan {
        /// Library id
        #[arg(long)]
        library: Uuid,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_runtime_config(&cli.serve)?;

    match cli.command {
        Some(Command::Db(DbCommand::Migrate)) => run_db_migrate(&config).await,
        Some(Command::Scan { library }) => {
            run_scan_once(config, LibraryId::from(library)).await
        }
        None => run_server(config).await,
    }
}

fn load_runtime_config(args: &ServeArgs) -> anyhow::Result<Arc<Config>> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_config_path(path);
    }
    let ConfigLoad {
        mut config,
        warnings,
    } = loader.load().context("failed to load configuration")?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host.clone() {
        config.server.host = host;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,scan::summary=info,thumbnail::worker=info,tower_http=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    info!(
        scanner.index_other = config.scanner.index_other,
        scanner.rescan_job_policy = ?config.scanner.rescan_job_policy,
        scanner.timeout = ?config.scanner.timeout,
        worker.poll_interval = ?config.worker.poll_interval,
        worker.batch_size = config.worker.batch_size,
        worker.lock_timeout = ?config.worker.lock_timeout,
        thumbnails.dir = %config.thumb_dir().display(),
        "configuration in effect"
    );

    Ok(Arc::new(config))
}

async fn connect(config: &Config) -> anyhow::Result<PostgresDatabase> {
    let url = config
        .database
        .url
        .as_deref()
        .context("DATABASE_URL is not configured")?;
    PostgresDatabase::new(url, config.database.max_connections)
        .await
        .context("failed to connect to PostgreSQL")
}

async fn run_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pg = connect(config).await?;
    pg.initialize_schema()
        .await
        .context("database migration failed")?;
    info!("Database migrations applied successfully");
    Ok(())
}

async fn run_scan_once(
    config: Arc<Config>,
    library_id: LibraryId,
) -> anyhow::Result<()> {
    let pg = connect(&config).await?;
    pg.initialize_schema()
        .await
        .context("database migration failed")?;
    let catalog: Arc<dyn CatalogStore> = Arc::new(pg.catalog());

    let scanner = Scanner::new(catalog, Arc::new(RealFs), config.scanner.classifier())
        .with_rescan_policy(config.scanner.rescan_job_policy);
    let summary = scanner
        .scan_library(library_id)
        .await
        .with_context(|| format!("scan of library {library_id} failed"))?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    let pg = connect(&config).await?;
    pg.initialize_schema()
        .await
        .context("database migration failed")?;
    let catalog: Arc<dyn CatalogStore> = Arc::new(pg.catalog());

    let shutdown = CancellationToken::new();
    let worker = ThumbnailWorker::new(
        Arc::clone(&catalog),
        Arc::new(CommandThumbnailer::new(config.tools.clone())),
        config.worker.clone(),
    );
    let worker_handle = tokio::spawn(worker.run(shutdown.child_token()));

    let state = AppState::from_config(catalog, Arc::clone(&config));
    let router = create_app(state);

    let addr = config
        .server
        .socket_addr()
        .context("invalid server host/port")?;
    info!("Starting Lumen server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let signal_token = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal_token.cancel();
        })
        .await
        .context("server error")?;

    shutdown.cancel();
    if let Err(err) = worker_handle.await {
        error!(error = %err, "thumbnail worker task failed");
    }
    info!("Lumen server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_to_serve() {
        let cli = Cli::try_parse_from(["lumen-server", "--port", "9000"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.serve.port, Some(9000));
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["lumen-server", "db", "migrate"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Db(DbCommand::Migrate))));

        let id = Uuid::now_v7();
        let cli = Cli::try_parse_from([
            "lumen-server",
            "scan",
            "--library",
            &id.to_string(),
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Command::Scan { library }) if library == id));

        assert!(Cli::try_parse_from(["lumen-server", "scan", "--library", "nope"]).is_err());
    }
}
