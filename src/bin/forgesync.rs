use anyhow::Context;
use clap::{Parser, Subcommand};
use forgesync::config::{BACKUP_DIR_ENV, CONFIG_FILE_ENV};
use forgesync::telemetry::{TracingTelemetry, NO_TELEMETRY_ENV};
use forgesync::{platform_client, Config, ForgesyncPaths, SyncSession, SystemGit, TokenRotator};
use std::path::PathBuf;
use std::sync::Arc;

/// Back up every repository an account can see on a git hosting platform
#[derive(Parser, Debug)]
#[command(name = "forgesync")]
#[command(version, about = "Back up git repositories to a local directory")]
struct Args {
    /// Path to the config file (overrides FORGESYNC_CONFIG_FILE)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backup directory (overrides FORGESYNC_BACKUP_DIR and the config file)
    #[arg(long)]
    backup_dir: Option<PathBuf>,

    /// Log level for forgesync (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write a starter config file and exit
    #[arg(long)]
    init: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the version and exit
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over --log-level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("warn,forgesync={}", args.log_level))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(Command::Version) = args.command {
        println!("forgesync {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let paths = ForgesyncPaths::new();
    let config_file = paths.config_file(args.config.as_deref(), std::env::var(CONFIG_FILE_ENV).ok());

    if args.init {
        let backup_dir = ForgesyncPaths::backup_dir(
            args.backup_dir.as_deref(),
            std::env::var(BACKUP_DIR_ENV).ok(),
            std::path::Path::new(""),
        );
        Config::initial(backup_dir)
            .save(&config_file)
            .await
            .with_context(|| format!("Failed to write {}", config_file.display()))?;
        println!("Config file created at {}", config_file.display());
        return Ok(());
    }

    let mut config = Config::load(&config_file)
        .await
        .with_context(|| format!("Failed to load {}", config_file.display()))?;
    config.apply_defaults();
    config.backup_dir = ForgesyncPaths::backup_dir(
        args.backup_dir.as_deref(),
        std::env::var(BACKUP_DIR_ENV).ok(),
        &config.backup_dir,
    );
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        "Starting forgesync {} for {} into {}",
        env!("CARGO_PKG_VERSION"),
        config.platform,
        config.backup_dir.display()
    );

    let tokens = Arc::new(TokenRotator::new(config.tokens.clone()));
    let telemetry = TracingTelemetry::init(
        &config.telemetry,
        std::env::var(NO_TELEMETRY_ENV).ok(),
        &paths.device_id_file(),
    )
    .await;

    let client = platform_client(&config, Arc::clone(&tokens)).context("Failed to set up platform client")?;
    let session = SyncSession::new(config, Arc::new(SystemGit::new()), tokens)
        .with_telemetry(Arc::new(telemetry));

    let summary = client.sync(session).await.context("Sync failed")?;
    if summary.has_failures() {
        tracing::warn!("{} item(s) failed to sync", summary.total_failures());
    }

    Ok(())
}
