//! Backup Dashboard - Main entry point
//!
//! Live terminal dashboard and one-shot commands for the backup server.

use anyhow::{bail, Result};
use backup_dashboard::api::ApiClient;
use backup_dashboard::app::render::{self, TerminalRenderer};
use backup_dashboard::app::{input, App};
use backup_dashboard::dispatch::{self, Command, CommandDispatcher};
use backup_dashboard::reconcile::views;
use backup_dashboard::{config::Config, utils, utils::shutdown::ShutdownCoordinator};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Backup server URL (overrides config)
    #[arg(short, long, value_name = "URL")]
    server: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Live dashboard (default)
    Watch,
    /// List backups
    Backups,
    /// Create a backup now
    Backup { username: String },
    /// Delete a backup
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Latest stats, or the stats of one backup
    Stats { id: Option<String> },
    /// Save a backup archive
    Download {
        id: String,
        /// Target directory (overrides config)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
    /// Start the recurring backup job
    AutoStart {
        username: String,
        #[arg(short, long, default_value = views::DEFAULT_KEEP_LAST)]
        keep_last: String,
        /// Hours between runs
        #[arg(short, long, default_value = views::DEFAULT_INTERVAL_HOURS)]
        interval: String,
    },
    /// Stop the recurring backup job
    AutoStop,
    /// Show the recurring backup job
    AutoStatus,
    /// Show the server log
    Logs,
    /// Show the effective configuration
    Config {
        /// Print built-in defaults instead
        #[arg(long)]
        print_default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(url) = args.server {
        config.server.url = url;
    }

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    tracing::info!(
        "Starting backup-dashboard v{} (server: {})",
        env!("CARGO_PKG_VERSION"),
        config.server.url
    );

    match args.command.unwrap_or(Commands::Watch) {
        Commands::Watch => watch(&config).await,
        Commands::Config { print_default } => {
            let shown = if print_default { Config::default() } else { config };
            print!("{}", shown.to_toml()?);
            Ok(())
        }
        command => run_once(&config, command).await,
    }
}

async fn watch(config: &Config) -> Result<()> {
    let api = ApiClient::new(config)?;

    // Create shutdown coordinator
    let shutdown_coordinator = ShutdownCoordinator::new();
    let token = shutdown_coordinator.token();

    let app = App::new(config, api, TerminalRenderer::stdout(), token.clone());
    input::spawn_stdin_reader(app.sender(), token.clone())?;
    println!("{}", input::HELP);

    let signals = tokio::spawn(async move {
        shutdown_coordinator.wait_for_signal().await;
    });

    let result = app.run().await;

    token.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(1), signals).await;

    result?;
    tracing::info!("Dashboard stopped");
    Ok(())
}

async fn run_once(config: &Config, command: Commands) -> Result<()> {
    let api = ApiClient::new(config)?;
    let mut out = io::stdout();

    let command = match command {
        Commands::Backups => {
            let records = api.list_backups().await?;
            render::write_backups(&mut out, &views::render_backups(&records))?;
            return Ok(());
        }
        Commands::Stats { id: None } => {
            let panel = match api.latest_stats().await {
                Ok(snapshot) => views::render_latest_stats(&snapshot),
                Err(e) => {
                    tracing::warn!("Loading latest stats failed: {}", e);
                    views::latest_stats_failed()
                }
            };
            render::write_stats(&mut out, "Latest Backup", &panel)?;
            return Ok(());
        }
        Commands::Stats { id: Some(id) } => {
            let panel = match api.backup_stats(&id).await {
                Ok(snapshot) => views::render_backup_stats(&snapshot),
                Err(e) => views::backup_stats_failed(&e.to_string()),
            };
            render::write_stats(&mut out, &format!("Backup {}", id), &panel)?;
            return Ok(());
        }
        Commands::AutoStatus => {
            let status = api.auto_backup_status().await?;
            render::write_auto_backup(&mut out, &views::render_auto_backup(&status, false))?;
            return Ok(());
        }
        Commands::Logs => {
            let mut sink = backup_dashboard::log_sink::LogSink::new(config.dashboard.log_capacity);
            match api.logs().await {
                Ok(entries) => sink.replace(entries),
                Err(e) => sink.load_failed(e.to_string()),
            }
            render::write_logs(&mut out, &views::render_logs(&sink))?;
            return Ok(());
        }
        Commands::Backup { username } => Command::CreateBackup { username },
        Commands::Delete { id, .. } if id.trim().is_empty() => Command::DeleteBackup { id },
        Commands::Delete { id, yes } => {
            let confirmed = yes || confirm(dispatch::delete_prompt(id.trim())).await?;
            return send(config, &api, Command::DeleteBackup { id }, confirmed).await;
        }
        Commands::Download { id, dir } => Command::Download { id, dir },
        Commands::AutoStart {
            username,
            keep_last,
            interval,
        } => Command::StartAutoBackup {
            username,
            keep_last,
            interval_hours: interval,
        },
        Commands::AutoStop => Command::StopAutoBackup,
        Commands::Watch | Commands::Config { .. } => bail!("not a one-shot command"),
    };

    send(config, &api, command, true).await
}

/// Dispatch one command and report it the way the dashboard does.
async fn send(config: &Config, api: &ApiClient, command: Command, confirmed: bool) -> Result<()> {
    let dispatcher = CommandDispatcher::new(api.clone(), config.dashboard.download_dir.clone());
    let kind = command.kind();

    let pending = match dispatcher.begin(command, &confirmed) {
        Ok(pending) => pending,
        Err(backup_dashboard::DashboardError::Cancelled) => {
            println!("Cancelled.");
            return Ok(());
        }
        Err(e) => bail!("{}: {}", kind.title(), e),
    };

    println!("[INFO] {}", pending.start_message());
    let report = pending.send().await;

    if kind == dispatch::CommandKind::AutoBackup {
        match api.auto_backup_status().await {
            Ok(status) => {
                render::write_auto_backup(&mut io::stdout(), &views::render_auto_backup(&status, false))?
            }
            Err(e) => tracing::warn!("Loading auto backup status failed: {}", e),
        }
    }

    match report.result {
        Ok(message) => {
            println!("[SUCCESS] {}", message);
            Ok(())
        }
        Err(e) => bail!("{}: {}", report.label, e),
    }
}

/// Ask on the terminal; anything but y/yes is a no.
async fn confirm(prompt: String) -> Result<bool> {
    let answer = tokio::task::spawn_blocking(move || -> io::Result<bool> {
        print!("{} [y/N] ", prompt);
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(input::is_yes(&line))
    })
    .await??;
    Ok(answer)
}
