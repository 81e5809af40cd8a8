//! Point d'entrée CLI pour content-sync

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use content_sync::AUDIT_TARGET;

// Charger .env au démarrage
fn load_env() {
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::{Commands, SyncArgs};

/// Synchroniser les publications de toutes les sources vers la table et le magasin géographique
#[derive(Parser)]
#[command(name = "content-sync")]
#[command(author, version)]
#[command(about = "Synchroniser les publications normalisées vers la table (défaut) et le magasin géographique")]
#[command(long_about = "Normalise les publications de chaque source, les réconcilie avec la table ordonnée puis, après un tri global, avec le magasin géographique.\n\nPar défaut, exécute une synchronisation complète. Utilisez 'normalize' pour inspecter un dump.")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Augmenter la verbosité (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Sous-commande (défaut: sync)
    #[command(subcommand)]
    command: Option<Commands>,

    /// Arguments de la synchronisation (commande par défaut)
    #[command(flatten)]
    sync: SyncArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Normalize {
            source,
            input,
            geocodes,
        }) => {
            init_logging(cli.verbose, cli.quiet, None)?;
            cli::cmd_normalize(source, &input, geocodes.as_deref())?;
        }
        Some(Commands::Project { lat, lon }) => {
            init_logging(cli.verbose, cli.quiet, None)?;
            cli::cmd_project(lat, lon)?;
        }
        Some(Commands::Sync(args)) => run_sync(&args, cli.verbose, cli.quiet).await?,
        None => run_sync(&cli.sync, cli.verbose, cli.quiet).await?,
    }

    Ok(())
}

async fn run_sync(args: &SyncArgs, verbose: u8, quiet: bool) -> Result<()> {
    let config = cli::resolve_config(args)?;
    init_logging(verbose, quiet, Some(&config.audit_log))?;

    info!(config = %args.config.display(), "Synchronisation");
    cli::cmd_sync(&config).await
}

/// Console pour les résumés, fichier d'audit (en ajout) pour les modifications
fn init_logging(verbose: u8, quiet: bool, audit_log: Option<&Path>) -> Result<()> {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive(format!("{}=off", AUDIT_TARGET).parse()?);

    let console = fmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_filter(filter);

    let audit = match audit_log {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .context(format!("Failed to open audit log: {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(Targets::new().with_target(AUDIT_TARGET, Level::TRACE)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(audit)
        .init();

    Ok(())
}
