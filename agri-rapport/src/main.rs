//! Point d'entrée CLI pour agri-rapport

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use agri_rapport::cli::{self, Commands};

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

/// Rapports de parcelles, toitures et terrains proches du réseau électrique
#[derive(Parser, Debug)]
#[command(name = "agri-rapport")]
#[command(author, version)]
#[command(about = "Rapports communaux et départementaux : surfaces et distances aux postes BT/HTA")]
#[command(long_about = "Construit des rapports classés à partir de couches GeoJSON déjà collectées (RPG, toitures, postes BT/HTA, éleveurs).\n\nAucun accès réseau : les fichiers d'entrée sont lus sur disque, le rapport JSON est écrit sur la sortie standard.")]
pub struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Commune {
            input,
            config,
            top_n,
            units,
            output,
        } => cli::cmd_commune(&input, &config, top_n, units, output.as_deref())?,
        Commands::Departement {
            dept,
            input,
            config,
            jobs,
            top_n,
            units,
            output,
        } => cli::cmd_departement(&dept, &input, &config, jobs, top_n, units, output.as_deref())?,
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // Le rapport JSON occupe stdout : les logs vont sur stderr
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
