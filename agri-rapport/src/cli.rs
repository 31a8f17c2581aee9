//! Définition et implémentation des commandes CLI
//!
//! - `commune` : rapport d'une commune
//! - `departement` : synthèse de toutes les communes d'un département

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;
use tracing::{debug, info, warn};

use geomatch::{
    process_commune, run_department, CancelFlag, CommuneInput, CommuneProgress, CommuneStatus,
    CoordUnits, ProgressHook, ReportDocument, RunOptions,
};

use crate::config::{ReportConfig, RuntimeEnv};
use crate::input::{collect_inputs, read_envelope, read_envelopes};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the report of a single commune
    Commune {
        /// Commune JSON file (or directory containing exactly one)
        #[arg(short, long)]
        input: PathBuf,

        /// Config preset name (agricole/toitures/terrains) or path to a JSON config
        #[arg(long, default_value = "agricole")]
        config: String,

        /// Size of ranked lists (default: env GEOMATCH_TOP_N, then preset)
        #[arg(long)]
        top_n: Option<usize>,

        /// Coordinate units: degrees, meters
        #[arg(long)]
        units: Option<CoordUnits>,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build the synthesis of a department from its commune files
    Departement {
        /// Department code (ex: 38, 2A)
        #[arg(short, long)]
        dept: String,

        /// Directory of commune JSON files
        #[arg(short, long)]
        input: PathBuf,

        /// Config preset name (agricole/toitures/terrains) or path to a JSON config
        #[arg(long, default_value = "agricole")]
        config: String,

        /// Maximum number of communes processed concurrently (default: env GEOMATCH_JOBS, then CPU count)
        #[arg(long, alias = "threads")]
        jobs: Option<usize>,

        /// Size of ranked lists (default: env GEOMATCH_TOP_N, then preset)
        #[arg(long)]
        top_n: Option<usize>,

        /// Coordinate units: degrees, meters
        #[arg(long)]
        units: Option<CoordUnits>,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Exécute la commande commune
pub fn cmd_commune(
    input: &Path,
    config_arg: &str,
    top_n: Option<usize>,
    units: Option<CoordUnits>,
    output: Option<&Path>,
) -> Result<()> {
    let env = RuntimeEnv::from_env();
    let config = ReportConfig::resolve(config_arg)?.with_overrides(top_n.or(env.top_n), units);
    let filter = config.build_filter()?;

    let files = collect_inputs(input)?;
    let file = match files.as_slice() {
        [single] => single,
        [] => anyhow::bail!("No commune file (.json) found in {}", input.display()),
        _ => anyhow::bail!(
            "{} commune files found in {}, use `departement` or point to a single file",
            files.len(),
            input.display()
        ),
    };

    let raw = read_envelope(file)?;
    let commune = CommuneInput::from_value(&raw)?;
    info!(commune = %commune.code, config = config_arg, "Building commune report");

    let report = process_commune(&commune, &config.engine, &filter)
        .with_context(|| format!("Commune {} failed", commune.code))?;
    if !report.completeness.is_complete() {
        warn!(summary = %report.completeness.summary(), "Commune report is partial");
    }

    let document = ReportDocument::from_commune(&report, config.engine.units);
    write_json(&document, output)?;

    info!(
        commune = %report.code,
        nb_parcelles = report.nb_parcelles,
        nb_toitures = report.nb_toitures,
        nb_terrains = report.nb_terrains,
        nb_agriculteurs = report.nb_agriculteurs,
        "Done"
    );
    Ok(())
}

/// Exécute la commande departement
pub fn cmd_departement(
    dept: &str,
    input: &Path,
    config_arg: &str,
    jobs: Option<usize>,
    top_n: Option<usize>,
    units: Option<CoordUnits>,
    output: Option<&Path>,
) -> Result<()> {
    let env = RuntimeEnv::from_env();
    let config = ReportConfig::resolve(config_arg)?.with_overrides(top_n.or(env.top_n), units);
    let filter = config.build_filter()?;

    let files = collect_inputs(input)?;
    if files.is_empty() {
        anyhow::bail!("No commune files (.json) found in {}", input.display());
    }

    let jobs = jobs.or(env.jobs).unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    });

    info!(
        dept = dept,
        input = %input.display(),
        files = files.len(),
        config = config_arg,
        jobs = jobs,
        "Starting department synthesis"
    );

    let envelopes = read_envelopes(&files);
    let cancel = CancelFlag::new();
    cancel_on_ctrl_c(cancel.clone())?;
    let options = RunOptions {
        jobs,
        cancel,
        progress: Some(ProgressHook::new(log_progress)),
    };
    let synthesis = run_department(dept, &envelopes, &config.engine, &filter, &options)
        .with_context(|| format!("Department {} synthesis failed", dept))?;

    if synthesis.completeness.is_complete() {
        info!(summary = %synthesis.completeness.summary(), "Synthesis complete");
    } else {
        warn!(summary = %synthesis.completeness.summary(), "Synthesis is partial");
        for note in synthesis.completeness.notes.iter().take(20) {
            warn!(
                commune = note.commune.as_deref().unwrap_or("-"),
                layer = note.layer.as_deref().unwrap_or("-"),
                "{}",
                note.message
            );
        }
    }

    let document = ReportDocument::from_department(&synthesis, config.engine.units);
    write_json(&document, output)
}

/// Journalise l'achèvement d'une commune
fn log_progress(progress: &CommuneProgress<'_>) {
    let (done, total, commune) = (progress.done, progress.total, progress.commune);
    match progress.status {
        CommuneStatus::Done => info!("[{}/{}] {}", done, total, commune),
        CommuneStatus::Rejected => warn!("[{}/{}] {} rejected", done, total, commune),
        CommuneStatus::Cancelled => debug!("[{}/{}] {} cancelled", done, total, commune),
    }
}

/// Relie Ctrl-C au drapeau d'annulation
///
/// Un premier Ctrl-C laisse finir les communes en cours puis produit une
/// synthèse partielle ; un second interrompt le processus.
fn cancel_on_ctrl_c(cancel: CancelFlag) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build signal runtime")?;

    std::thread::Builder::new()
        .name("ctrl-c".into())
        .spawn(move || {
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                warn!("Ctrl-C received, finishing communes in progress");
                cancel.cancel();
                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(130);
                }
            })
        })
        .context("Failed to spawn signal thread")?;
    Ok(())
}

/// Écrit le document en JSON indenté
fn write_json<T: Serialize>(document: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(document).context("Failed to serialize report")?;
    match output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json)?;
        }
    }
    Ok(())
}
