//! Orchestration : traitement par commune puis réduction départementale
//!
//! Chaque commune passe par normalisation, annotation, filtrage et
//! dédoublonnage, indépendamment des autres : ces traitements tournent sur un
//! pool rayon borné. La réduction départementale est un repli séquentiel sur
//! les résultats, dans l'ordre d'entrée.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::aggregate::{CommuneReport, DepartmentFold, DepartmentSynthesis};
use crate::completeness::Completeness;
use crate::config::EngineConfig;
use crate::dedup::deduplicate;
use crate::filter::FilterEngine;
use crate::normalize::{culture, normalize_collection};
use crate::proximity::{infrastructure_points, Annotator, Placement};
use crate::types::{Category, Establishment, Feature, InfrastructurePoint, LayerKind};
use crate::GeomatchError;

/// Une couche collectée pour une commune
#[derive(Debug, Clone, Deserialize)]
pub struct LayerInput {
    /// Nom de la couche source (ex: "gpu:rpg_parcelles")
    pub layer: String,
    pub kind: LayerKind,
    /// FeatureCollection brute
    #[serde(default)]
    pub collection: Value,
}

/// Données déjà collectées d'une commune
#[derive(Debug, Clone, Deserialize)]
pub struct CommuneInput {
    /// Code INSEE
    pub code: String,
    #[serde(default)]
    pub nom: String,
    pub dept: String,
    #[serde(default)]
    pub layers: Vec<LayerInput>,
    /// Provenance de l'enveloppe (chemin du fichier lu)
    #[serde(default)]
    pub source: Option<String>,
}

impl CommuneInput {
    /// Lit une enveloppe brute
    ///
    /// # Errors
    ///
    /// `CommuneRejected` si l'enveloppe ne se désérialise pas ou si le code
    /// commune est vide.
    pub fn from_value(raw: &Value) -> Result<Self, GeomatchError> {
        let label = envelope_label(raw);
        let input = CommuneInput::deserialize(raw)
            .map_err(|e| GeomatchError::commune_rejected(&label, e.to_string()))?;
        if input.code.trim().is_empty() {
            return Err(GeomatchError::commune_rejected(label, "empty commune code"));
        }
        if input.dept.trim().is_empty() {
            return Err(GeomatchError::commune_rejected(&input.code, "empty department code"));
        }
        Ok(input)
    }
}

/// Libellé d'une enveloppe pour les notes : code commune, sinon provenance
fn envelope_label(raw: &Value) -> String {
    ["code", "source"]
        .iter()
        .find_map(|key| {
            raw.get(*key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|c| !c.is_empty())
        })
        .unwrap_or("<unknown>")
        .to_string()
}

/// Drapeau d'annulation coopérative, partagé entre l'appelant et le pool
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Demande l'arrêt : les communes non démarrées ne seront pas traitées
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Features d'une commune, triées par rôle
#[derive(Default)]
struct SortedLayers {
    candidates: Vec<(Category, Vec<Feature>)>,
    establishments: Vec<Feature>,
    points: Vec<InfrastructurePoint>,
}

/// Traite une commune de bout en bout
///
/// Une couche inexploitable est ignorée et notée dans la complétude du
/// rapport ; elle ne fait pas échouer la commune.
///
/// # Errors
///
/// `CommuneRejected` si le code commune ou département est vide.
pub fn process_commune(
    input: &CommuneInput,
    config: &EngineConfig,
    filter: &FilterEngine,
) -> Result<CommuneReport, GeomatchError> {
    let code = input.code.trim();
    let dept = input.dept.trim();
    if code.is_empty() {
        return Err(GeomatchError::commune_rejected("<unknown>", "empty commune code"));
    }
    if dept.is_empty() {
        return Err(GeomatchError::commune_rejected(code, "empty department code"));
    }

    let mut completeness = Completeness::new();
    let mut sorted = SortedLayers::default();

    for layer in &input.layers {
        let normalized = match normalize_collection(&layer.collection, &layer.layer, config) {
            Ok(n) => n,
            Err(e) => {
                warn!(commune = %code, layer = %layer.layer, error = %e, "Layer ignored");
                completeness.record_layer_failure(code, &layer.layer, &e.to_string());
                continue;
            }
        };
        completeness.record_drops(&normalized.stats);
        if normalized.stats.dropped() > 0 {
            debug!(
                commune = %code,
                layer = %layer.layer,
                malformed = normalized.stats.malformed,
                missing_geometry = normalized.stats.missing_geometry,
                "Features dropped"
            );
        }

        let features = normalized.features;
        match (layer.kind.category(), layer.kind.infra_class()) {
            (Some(Category::Parcelle), _) => sorted.candidates.push((
                Category::Parcelle,
                features.into_iter().map(culture::decorate).collect(),
            )),
            (Some(category), _) => sorted.candidates.push((category, features)),
            (None, Some(class)) => sorted
                .points
                .extend(infrastructure_points(&features, class)),
            (None, None) => sorted.establishments.extend(features),
        }
    }

    let annotator = Annotator::new(sorted.points, config.units);
    let mut candidates = Vec::new();
    for (category, features) in sorted.candidates {
        let placement = Placement {
            category,
            commune: code,
            dept,
        };
        candidates.extend(annotator.annotate_all(features, placement, config));
    }

    let annotated = candidates.len();
    let candidates = deduplicate(filter.apply(candidates), config.units);

    let establishments = sorted
        .establishments
        .into_iter()
        .filter_map(|feature| {
            let anchor = feature.representative_point()?;
            Some(Establishment {
                feature,
                commune: code.to_string(),
                dept: dept.to_string(),
                anchor,
                folded: 0,
            })
        })
        .collect();
    let establishments = deduplicate(establishments, config.units);

    let report = CommuneReport::build(
        code,
        &input.nom,
        dept,
        candidates,
        establishments,
        completeness,
        config,
    );

    debug!(
        commune = %report.code,
        annotated,
        nb_parcelles = report.nb_parcelles,
        nb_toitures = report.nb_toitures,
        nb_terrains = report.nb_terrains,
        nb_agriculteurs = report.nb_agriculteurs,
        "Commune processed"
    );
    Ok(report)
}

/// Issue du traitement d'une commune dans le pool
enum CommuneOutcome {
    Done(Box<CommuneReport>),
    Rejected { commune: String, reason: String },
    Cancelled(String),
}

impl CommuneOutcome {
    fn commune(&self) -> &str {
        match self {
            Self::Done(report) => &report.code,
            Self::Rejected { commune, .. } => commune,
            Self::Cancelled(commune) => commune,
        }
    }

    fn status(&self) -> CommuneStatus {
        match self {
            Self::Done(_) => CommuneStatus::Done,
            Self::Rejected { .. } => CommuneStatus::Rejected,
            Self::Cancelled(_) => CommuneStatus::Cancelled,
        }
    }
}

/// Issue d'une commune, telle que vue par le suivi de progression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommuneStatus {
    Done,
    Rejected,
    Cancelled,
}

/// Avancement d'une synthèse départementale, émis à la fin de chaque commune
#[derive(Debug, Clone, Copy)]
pub struct CommuneProgress<'a> {
    /// Nombre de communes terminées, celle-ci comprise (1..=total)
    pub done: usize,
    pub total: usize,
    /// Code commune (ou libellé de l'enveloppe rejetée)
    pub commune: &'a str,
    pub status: CommuneStatus,
}

/// Rappel de progression partagé entre les threads du pool
///
/// Appelé depuis les workers, dans l'ordre d'achèvement des communes.
#[derive(Clone)]
pub struct ProgressHook(Arc<dyn Fn(&CommuneProgress<'_>) + Send + Sync>);

impl ProgressHook {
    pub fn new(f: impl Fn(&CommuneProgress<'_>) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    fn notify(&self, progress: &CommuneProgress<'_>) {
        (self.0)(progress)
    }
}

impl fmt::Debug for ProgressHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProgressHook")
    }
}

/// Paramètres d'exécution d'une synthèse départementale
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Nombre de threads du pool (0 = parallélisme disponible)
    pub jobs: usize,
    pub cancel: CancelFlag,
    /// Suivi commune par commune
    pub progress: Option<ProgressHook>,
}

/// Traite toutes les communes d'un département et produit la synthèse
///
/// Les enveloppes mal formées ou d'un autre département sont ignorées et
/// notées. Après annulation, la synthèse est construite avec les communes
/// déjà traitées et marquée incomplète.
///
/// # Errors
///
/// Configuration invalide, pool impossible à créer, ou invariant
/// d'agrégation violé.
pub fn run_department(
    dept: &str,
    inputs: &[Value],
    config: &EngineConfig,
    filter: &FilterEngine,
    options: &RunOptions,
) -> Result<DepartmentSynthesis, GeomatchError> {
    config.validate()?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs)
        .build()
        .map_err(|e| GeomatchError::InvalidConfig(format!("cannot build worker pool: {}", e)))?;

    info!(
        dept = %dept,
        communes = inputs.len(),
        threads = pool.current_num_threads(),
        "Processing department"
    );

    let total = inputs.len();
    let finished = AtomicUsize::new(0);
    let outcomes: Vec<CommuneOutcome> = pool.install(|| {
        inputs
            .par_iter()
            .map(|raw| {
                let outcome = run_commune(dept, raw, config, filter, &options.cancel);
                let done = finished.fetch_add(1, Ordering::AcqRel) + 1;
                if let Some(hook) = &options.progress {
                    hook.notify(&CommuneProgress {
                        done,
                        total,
                        commune: outcome.commune(),
                        status: outcome.status(),
                    });
                }
                outcome
            })
            .collect()
    });

    let mut fold = DepartmentFold::new(dept);
    for outcome in outcomes {
        match outcome {
            CommuneOutcome::Done(report) => fold.push(*report),
            CommuneOutcome::Rejected { commune, reason } => fold.skip(&commune, &reason),
            CommuneOutcome::Cancelled(commune) => fold.cancelled(&commune),
        }
    }
    fold.finish(config)
}

fn run_commune(
    dept: &str,
    raw: &Value,
    config: &EngineConfig,
    filter: &FilterEngine,
    cancel: &CancelFlag,
) -> CommuneOutcome {
    if cancel.is_cancelled() {
        return CommuneOutcome::Cancelled(envelope_label(raw));
    }

    let input = match CommuneInput::from_value(raw) {
        Ok(input) => input,
        Err(e) => return rejected(e),
    };
    if input.dept.trim() != dept {
        return CommuneOutcome::Rejected {
            commune: input.code,
            reason: format!("belongs to department {}, expected {}", input.dept.trim(), dept),
        };
    }

    match process_commune(&input, config, filter) {
        Ok(report) => CommuneOutcome::Done(Box::new(report)),
        Err(e) => rejected(e),
    }
}

fn rejected(error: GeomatchError) -> CommuneOutcome {
    match error {
        GeomatchError::CommuneRejected { commune, reason } => {
            CommuneOutcome::Rejected { commune, reason }
        }
        other => CommuneOutcome::Rejected {
            commune: "<unknown>".to_string(),
            reason: other.to_string(),
        },
    }
}
