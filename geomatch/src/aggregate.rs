//! Agrégation des rapports communaux et synthèse départementale
//!
//! Les compteurs sont toujours recalculés à partir des listes
//! (`len()`/`sum()`), jamais tenus à part. La synthèse départementale est une
//! fonction pure de l'ensemble des rapports communaux.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::completeness::Completeness;
use crate::config::{CoordUnits, EngineConfig};
use crate::dedup::{deduplicate, Deduplicate};
use crate::rank;
use crate::types::{CandidateRecord, Category, Establishment};
use crate::GeomatchError;

/// Tolérance relative sur les sommes de surfaces
const SURFACE_EPSILON: f64 = 1e-9;

/// Candidats d'une catégorie, classés
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategorySummary {
    pub count: usize,
    /// Surface totale en m²
    pub surface_totale: f64,
    /// Liste complète, dans l'ordre de classement
    pub records: Vec<CandidateRecord>,
    /// Les `top_n` premiers
    pub top: Vec<CandidateRecord>,
}

impl CategorySummary {
    /// Classe une liste déjà dédoublonnée et en dérive les compteurs
    pub fn build(mut records: Vec<CandidateRecord>, top_n: usize, units: CoordUnits) -> Self {
        rank::rank(&mut records, units);
        let top = records.iter().take(top_n).cloned().collect();
        Self {
            count: records.len(),
            surface_totale: total_surface(&records),
            records,
            top,
        }
    }

    /// Vérifie les invariants de la catégorie
    pub fn verify(&self, scope: &str, top_n: usize, units: CoordUnits) -> Result<(), GeomatchError> {
        if self.count != self.records.len() {
            return Err(GeomatchError::inconsistency(
                scope,
                format!("count {} != {} records", self.count, self.records.len()),
            ));
        }
        if self.top.len() != self.count.min(top_n) {
            return Err(GeomatchError::inconsistency(
                scope,
                format!("top has {} records, expected {}", self.top.len(), self.count.min(top_n)),
            ));
        }
        if !same_surface(self.surface_totale, total_surface(&self.records)) {
            return Err(GeomatchError::inconsistency(
                scope,
                format!("surface_totale {} does not match records", self.surface_totale),
            ));
        }
        let mut keys = HashSet::with_capacity(self.records.len());
        for record in &self.records {
            let key = record.identity_key(units);
            if !keys.insert(key.clone()) {
                return Err(GeomatchError::inconsistency(
                    scope,
                    format!("duplicate identity key {}", key),
                ));
            }
        }
        Ok(())
    }
}

fn total_surface(records: &[CandidateRecord]) -> f64 {
    records.iter().map(|r| r.surface).sum()
}

fn same_surface(a: f64, b: f64) -> bool {
    (a - b).abs() <= SURFACE_EPSILON * a.abs().max(b.abs()).max(1.0)
}

/// Répartit des candidats par catégorie, en conservant leur ordre
fn split_by_category(
    candidates: Vec<CandidateRecord>,
) -> (Vec<CandidateRecord>, Vec<CandidateRecord>, Vec<CandidateRecord>) {
    let mut parcelles = Vec::new();
    let mut toitures = Vec::new();
    let mut terrains = Vec::new();
    for c in candidates {
        match c.category {
            Category::Parcelle => parcelles.push(c),
            Category::Toiture => toitures.push(c),
            Category::Terrain => terrains.push(c),
        }
    }
    (parcelles, toitures, terrains)
}

/// Rapport d'une commune
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommuneReport {
    /// Code INSEE
    pub code: String,
    pub nom: String,
    pub dept: String,

    pub parcelles: CategorySummary,
    pub toitures: CategorySummary,
    pub terrains: CategorySummary,
    /// Éleveurs de la commune
    pub establishments: Vec<Establishment>,

    pub nb_parcelles: usize,
    pub nb_toitures: usize,
    pub nb_terrains: usize,
    pub nb_agriculteurs: usize,
    pub surface_totale: f64,

    /// Meilleurs candidats toutes catégories confondues
    pub top: Vec<CandidateRecord>,

    pub completeness: Completeness,
}

impl CommuneReport {
    /// Construit le rapport à partir de listes déjà filtrées et dédoublonnées
    pub fn build(
        code: &str,
        nom: &str,
        dept: &str,
        candidates: Vec<CandidateRecord>,
        establishments: Vec<Establishment>,
        mut completeness: Completeness,
        config: &EngineConfig,
    ) -> Self {
        let top = rank::top_n(&candidates, config.top_n, config.units);
        let (parcelles, toitures, terrains) = split_by_category(candidates);
        let parcelles = CategorySummary::build(parcelles, config.top_n, config.units);
        let toitures = CategorySummary::build(toitures, config.top_n, config.units);
        let terrains = CategorySummary::build(terrains, config.top_n, config.units);

        completeness.communes_processed = 1;
        completeness.finalize();

        Self {
            code: code.to_string(),
            nom: nom.to_string(),
            dept: dept.to_string(),
            nb_parcelles: parcelles.count,
            nb_toitures: toitures.count,
            nb_terrains: terrains.count,
            nb_agriculteurs: establishments.len(),
            surface_totale: parcelles.surface_totale
                + toitures.surface_totale
                + terrains.surface_totale,
            parcelles,
            toitures,
            terrains,
            establishments,
            top,
            completeness,
        }
    }

    /// Tous les candidats de la commune, catégorie par catégorie
    pub fn candidates(&self) -> impl Iterator<Item = &CandidateRecord> {
        self.parcelles
            .records
            .iter()
            .chain(self.toitures.records.iter())
            .chain(self.terrains.records.iter())
    }
}

/// Résumé d'une commune dans la synthèse départementale
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommuneSummary {
    pub code: String,
    pub nom: String,
    pub nb_parcelles: usize,
    pub nb_toitures: usize,
    pub nb_terrains: usize,
    pub nb_agriculteurs: usize,
    pub surface_totale: f64,
}

impl From<&CommuneReport> for CommuneSummary {
    fn from(report: &CommuneReport) -> Self {
        Self {
            code: report.code.clone(),
            nom: report.nom.clone(),
            nb_parcelles: report.nb_parcelles,
            nb_toitures: report.nb_toitures,
            nb_terrains: report.nb_terrains,
            nb_agriculteurs: report.nb_agriculteurs,
            surface_totale: report.surface_totale,
        }
    }
}

/// Synthèse d'un département
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentSynthesis {
    pub dept: String,
    /// Communes agrégées, dans l'ordre d'entrée
    pub communes: Vec<CommuneSummary>,

    pub parcelles: CategorySummary,
    pub toitures: CategorySummary,
    pub terrains: CategorySummary,
    pub establishments: Vec<Establishment>,

    pub nb_parcelles: usize,
    pub nb_toitures: usize,
    pub nb_terrains: usize,
    pub nb_agriculteurs: usize,
    pub surface_totale: f64,

    /// Classement inter-communes toutes catégories confondues
    pub top: Vec<CandidateRecord>,

    pub completeness: Completeness,
}

impl DepartmentSynthesis {
    /// Vérifie les invariants de la synthèse
    ///
    /// # Errors
    ///
    /// `AggregationInconsistency` au premier invariant violé. L'erreur est
    /// journalisée et remontée, la synthèse n'est jamais corrigée.
    pub fn verify(&self, top_n: usize, units: CoordUnits) -> Result<(), GeomatchError> {
        let result = self.check(top_n, units);
        if let Err(e) = &result {
            error!(dept = %self.dept, error = %e, "Department synthesis is inconsistent");
        }
        result
    }

    fn check(&self, top_n: usize, units: CoordUnits) -> Result<(), GeomatchError> {
        let scope = format!("dept {}", self.dept);
        for (category, summary) in self.categories() {
            summary.verify(&format!("{} {}", scope, category.label()), top_n, units)?;
        }

        let counts = [
            ("nb_parcelles", self.nb_parcelles, self.parcelles.records.len()),
            ("nb_toitures", self.nb_toitures, self.toitures.records.len()),
            ("nb_terrains", self.nb_terrains, self.terrains.records.len()),
            ("nb_agriculteurs", self.nb_agriculteurs, self.establishments.len()),
        ];
        for (name, count, len) in counts {
            if count != len {
                return Err(GeomatchError::inconsistency(
                    &scope,
                    format!("{} = {} but list has {} entries", name, count, len),
                ));
            }
        }

        let sum = self.parcelles.surface_totale
            + self.toitures.surface_totale
            + self.terrains.surface_totale;
        if !same_surface(self.surface_totale, sum) {
            return Err(GeomatchError::inconsistency(
                &scope,
                format!("surface_totale {} != category sum {}", self.surface_totale, sum),
            ));
        }

        let candidates = self.nb_parcelles + self.nb_toitures + self.nb_terrains;
        if self.top.len() != candidates.min(top_n) {
            return Err(GeomatchError::inconsistency(
                &scope,
                format!("top has {} records for {} candidates", self.top.len(), candidates),
            ));
        }

        let mut keys = HashSet::with_capacity(self.establishments.len());
        for e in &self.establishments {
            if !keys.insert(e.identity_key(units)) {
                return Err(GeomatchError::inconsistency(
                    &scope,
                    "duplicate establishment identity key",
                ));
            }
        }
        Ok(())
    }

    /// Les trois catégories avec leur libellé
    pub fn categories(&self) -> [(Category, &CategorySummary); 3] {
        [
            (Category::Parcelle, &self.parcelles),
            (Category::Toiture, &self.toitures),
            (Category::Terrain, &self.terrains),
        ]
    }
}

/// Accumulateur de la réduction départementale (repli séquentiel)
#[derive(Debug, Clone)]
pub struct DepartmentFold {
    dept: String,
    communes: Vec<CommuneSummary>,
    candidates: Vec<CandidateRecord>,
    establishments: Vec<Establishment>,
    completeness: Completeness,
}

impl DepartmentFold {
    pub fn new(dept: &str) -> Self {
        Self {
            dept: dept.to_string(),
            communes: Vec::new(),
            candidates: Vec::new(),
            establishments: Vec::new(),
            completeness: Completeness::new(),
        }
    }

    /// Intègre un rapport communal
    ///
    /// Un rapport d'un autre département est ignoré et noté.
    pub fn push(&mut self, report: CommuneReport) {
        if report.dept != self.dept {
            self.skip(
                &report.code,
                &format!("belongs to department {}, expected {}", report.dept, self.dept),
            );
            return;
        }
        self.completeness.record_commune_success();
        self.completeness.absorb(&report.completeness);
        self.communes.push(CommuneSummary::from(&report));

        let CommuneReport {
            parcelles,
            toitures,
            terrains,
            establishments,
            ..
        } = report;
        self.candidates.extend(parcelles.records);
        self.candidates.extend(toitures.records);
        self.candidates.extend(terrains.records);
        self.establishments.extend(establishments);
    }

    /// Note une commune ignorée (entrée mal formée)
    pub fn skip(&mut self, commune: &str, reason: &str) {
        warn!(dept = %self.dept, commune = %commune, reason = %reason, "Commune skipped");
        self.completeness.record_commune_failure(commune, reason);
    }

    /// Note une commune jamais traitée suite à une annulation
    pub fn cancelled(&mut self, commune: &str) {
        self.completeness.record_commune_cancelled(commune);
    }

    /// Dédoublonne à l'échelle du département, recalcule et vérifie
    ///
    /// # Errors
    ///
    /// `AggregationInconsistency` si un invariant est violé.
    pub fn finish(self, config: &EngineConfig) -> Result<DepartmentSynthesis, GeomatchError> {
        let units = config.units;
        let before = self.candidates.len();
        let candidates = deduplicate(self.candidates, units);
        let establishments = deduplicate(self.establishments, units);

        let top = rank::top_n(&candidates, config.top_n, units);
        let (parcelles, toitures, terrains) = split_by_category(candidates);
        let parcelles = CategorySummary::build(parcelles, config.top_n, units);
        let toitures = CategorySummary::build(toitures, config.top_n, units);
        let terrains = CategorySummary::build(terrains, config.top_n, units);

        let mut completeness = self.completeness;
        completeness.finalize();

        let synthesis = DepartmentSynthesis {
            dept: self.dept,
            communes: self.communes,
            nb_parcelles: parcelles.count,
            nb_toitures: toitures.count,
            nb_terrains: terrains.count,
            nb_agriculteurs: establishments.len(),
            surface_totale: parcelles.surface_totale
                + toitures.surface_totale
                + terrains.surface_totale,
            parcelles,
            toitures,
            terrains,
            establishments,
            top,
            completeness,
        };
        synthesis.verify(config.top_n, units)?;

        info!(
            dept = %synthesis.dept,
            communes = synthesis.communes.len(),
            nb_parcelles = synthesis.nb_parcelles,
            nb_toitures = synthesis.nb_toitures,
            nb_terrains = synthesis.nb_terrains,
            nb_agriculteurs = synthesis.nb_agriculteurs,
            merged = before - (synthesis.nb_parcelles + synthesis.nb_toitures + synthesis.nb_terrains),
            status = ?synthesis.completeness.status,
            "Department synthesis ready"
        );
        Ok(synthesis)
    }
}

/// Synthèse départementale à partir de rapports communaux
///
/// # Errors
///
/// `AggregationInconsistency` si un invariant est violé.
pub fn synthesize(
    dept: &str,
    reports: impl IntoIterator<Item = CommuneReport>,
    config: &EngineConfig,
) -> Result<DepartmentSynthesis, GeomatchError> {
    let mut fold = DepartmentFold::new(dept);
    for report in reports {
        fold.push(report);
    }
    fold.finish(config)
}
