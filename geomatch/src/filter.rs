//! Filtrage des candidats annotés
//!
//! Prédicat pur et déterministe. Les seuils sont validés à la construction,
//! avant qu'aucun candidat ne soit examiné.

use serde::{Deserialize, Serialize};

use crate::normalize::culture;
use crate::types::{CandidateRecord, Category};
use crate::GeomatchError;

/// Combinaison des conditions de proximité BT et HTA
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProximityPolicy {
    /// Dans le seuil BT **ou** dans le seuil HTA
    #[default]
    Either,
    /// Dans tous les seuils configurés
    Both,
}

/// Seuils d'un rapport (surfaces en m², distances en m)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub min_surface: Option<f64>,
    pub max_surface: Option<f64>,
    pub max_distance_bt: Option<f64>,
    pub max_distance_hta: Option<f64>,
    pub policy: ProximityPolicy,
    /// Attributs d'exclusion (zones protégées) : un candidat portant l'un
    /// d'eux avec une valeur positionnée est écarté
    pub exclusion_flags: Vec<String>,
    /// Filtre culture (sous-chaîne, insensible à la casse) pour les parcelles RPG
    pub culture: Option<String>,
}

/// Moteur de filtrage validé
#[derive(Debug, Clone)]
pub struct FilterEngine {
    thresholds: Thresholds,
    culture: Option<String>,
}

impl FilterEngine {
    /// Valide les seuils et construit le filtre
    ///
    /// # Errors
    ///
    /// `ThresholdMisconfiguration` pour une valeur négative ou non finie,
    /// une surface minimale supérieure à la maximale, ou un drapeau vide.
    pub fn new(thresholds: Thresholds) -> Result<Self, GeomatchError> {
        check_non_negative("min_surface", thresholds.min_surface)?;
        check_non_negative("max_surface", thresholds.max_surface)?;
        check_non_negative("max_distance_bt", thresholds.max_distance_bt)?;
        check_non_negative("max_distance_hta", thresholds.max_distance_hta)?;

        if let (Some(min), Some(max)) = (thresholds.min_surface, thresholds.max_surface) {
            if min > max {
                return Err(GeomatchError::threshold(
                    "min_surface",
                    format!("{} exceeds max_surface {}", min, max),
                ));
            }
        }
        if thresholds.exclusion_flags.iter().any(|f| f.trim().is_empty()) {
            return Err(GeomatchError::threshold(
                "exclusion_flags",
                "flag names must not be empty",
            ));
        }

        let culture = thresholds
            .culture
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_lowercase);

        Ok(Self {
            thresholds,
            culture,
        })
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Indique si un candidat satisfait tous les seuils
    pub fn accepts(&self, candidate: &CandidateRecord) -> bool {
        let t = &self.thresholds;

        if t.min_surface.is_some_and(|min| candidate.surface < min) {
            return false;
        }
        if t.max_surface.is_some_and(|max| candidate.surface > max) {
            return false;
        }
        let excluded = t.exclusion_flags.iter().any(|flag| {
            candidate
                .feature
                .property(flag)
                .is_some_and(|v| v.is_truthy())
        });
        if excluded {
            return false;
        }

        self.culture_ok(candidate) && self.proximity_ok(candidate)
    }

    /// Conserve les candidats acceptés, dans leur ordre d'origine
    pub fn apply(&self, candidates: Vec<CandidateRecord>) -> Vec<CandidateRecord> {
        candidates.into_iter().filter(|c| self.accepts(c)).collect()
    }

    /// Condition de proximité
    ///
    /// Seules les classes dotées d'un seuil participent. Sans aucun seuil de
    /// distance, la condition est toujours vraie. Une distance nulle ne
    /// satisfait jamais un seuil.
    fn proximity_ok(&self, candidate: &CandidateRecord) -> bool {
        let checks: Vec<bool> = [
            (self.thresholds.max_distance_bt, candidate.distance_bt),
            (self.thresholds.max_distance_hta, candidate.distance_hta),
        ]
        .into_iter()
        .filter_map(|(max, distance)| max.map(|max| distance.is_some_and(|d| d <= max)))
        .collect();

        if checks.is_empty() {
            return true;
        }
        match self.thresholds.policy {
            ProximityPolicy::Either => checks.iter().any(|ok| *ok),
            ProximityPolicy::Both => checks.iter().all(|ok| *ok),
        }
    }

    fn culture_ok(&self, candidate: &CandidateRecord) -> bool {
        let Some(wanted) = &self.culture else {
            return true;
        };
        if candidate.category != Category::Parcelle {
            return true;
        }
        [culture::LABEL_KEY, culture::CODE_KEY].iter().any(|key| {
            candidate
                .feature
                .property(key)
                .and_then(|v| v.as_str())
                .is_some_and(|s| s.to_lowercase().contains(wanted.as_str()))
        })
    }
}

fn check_non_negative(field: &str, value: Option<f64>) -> Result<(), GeomatchError> {
    match value {
        Some(v) if !v.is_finite() => Err(GeomatchError::threshold(field, "must be finite")),
        Some(v) if v < 0.0 => Err(GeomatchError::threshold(
            field,
            format!("must be >= 0, got {}", v),
        )),
        _ => Ok(()),
    }
}
