//! Types d'erreurs pour le crate geomatch

use thiserror::Error;

/// Erreurs remontées à l'appelant
///
/// Les défauts par feature (géométrie absente, coordonnées invalides) ne sont
/// jamais des erreurs : ils sont comptés dans [`DropReason`] et la feature est
/// écartée. Seules la configuration et les violations d'invariants remontent.
#[derive(Debug, Error)]
pub enum GeomatchError {
    /// Seuil de filtrage invalide, détecté à la construction du filtre
    #[error("Threshold misconfiguration on {field}: {reason}")]
    ThresholdMisconfiguration { field: String, reason: String },

    /// Configuration du moteur invalide
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// Invariant interne violé pendant l'agrégation (défaut, jamais corrigé en silence)
    #[error("Aggregation inconsistency in {scope}: {reason}")]
    AggregationInconsistency { scope: String, reason: String },

    /// Entrée communale rejetée (code manquant, mauvais département...)
    #[error("Commune {commune} rejected: {reason}")]
    CommuneRejected { commune: String, reason: String },
}

impl GeomatchError {
    /// Crée une erreur de seuil avec contexte
    pub fn threshold(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ThresholdMisconfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur d'incohérence d'agrégation
    pub fn inconsistency(scope: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AggregationInconsistency {
            scope: scope.into(),
            reason: reason.into(),
        }
    }

    /// Crée un rejet de commune
    pub fn commune_rejected(commune: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CommuneRejected {
            commune: commune.into(),
            reason: reason.into(),
        }
    }
}

/// Raison pour laquelle une feature brute a été écartée par la normalisation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// Structure invalide, type de géométrie refusé, coordonnées non finies ou absentes
    MalformedFeature,
    /// Membre `geometry` absent ou nul
    MissingGeometry,
}

/// Échec au niveau d'une collection entière (la couche est ignorée)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// La valeur n'est pas une FeatureCollection exploitable
    #[error("Not a feature collection: {0}")]
    NotACollection(String),
}
