//! Indicateur de complétude des rapports
//!
//! Un rapport est toujours produit, éventuellement dégradé. Ce module collecte
//! les couches et communes en échec ou annulées, et en déduit le statut.

use serde::Serialize;

use crate::normalize::NormalizeStats;

/// Statut global d'un rapport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Toutes les entrées ont été traitées
    Complete,
    /// Des couches ou communes ont été ignorées
    Partial,
    /// Traitement interrompu avant la fin
    Cancelled,
}

/// Niveau d'une note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteLevel {
    /// Commune ou couche ignorée
    Error,
    /// Traitement dégradé
    Warning,
}

/// Note attachée à un rapport
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    pub level: NoteLevel,
    /// Code INSEE de la commune concernée
    pub commune: Option<String>,
    /// Couche concernée
    pub layer: Option<String>,
    pub message: String,
}

/// Complétude d'un rapport communal ou départemental
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completeness {
    pub status: ReportStatus,
    pub complete: bool,

    /// Communes agrégées
    pub communes_processed: usize,
    /// Communes ignorées (entrée mal formée)
    pub communes_failed: usize,
    /// Communes jamais planifiées suite à une annulation
    pub communes_cancelled: usize,
    /// Couches ignorées (collection inexploitable)
    pub layers_failed: usize,
    /// Features écartées par la normalisation
    pub features_dropped: usize,

    pub notes: Vec<Note>,
}

impl Default for Completeness {
    fn default() -> Self {
        Self {
            status: ReportStatus::Complete,
            complete: true,
            communes_processed: 0,
            communes_failed: 0,
            communes_cancelled: 0,
            layers_failed: 0,
            features_dropped: 0,
            notes: Vec::new(),
        }
    }
}

impl Completeness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enregistre une commune agrégée
    pub fn record_commune_success(&mut self) {
        self.communes_processed += 1;
    }

    /// Enregistre une commune ignorée
    pub fn record_commune_failure(&mut self, commune: &str, message: &str) {
        self.communes_failed += 1;
        self.notes.push(Note {
            level: NoteLevel::Error,
            commune: Some(commune.to_string()),
            layer: None,
            message: message.to_string(),
        });
    }

    /// Enregistre une commune non traitée pour cause d'annulation
    pub fn record_commune_cancelled(&mut self, commune: &str) {
        self.communes_cancelled += 1;
        self.notes.push(Note {
            level: NoteLevel::Warning,
            commune: Some(commune.to_string()),
            layer: None,
            message: "cancelled before processing".to_string(),
        });
    }

    /// Enregistre une couche inexploitable
    pub fn record_layer_failure(&mut self, commune: &str, layer: &str, message: &str) {
        self.layers_failed += 1;
        self.notes.push(Note {
            level: NoteLevel::Error,
            commune: Some(commune.to_string()),
            layer: Some(layer.to_string()),
            message: message.to_string(),
        });
    }

    /// Enregistre les compteurs de normalisation d'une couche
    ///
    /// Les features écartées sont comptées sans dégrader le statut.
    pub fn record_drops(&mut self, stats: &NormalizeStats) {
        self.features_dropped += stats.dropped();
    }

    /// Cumule la complétude d'un rapport communal dans un rapport départemental
    pub fn absorb(&mut self, other: &Completeness) {
        self.layers_failed += other.layers_failed;
        self.features_dropped += other.features_dropped;
        self.notes.extend(other.notes.iter().cloned());
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        self.status = if self.communes_cancelled > 0 {
            ReportStatus::Cancelled
        } else if self.communes_failed > 0 || self.layers_failed > 0 {
            ReportStatus::Partial
        } else {
            ReportStatus::Complete
        };
        self.complete = self.status == ReportStatus::Complete;
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{:?}: {} communes, {} failed, {} cancelled, {} layers failed, {} features dropped",
            self.status,
            self.communes_processed,
            self.communes_failed,
            self.communes_cancelled,
            self.layers_failed,
            self.features_dropped
        )
    }
}
