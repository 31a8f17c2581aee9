//! Configuration des rapports

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use geomatch::{CoordUnits, EngineConfig, FilterEngine, Thresholds};

/// Noms des presets embarqués
pub const PRESETS: [&str; 3] = ["agricole", "toitures", "terrains"];

/// Configuration d'un rapport : moteur + seuils
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    pub engine: EngineConfig,
    pub thresholds: Thresholds,
}

impl ReportConfig {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Charge une configuration depuis un preset embarqué
    pub fn from_preset(preset: &str) -> Result<Self> {
        match preset {
            "agricole" => Self::load_embedded(include_str!("presets/agricole.json")),
            "toitures" => Self::load_embedded(include_str!("presets/toitures.json")),
            "terrains" => Self::load_embedded(include_str!("presets/terrains.json")),
            _ => anyhow::bail!(
                "Unknown preset: {}. Use: {}",
                preset,
                PRESETS.join(", ")
            ),
        }
    }

    fn load_embedded(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse embedded config")
    }

    /// Preset si le nom est connu, fichier JSON sinon
    pub fn resolve(name_or_path: &str) -> Result<Self> {
        if PRESETS.contains(&name_or_path) {
            Self::from_preset(name_or_path)
        } else {
            Self::load(Path::new(name_or_path))
        }
    }

    /// Applique les surcharges de la ligne de commande et de l'environnement
    pub fn with_overrides(mut self, top_n: Option<usize>, units: Option<CoordUnits>) -> Self {
        if let Some(n) = top_n {
            self.engine.top_n = n;
        }
        if let Some(u) = units {
            self.engine.units = u;
        }
        self
    }

    /// Valide la configuration et construit le filtre
    pub fn build_filter(&self) -> Result<FilterEngine> {
        self.engine.validate().context("Invalid engine configuration")?;
        FilterEngine::new(self.thresholds.clone()).context("Invalid thresholds")
    }
}

/// Valeurs par défaut lues dans l'environnement (`.env` compris)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeEnv {
    /// `GEOMATCH_JOBS`
    pub jobs: Option<usize>,
    /// `GEOMATCH_TOP_N`
    pub top_n: Option<usize>,
}

impl RuntimeEnv {
    /// Charge les valeurs depuis les variables d'environnement
    pub fn from_env() -> Self {
        Self {
            jobs: std::env::var("GEOMATCH_JOBS")
                .ok()
                .and_then(|s| s.parse().ok()),
            top_n: std::env::var("GEOMATCH_TOP_N")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geomatch::ProximityPolicy;

    #[test]
    fn test_presets_parse() {
        for preset in PRESETS {
            let config = ReportConfig::from_preset(preset).unwrap();
            assert!(config.build_filter().is_ok(), "preset {}", preset);
        }
    }

    #[test]
    fn test_agricole_preset() {
        let config = ReportConfig::from_preset("agricole").unwrap();
        assert_eq!(config.thresholds.min_surface, Some(10_000.0));
        assert_eq!(config.thresholds.policy, ProximityPolicy::Either);
        assert_eq!(config.engine.top_n, 50);
        assert!(!config.engine.id_keys.is_empty());
    }

    #[test]
    fn test_unknown_preset() {
        let err = ReportConfig::from_preset("nope").unwrap_err();
        assert!(err.to_string().contains("agricole"));
    }

    #[test]
    fn test_overrides() {
        let config = ReportConfig::default().with_overrides(Some(10), Some(CoordUnits::Meters));
        assert_eq!(config.engine.top_n, 10);
        assert_eq!(config.engine.units, CoordUnits::Meters);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let config: ReportConfig =
            serde_json::from_str(r#"{"thresholds": {"max_distance_bt": -1}}"#).unwrap();
        assert!(config.build_filter().is_err());
    }
}
