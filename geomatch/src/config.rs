//! Configuration du moteur
//!
//! Valeur explicite passée à chaque point d'entrée : le moteur ne lit jamais
//! d'état global (variables d'environnement, fichiers).

use serde::{Deserialize, Serialize};

use crate::GeomatchError;

/// Unité des coordonnées reçues
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordUnits {
    /// Degrés WGS84 (lon, lat)
    #[default]
    Degrees,
    /// Coordonnées projetées métriques (Lambert 93, UTM...)
    Meters,
}

impl CoordUnits {
    /// Facteur d'arrondi du centroïde pour la clé de dédoublonnage
    ///
    /// 6 décimales en degrés (~10 cm), 2 décimales en mètres (1 cm).
    pub fn dedup_scale(self) -> f64 {
        match self {
            Self::Degrees => 1_000_000.0,
            Self::Meters => 100.0,
        }
    }
}

impl std::str::FromStr for CoordUnits {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "degrees" | "deg" | "4326" => Ok(Self::Degrees),
            "meters" | "metres" | "m" | "2154" => Ok(Self::Meters),
            _ => Err(format!("Invalid units: {}. Use: degrees, meters", s)),
        }
    }
}

/// Ordre des axes des coordonnées sources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisOrder {
    /// Longitude puis latitude (GeoJSON standard)
    #[default]
    LonLat,
    /// Latitude puis longitude, sur demande explicite
    LatLon,
    /// Déduit des valeurs en degrés : inversion seulement si une position a
    /// une première valeur dans ±90 et une seconde hors de ±90
    Auto,
}

/// Attribut de surface et son facteur de conversion vers le m²
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceKey {
    pub key: String,
    pub to_m2: f64,
}

impl SurfaceKey {
    pub fn new(key: &str, to_m2: f64) -> Self {
        Self {
            key: key.to_string(),
            to_m2,
        }
    }
}

/// Configuration principale du moteur
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub units: CoordUnits,
    pub axis_order: AxisOrder,
    /// Taille des classements (top-N)
    pub top_n: usize,
    /// Attributs candidats pour l'identifiant externe, par priorité
    pub id_keys: Vec<String>,
    /// Attributs de surface, par priorité
    pub surface_keys: Vec<SurfaceKey>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            units: CoordUnits::Degrees,
            axis_order: AxisOrder::LonLat,
            top_n: 50,
            id_keys: ["ID_PARCEL", "idu", "id", "siret"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            surface_keys: vec![
                SurfaceKey::new("surface_m2", 1.0),
                SurfaceKey::new("contenance", 1.0),
                SurfaceKey::new("SURF_PARC", 10_000.0),
                SurfaceKey::new("surface_ha", 10_000.0),
            ],
        }
    }
}

impl EngineConfig {
    /// Vérifie la cohérence de la configuration
    pub fn validate(&self) -> Result<(), GeomatchError> {
        if self.top_n == 0 {
            return Err(GeomatchError::InvalidConfig("top_n must be >= 1".into()));
        }
        for sk in &self.surface_keys {
            if !sk.to_m2.is_finite() || sk.to_m2 <= 0.0 {
                return Err(GeomatchError::InvalidConfig(format!(
                    "surface key {} has invalid factor {}",
                    sk.key, sk.to_m2
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.top_n, 50);
    }

    #[test]
    fn test_zero_top_n_rejected() {
        let config = EngineConfig {
            top_n: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_units_from_str() {
        assert_eq!("degrees".parse::<CoordUnits>(), Ok(CoordUnits::Degrees));
        assert_eq!("2154".parse::<CoordUnits>(), Ok(CoordUnits::Meters));
        assert!("furlongs".parse::<CoordUnits>().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"units":"meters","top_n":10}"#).unwrap();
        assert_eq!(config.units, CoordUnits::Meters);
        assert_eq!(config.top_n, 10);
        assert_eq!(config.axis_order, AxisOrder::LonLat);
        assert!(!config.id_keys.is_empty());
    }
}
