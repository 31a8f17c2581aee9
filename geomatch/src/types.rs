//! Types de données pour le crate geomatch

use std::collections::BTreeMap;

use geo::{Centroid, Coord, Geometry};
use serde::{Deserialize, Serialize, Serializer};

/// Valeur d'attribut d'une feature (ensemble fermé)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl PropertyValue {
    /// Convertit une valeur JSON brute
    ///
    /// Les tableaux et objets imbriqués sont conservés sous forme de texte JSON compact.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) if f.is_finite() => Self::Number(f),
                _ => Self::Text(n.to_string()),
            },
            serde_json::Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Valeur numérique, y compris un texte numérique ("2.5", "2,5")
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s
                .trim()
                .replace(',', ".")
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Indique si un drapeau booléen/catégoriel est positionné
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0,
            Self::Text(s) => {
                let s = s.trim();
                !s.is_empty()
                    && !matches!(
                        s.to_lowercase().as_str(),
                        "0" | "false" | "non" | "no"
                    )
            }
        }
    }

    /// Rendu texte pour les identifiants
    pub fn to_id_string(&self) -> Option<String> {
        match self {
            Self::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Self::Number(n) if n.fract() == 0.0 => Some(format!("{}", *n as i64)),
            Self::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Attributs d'une feature, triés pour une sérialisation stable
pub type Properties = BTreeMap<String, PropertyValue>;

/// Une feature normalisée (coordonnées toujours en ordre x/lon, y/lat)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    /// Identifiant externe, absent si la source n'en fournit pas
    pub id: Option<String>,

    /// Géométrie (Point, Polygon ou MultiPolygon)
    #[serde(serialize_with = "serialize_geometry")]
    pub geometry: Geometry,

    /// Attributs de la feature
    pub properties: Properties,

    /// Couche source (ex: "gpu:rpg_parcelles")
    pub layer: String,
}

impl Feature {
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Nombre d'attributs renseignés (non nuls)
    pub fn non_null_properties(&self) -> usize {
        self.properties.values().filter(|v| !v.is_null()).count()
    }

    /// Point représentatif : le point lui-même, sinon le centroïde
    pub fn representative_point(&self) -> Option<Coord> {
        match &self.geometry {
            Geometry::Point(p) => Some(p.0),
            other => other
                .centroid()
                .map(|c| c.0)
                .filter(|c| c.x.is_finite() && c.y.is_finite())
                .or_else(|| first_coord(other)),
        }
    }
}

fn first_coord(geometry: &Geometry) -> Option<Coord> {
    match geometry {
        Geometry::Polygon(p) => p.exterior().0.first().copied(),
        Geometry::MultiPolygon(mp) => mp.0.first().and_then(|p| p.exterior().0.first().copied()),
        _ => None,
    }
}

fn serialize_geometry<S: Serializer>(geometry: &Geometry, serializer: S) -> Result<S::Ok, S::Error> {
    geojson::Geometry::new(geojson::Value::from(geometry)).serialize(serializer)
}

/// Nature d'une couche fournie par la couche de collecte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    /// Parcelles agricoles RPG
    Parcelle,
    /// Toitures (potentiel solaire)
    Toiture,
    /// Autres terrains (friches, parkings, parcelles cadastrales)
    Terrain,
    /// Établissements (éleveurs)
    Etablissement,
    /// Postes basse tension
    PosteBt,
    /// Postes HTA
    PosteHta,
}

impl LayerKind {
    /// Catégorie de candidats portée par la couche
    pub fn category(self) -> Option<Category> {
        match self {
            Self::Parcelle => Some(Category::Parcelle),
            Self::Toiture => Some(Category::Toiture),
            Self::Terrain => Some(Category::Terrain),
            _ => None,
        }
    }

    /// Classe d'infrastructure portée par la couche
    pub fn infra_class(self) -> Option<InfraClass> {
        match self {
            Self::PosteBt => Some(InfraClass::Bt),
            Self::PosteHta => Some(InfraClass::Hta),
            _ => None,
        }
    }
}

/// Catégorie de candidats d'un rapport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Parcelle,
    Toiture,
    Terrain,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Parcelle, Category::Toiture, Category::Terrain];

    pub fn label(self) -> &'static str {
        match self {
            Self::Parcelle => "parcelles",
            Self::Toiture => "toitures",
            Self::Terrain => "terrains",
        }
    }
}

/// Classe de poste électrique
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InfraClass {
    #[serde(rename = "BT")]
    Bt,
    #[serde(rename = "HTA")]
    Hta,
}

/// Point de raccordement au réseau (entrée seulement)
#[derive(Debug, Clone, PartialEq)]
pub struct InfrastructurePoint {
    pub id: String,
    pub coord: Coord,
    pub class: InfraClass,
}

/// Candidat annoté (parcelle, toiture ou terrain)
///
/// Jamais modifié après production : une fusion crée un nouvel enregistrement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRecord {
    pub feature: Feature,
    pub category: Category,
    /// Surface en m²
    pub surface: f64,
    /// Distance au poste BT le plus proche (m), nulle si aucun poste BT
    pub distance_bt: Option<f64>,
    /// Distance au poste HTA le plus proche (m), nulle si aucun poste HTA
    pub distance_hta: Option<f64>,
    /// Code INSEE de la commune
    pub commune: String,
    /// Code département
    pub dept: String,
    /// Point représentatif utilisé pour les distances
    #[serde(skip)]
    pub anchor: Coord,
    /// Nombre de doublons fusionnés dans cet enregistrement
    pub folded: u32,
}

/// Établissement (éleveur) rattaché à une commune
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Establishment {
    pub feature: Feature,
    pub commune: String,
    pub dept: String,
    #[serde(skip)]
    pub anchor: Coord,
    pub folded: u32,
}
