//! Mise en forme des rapports pour la couche de rendu
//!
//! Les listes de candidats deviennent des `FeatureCollection` GeoJSON dont les
//! propriétés sont enrichies des valeurs calculées (surface, distances
//! arrondies, distance formatée, nombre de doublons fusionnés) et des champs
//! de présentation (liens Géoportail et annuaires, adresse des éleveurs).

use blake3::Hasher;
use geojson::{feature::Id, FeatureCollection, JsonObject, JsonValue};
use serde::Serialize;

use crate::aggregate::{CategorySummary, CommuneReport, CommuneSummary, DepartmentSynthesis};
use crate::completeness::Completeness;
use crate::config::CoordUnits;
use crate::dedup::Deduplicate;
use crate::types::{CandidateRecord, Establishment, Feature, Properties, PropertyValue};

/// Libellé d'une distance absente
pub const DISTANCE_UNKNOWN: &str = "Distance non calculée";

const GEOPORTAIL_URL: &str = "https://www.geoportail.gouv.fr/carte";
const ANNUAIRE_URL: &str = "https://www.pagesjaunes.fr/recherche";
const ENTREPRISE_URL: &str = "https://annuaire-entreprises.data.gouv.fr/etablissement";

/// Portée d'un document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportScope {
    Commune,
    Departement,
}

/// Catégorie mise en forme
#[derive(Debug, Clone, Serialize)]
pub struct CategoryDocument {
    pub count: usize,
    pub surface_totale_m2: f64,
    pub surface_totale_ha: f64,
    /// Meilleurs candidats, dans l'ordre de classement
    pub top: FeatureCollection,
}

/// Document prêt à sérialiser en JSON
#[derive(Debug, Clone, Serialize)]
pub struct ReportDocument {
    pub scope: ReportScope,
    /// Code commune ou département
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nom: Option<String>,
    pub dept: String,

    pub nb_parcelles: usize,
    pub nb_toitures: usize,
    pub nb_terrains: usize,
    pub nb_agriculteurs: usize,
    pub surface_totale_m2: f64,
    pub surface_totale_ha: f64,

    pub parcelles: CategoryDocument,
    pub toitures: CategoryDocument,
    pub terrains: CategoryDocument,
    /// Classement toutes catégories confondues
    pub top: FeatureCollection,
    pub eleveurs: FeatureCollection,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub communes: Vec<CommuneSummary>,
    pub completeness: Completeness,

    /// Empreinte blake3 (hex) des classements
    pub fingerprint: String,
}

impl ReportDocument {
    /// Met en forme un rapport communal
    pub fn from_commune(report: &CommuneReport, units: CoordUnits) -> Self {
        Self {
            scope: ReportScope::Commune,
            code: report.code.clone(),
            nom: Some(report.nom.clone()).filter(|n| !n.is_empty()),
            dept: report.dept.clone(),
            nb_parcelles: report.nb_parcelles,
            nb_toitures: report.nb_toitures,
            nb_terrains: report.nb_terrains,
            nb_agriculteurs: report.nb_agriculteurs,
            surface_totale_m2: round2(report.surface_totale),
            surface_totale_ha: round2(report.surface_totale / 10_000.0),
            parcelles: category_document(&report.parcelles, units),
            toitures: category_document(&report.toitures, units),
            terrains: category_document(&report.terrains, units),
            top: candidate_collection(&report.top, units),
            eleveurs: establishment_collection(&report.establishments),
            communes: Vec::new(),
            completeness: report.completeness.clone(),
            fingerprint: fingerprint(
                [&report.parcelles, &report.toitures, &report.terrains],
                &report.establishments,
                units,
            ),
        }
    }

    /// Met en forme une synthèse départementale
    pub fn from_department(synthesis: &DepartmentSynthesis, units: CoordUnits) -> Self {
        Self {
            scope: ReportScope::Departement,
            code: synthesis.dept.clone(),
            nom: None,
            dept: synthesis.dept.clone(),
            nb_parcelles: synthesis.nb_parcelles,
            nb_toitures: synthesis.nb_toitures,
            nb_terrains: synthesis.nb_terrains,
            nb_agriculteurs: synthesis.nb_agriculteurs,
            surface_totale_m2: round2(synthesis.surface_totale),
            surface_totale_ha: round2(synthesis.surface_totale / 10_000.0),
            parcelles: category_document(&synthesis.parcelles, units),
            toitures: category_document(&synthesis.toitures, units),
            terrains: category_document(&synthesis.terrains, units),
            top: candidate_collection(&synthesis.top, units),
            eleveurs: establishment_collection(&synthesis.establishments),
            communes: synthesis.communes.clone(),
            completeness: synthesis.completeness.clone(),
            fingerprint: fingerprint(
                [&synthesis.parcelles, &synthesis.toitures, &synthesis.terrains],
                &synthesis.establishments,
                units,
            ),
        }
    }
}

fn category_document(summary: &CategorySummary, units: CoordUnits) -> CategoryDocument {
    CategoryDocument {
        count: summary.count,
        surface_totale_m2: round2(summary.surface_totale),
        surface_totale_ha: round2(summary.surface_totale / 10_000.0),
        top: candidate_collection(&summary.top, units),
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Distance affichée : la plus petite distance connue, tronquée au mètre
pub fn format_distance(record: &CandidateRecord) -> String {
    let nearest = match (record.distance_bt, record.distance_hta) {
        (Some(bt), Some(hta)) => Some(bt.min(hta)),
        (bt, hta) => bt.or(hta),
    };
    match nearest {
        Some(d) => format!("{} m", d.trunc() as i64),
        None => DISTANCE_UNKNOWN.to_string(),
    }
}

fn candidate_collection(records: &[CandidateRecord], units: CoordUnits) -> FeatureCollection {
    collection(records.iter().map(|r| candidate_feature(r, units)).collect())
}

fn establishment_collection(establishments: &[Establishment]) -> FeatureCollection {
    collection(
        establishments
            .iter()
            .map(|e| {
                let mut properties = json_properties(&e.feature);
                properties.extend(establishment_presentation(&e.feature.properties));
                properties.insert("commune".into(), e.commune.clone().into());
                properties.insert("doublons".into(), e.folded.into());
                geojson_feature(&e.feature, properties)
            })
            .collect(),
    )
}

/// Champs d'affichage d'un éleveur, dérivés des attributs SIRENE
///
/// Un champ déjà présent sous son nom d'affichage sert de repli.
fn establishment_presentation(props: &Properties) -> JsonObject {
    let nom = first_text(props, &["nomUniteLe", "denominati", "nom"]);
    let prenom = first_text(props, &["prenom1Uni", "prenomUsue", "prenom"]);
    let denomination = first_text(props, &["denominati", "denomination"]);
    let activite = first_text(props, &["activite_1", "activite"]);
    let adresse = postal_address(props).unwrap_or_else(|| first_text(props, &["adresse"]));
    let siret = first_text(props, &["siret"]);

    let lien_annuaire = if nom.is_empty() {
        String::new()
    } else {
        let ville = first_text(props, &["libelleCom"]).replace(' ', "+");
        let qui = format!("{} {}", nom, denomination).trim().replace(' ', "+");
        format!("{}/{}/{}", ANNUAIRE_URL, ville, qui)
    };
    let lien_entreprise = if siret.is_empty() {
        String::new()
    } else {
        format!("{}/{}", ENTREPRISE_URL, siret)
    };

    [
        ("nom", nom),
        ("prenom", prenom),
        ("denomination", denomination),
        ("activite", activite),
        ("adresse", adresse),
        ("lien_annuaire", lien_annuaire),
        ("lien_entreprise", lien_entreprise),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), JsonValue::String(v)))
    .collect()
}

/// Première valeur non vide parmi des attributs candidats
fn first_text(props: &Properties, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| props.get(*key).and_then(PropertyValue::to_id_string))
        .unwrap_or_default()
}

/// Adresse "numéro type voie, code postal ville", absente si aucun élément
fn postal_address(props: &Properties) -> Option<String> {
    let join = |keys: &[&str]| {
        keys.iter()
            .map(|key| first_text(props, &[*key]))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    };
    let street = join(&["numeroVoie", "typeVoieEt", "libelleVoi"]);
    let city = join(&["codePostal", "libelleCom"]);
    match (street.is_empty(), city.is_empty()) {
        (true, true) => None,
        (false, true) => Some(street),
        (true, false) => Some(city),
        (false, false) => Some(format!("{}, {}", street, city)),
    }
}

fn collection(features: Vec<geojson::Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn candidate_feature(record: &CandidateRecord, units: CoordUnits) -> geojson::Feature {
    let mut properties = json_properties(&record.feature);
    properties.insert("categorie".into(), record.category.label().into());
    properties.insert("commune".into(), record.commune.clone().into());
    properties.insert("surface_m2".into(), round2(record.surface).into());
    properties.insert("surface_ha".into(), round2(record.surface / 10_000.0).into());
    properties.insert("distance_bt".into(), optional_distance(record.distance_bt));
    properties.insert("distance_hta".into(), optional_distance(record.distance_hta));
    properties.insert("distance_formatted".into(), format_distance(record).into());
    properties.insert(
        "distance_valid".into(),
        (record.distance_bt.is_some() || record.distance_hta.is_some()).into(),
    );
    properties.insert("doublons".into(), record.folded.into());
    if units == CoordUnits::Degrees {
        let (lon, lat) = (record.anchor.x, record.anchor.y);
        properties.insert("coords".into(), JsonValue::from(vec![lat, lon]));
        properties.insert(
            "lien_geoportail".into(),
            format!("{}?c={},{}&z=18", GEOPORTAIL_URL, lon, lat).into(),
        );
    }
    geojson_feature(&record.feature, properties)
}

fn optional_distance(d: Option<f64>) -> JsonValue {
    d.map(|d| JsonValue::from(round2(d))).unwrap_or(JsonValue::Null)
}

fn json_properties(feature: &Feature) -> JsonObject {
    feature
        .properties
        .iter()
        .map(|(k, v)| {
            let value = match v {
                PropertyValue::Null => JsonValue::Null,
                PropertyValue::Bool(b) => JsonValue::Bool(*b),
                PropertyValue::Number(n) => JsonValue::from(*n),
                PropertyValue::Text(s) => JsonValue::String(s.clone()),
            };
            (k.clone(), value)
        })
        .collect()
}

fn geojson_feature(feature: &Feature, properties: JsonObject) -> geojson::Feature {
    geojson::Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(&feature.geometry))),
        id: feature.id.clone().map(Id::String),
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Empreinte des classements
///
/// Deux rendus d'une même entrée donnent la même empreinte.
fn fingerprint(
    categories: [&CategorySummary; 3],
    establishments: &[Establishment],
    units: CoordUnits,
) -> String {
    let mut hasher = Hasher::new();
    for summary in categories {
        hasher.update(b"CAT");
        for record in &summary.records {
            hasher.update(record.identity_key(units).to_string().as_bytes());
            hasher.update(&record.surface.to_le_bytes());
            hasher.update(&record.distance_bt.unwrap_or(-1.0).to_le_bytes());
            hasher.update(&record.distance_hta.unwrap_or(-1.0).to_le_bytes());
        }
    }
    hasher.update(b"ELV");
    for e in establishments {
        hasher.update(e.identity_key(units).to_string().as_bytes());
    }
    hex::encode(hasher.finalize().as_bytes())
}
