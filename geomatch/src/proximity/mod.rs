//! Annotation des candidats : surface et distance aux postes BT/HTA

pub mod distance;
pub mod index;

use geo::{Area, GeodesicArea, Geometry};

use crate::config::{CoordUnits, EngineConfig};
use crate::types::{CandidateRecord, Category, Feature, InfraClass, InfrastructurePoint};

pub use index::{InfrastructureIndex, Nearest, SearchStrategy, EXHAUSTIVE_SCAN_LIMIT};

/// Contexte administratif d'un candidat
#[derive(Debug, Clone, Copy)]
pub struct Placement<'a> {
    pub category: Category,
    pub commune: &'a str,
    pub dept: &'a str,
}

/// Annotateur de proximité, construit une fois par commune
pub struct Annotator {
    bt: InfrastructureIndex,
    hta: InfrastructureIndex,
    units: CoordUnits,
}

impl Annotator {
    /// Répartit les postes par classe et construit les index
    pub fn new(points: impl IntoIterator<Item = InfrastructurePoint>, units: CoordUnits) -> Self {
        let (bt, hta): (Vec<_>, Vec<_>) = points
            .into_iter()
            .partition(|p| p.class == InfraClass::Bt);
        Self {
            bt: InfrastructureIndex::build(bt, units),
            hta: InfrastructureIndex::build(hta, units),
            units,
        }
    }

    pub fn index(&self, class: InfraClass) -> &InfrastructureIndex {
        match class {
            InfraClass::Bt => &self.bt,
            InfraClass::Hta => &self.hta,
        }
    }

    /// Annote une feature normalisée
    ///
    /// Un ensemble de postes vide donne une distance nulle, pas une erreur.
    /// Retourne `None` si la feature n'a pas de point représentatif.
    pub fn annotate(
        &self,
        feature: Feature,
        placement: Placement<'_>,
        config: &EngineConfig,
    ) -> Option<CandidateRecord> {
        let anchor = feature.representative_point()?;
        let distance_bt = self.bt.nearest(anchor).map(|n| n.distance);
        let distance_hta = self.hta.nearest(anchor).map(|n| n.distance);
        let surface = surface_of(&feature, config);

        Some(CandidateRecord {
            feature,
            category: placement.category,
            surface,
            distance_bt,
            distance_hta,
            commune: placement.commune.to_string(),
            dept: placement.dept.to_string(),
            anchor,
            folded: 0,
        })
    }

    /// Annote une liste de features, en conservant l'ordre
    pub fn annotate_all(
        &self,
        features: Vec<Feature>,
        placement: Placement<'_>,
        config: &EngineConfig,
    ) -> Vec<CandidateRecord> {
        debug_assert_eq!(self.units, config.units);
        features
            .into_iter()
            .filter_map(|f| self.annotate(f, placement, config))
            .collect()
    }
}

/// Convertit des features de postes en points d'infrastructure
///
/// Sans identifiant externe, l'id est dérivé de la couche et du rang.
pub fn infrastructure_points(features: &[Feature], class: InfraClass) -> Vec<InfrastructurePoint> {
    features
        .iter()
        .enumerate()
        .filter_map(|(i, f)| {
            let coord = f.representative_point()?;
            let id = f
                .id
                .clone()
                .unwrap_or_else(|| format!("{}#{:06}", f.layer, i));
            Some(InfrastructurePoint { id, coord, class })
        })
        .collect()
}

/// Surface d'une feature en m²
///
/// Premier attribut de surface valide, sinon aire du polygone, 0 pour un point.
pub fn surface_of(feature: &Feature, config: &EngineConfig) -> f64 {
    let from_properties = config.surface_keys.iter().find_map(|sk| {
        feature
            .property(&sk.key)
            .and_then(|v| v.as_f64())
            .filter(|v| *v >= 0.0)
            // -0.0 + 0.0 = 0.0 : une surface nulle est toujours positive
            .map(|v| v * sk.to_m2 + 0.0)
    });
    if let Some(surface) = from_properties {
        return surface;
    }

    match (&feature.geometry, config.units) {
        (Geometry::Polygon(p), CoordUnits::Degrees) => p.geodesic_area_unsigned(),
        (Geometry::MultiPolygon(mp), CoordUnits::Degrees) => mp.geodesic_area_unsigned(),
        (Geometry::Polygon(p), CoordUnits::Meters) => p.unsigned_area(),
        (Geometry::MultiPolygon(mp), CoordUnits::Meters) => mp.unsigned_area(),
        _ => 0.0,
    }
}
