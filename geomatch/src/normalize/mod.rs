//! Normalisation des collections de features brutes
//!
//! Les collections proviennent d'un service externe non fiable. Une entrée
//! invalide est écartée et comptée, jamais fatale pour la collection.

pub mod culture;
mod geometry;

use serde::Serialize;
use serde_json::Value;

use crate::config::{AxisOrder, CoordUnits, EngineConfig};
use crate::error::{DropReason, NormalizeError};
use crate::types::{Feature, Properties, PropertyValue};

use geometry::CoordReader;

/// Compteurs de normalisation d'une collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeStats {
    /// Nombre d'entrées lues
    pub total: usize,
    /// Nombre de features conservées
    pub kept: usize,
    /// Entrées mal formées écartées
    pub malformed: usize,
    /// Entrées sans géométrie écartées
    pub missing_geometry: usize,
}

impl NormalizeStats {
    pub fn dropped(&self) -> usize {
        self.malformed + self.missing_geometry
    }

    fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::MalformedFeature => self.malformed += 1,
            DropReason::MissingGeometry => self.missing_geometry += 1,
        }
    }

    /// Cumule les compteurs de deux collections
    pub fn merge(self, other: NormalizeStats) -> NormalizeStats {
        NormalizeStats {
            total: self.total + other.total,
            kept: self.kept + other.kept,
            malformed: self.malformed + other.malformed,
            missing_geometry: self.missing_geometry + other.missing_geometry,
        }
    }
}

/// Résultat de la normalisation d'une collection
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub features: Vec<Feature>,
    pub stats: NormalizeStats,
}

/// Normalise une FeatureCollection brute
///
/// Accepte un objet `FeatureCollection`, un tableau nu de features, ou `null`
/// (couche non demandée, traitée comme vide).
///
/// # Errors
///
/// `NormalizeError::NotACollection` si la valeur n'a pas la forme d'une collection.
pub fn normalize_collection(
    raw: &Value,
    layer: &str,
    config: &EngineConfig,
) -> Result<Normalized, NormalizeError> {
    let entries = match raw {
        Value::Null => return Ok(Normalized::default()),
        Value::Array(entries) => entries.as_slice(),
        Value::Object(object) => {
            let entries = match object.get("features") {
                Some(Value::Array(entries)) => entries.as_slice(),
                Some(_) => {
                    return Err(NormalizeError::NotACollection(
                        "`features` is not an array".into(),
                    ))
                }
                None => {
                    return Err(NormalizeError::NotACollection(
                        "missing `features` member".into(),
                    ))
                }
            };
            entries
        }
        other => {
            return Err(NormalizeError::NotACollection(format!(
                "expected an object, got {}",
                json_kind(other)
            )))
        }
    };

    let axis = resolve_axis_order(config.axis_order, entries, config.units);
    let reader = CoordReader {
        swap: axis == AxisOrder::LatLon,
        units: config.units,
    };

    let mut out = Normalized {
        features: Vec::with_capacity(entries.len()),
        stats: NormalizeStats {
            total: entries.len(),
            ..Default::default()
        },
    };

    for entry in entries {
        match normalize_feature(entry, layer, &reader, config) {
            Ok(feature) => out.features.push(feature),
            Err(reason) => out.stats.record_drop(reason),
        }
    }
    out.stats.kept = out.features.len();

    Ok(out)
}

/// Normalise une feature unique
fn normalize_feature(
    entry: &Value,
    layer: &str,
    reader: &CoordReader,
    config: &EngineConfig,
) -> Result<Feature, DropReason> {
    let Value::Object(object) = entry else {
        return Err(DropReason::MalformedFeature);
    };

    let geometry = match object.get("geometry") {
        None | Some(Value::Null) => return Err(DropReason::MissingGeometry),
        Some(value) => reader.parse(value)?,
    };

    let properties: Properties = match object.get("properties") {
        None | Some(Value::Null) => Properties::new(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| (k.clone(), PropertyValue::from_json(v)))
            .collect(),
        Some(_) => return Err(DropReason::MalformedFeature),
    };

    let id = object
        .get("id")
        .map(PropertyValue::from_json)
        .and_then(|v| v.to_id_string())
        .or_else(|| {
            config
                .id_keys
                .iter()
                .find_map(|key| properties.get(key).and_then(PropertyValue::to_id_string))
        });

    let feature = Feature {
        id,
        geometry,
        properties,
        layer: layer.to_string(),
    };

    // Une géométrie sans point représentatif est inexploitable
    if feature.representative_point().is_none() {
        return Err(DropReason::MalformedFeature);
    }

    Ok(feature)
}

/// Résout l'ordre des axes d'une collection
///
/// Le membre `crs` n'est pas consulté : l'URN EPSG::4326 accompagne aussi des
/// positions longitude, latitude. En mode `Auto`, seules les valeurs en
/// degrés peuvent imposer l'inversion.
fn resolve_axis_order(configured: AxisOrder, entries: &[Value], units: CoordUnits) -> AxisOrder {
    if configured != AxisOrder::Auto {
        return configured;
    }
    if units != CoordUnits::Degrees {
        return AxisOrder::LonLat;
    }
    entries
        .iter()
        .filter_map(|entry| entry.pointer("/geometry/coordinates"))
        .find_map(axis_evidence)
        .unwrap_or(AxisOrder::LonLat)
}

/// Première position dont les valeurs tranchent l'ordre des axes
fn axis_evidence(coordinates: &Value) -> Option<AxisOrder> {
    let Value::Array(items) = coordinates else {
        return None;
    };
    let first = items.first().and_then(Value::as_f64);
    let second = items.get(1).and_then(Value::as_f64);
    match (first, second) {
        (Some(a), Some(b)) => {
            let (a, b) = (a.abs(), b.abs());
            if a <= 90.0 && b > 90.0 && b <= 180.0 {
                Some(AxisOrder::LatLon)
            } else if a > 90.0 && a <= 180.0 && b <= 90.0 {
                Some(AxisOrder::LonLat)
            } else {
                None
            }
        }
        _ => items.iter().find_map(axis_evidence),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Geometry, Point};
    use serde_json::json;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn test_empty_collection() {
        let raw = json!({"type": "FeatureCollection", "features": []});
        let out = normalize_collection(&raw, "rpg", &config()).unwrap();
        assert!(out.features.is_empty());
        assert_eq!(out.stats, NormalizeStats::default());
    }

    #[test]
    fn test_null_is_empty() {
        let out = normalize_collection(&Value::Null, "rpg", &config()).unwrap();
        assert!(out.features.is_empty());
    }

    #[test]
    fn test_not_a_collection() {
        assert!(normalize_collection(&json!("oops"), "rpg", &config()).is_err());
        assert!(normalize_collection(&json!({"type": "FeatureCollection"}), "rpg", &config()).is_err());
        assert!(normalize_collection(&json!({"features": 3}), "rpg", &config()).is_err());
    }

    #[test]
    fn test_fail_open_per_record() {
        let raw = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "id": "A", "geometry": {"type": "Point", "coordinates": [5.0, 45.0]}},
                {"type": "Feature", "geometry": null, "properties": {}},
                {"type": "Feature", "properties": {"a": 1}},
                {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}},
                {"type": "Feature", "geometry": {"type": "Point"}},
                42
            ]
        });
        let out = normalize_collection(&raw, "rpg", &config()).unwrap();
        assert_eq!(out.features.len(), 1);
        assert_eq!(out.stats.total, 6);
        assert_eq!(out.stats.kept, 1);
        assert_eq!(out.stats.missing_geometry, 2);
        assert_eq!(out.stats.malformed, 3);
        assert_eq!(out.stats.dropped(), 5);
    }

    #[test]
    fn test_missing_properties_become_empty() {
        let raw = json!([{"type": "Feature", "geometry": {"type": "Point", "coordinates": [5.0, 45.0]}}]);
        let out = normalize_collection(&raw, "postes", &config()).unwrap();
        assert!(out.features[0].properties.is_empty());
        assert_eq!(out.features[0].id, None);
        assert_eq!(out.features[0].layer, "postes");
    }

    #[test]
    fn test_id_from_properties() {
        let raw = json!([
            {"geometry": {"type": "Point", "coordinates": [5.0, 45.0]}, "properties": {"ID_PARCEL": "AB-123"}},
            {"id": 42, "geometry": {"type": "Point", "coordinates": [5.0, 45.0]}, "properties": {"ID_PARCEL": "X"}},
            {"id": "", "geometry": {"type": "Point", "coordinates": [5.0, 45.0]}}
        ]);
        let out = normalize_collection(&raw, "rpg", &config()).unwrap();
        assert_eq!(out.features[0].id.as_deref(), Some("AB-123"));
        assert_eq!(out.features[1].id.as_deref(), Some("42"));
        assert_eq!(out.features[2].id, None);
    }

    fn urn_tagged(coordinates: Value) -> Value {
        json!({
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::4326"}},
            "features": [{"geometry": {"type": "Point", "coordinates": coordinates}}]
        })
    }

    #[test]
    fn test_urn_4326_keeps_lon_lat() {
        let raw = urn_tagged(json!([5.7, 45.2]));
        for axis_order in [AxisOrder::LonLat, AxisOrder::Auto] {
            let config = EngineConfig {
                axis_order,
                ..config()
            };
            let out = normalize_collection(&raw, "postes", &config).unwrap();
            assert_eq!(out.features[0].geometry, Geometry::Point(Point::new(5.7, 45.2)));
        }
    }

    #[test]
    fn test_lat_lon_is_explicit() {
        let config = EngineConfig {
            axis_order: AxisOrder::LatLon,
            ..config()
        };
        let out = normalize_collection(&urn_tagged(json!([45.2, 5.7])), "postes", &config).unwrap();
        assert_eq!(out.features[0].geometry, Geometry::Point(Point::new(5.7, 45.2)));
    }

    #[test]
    fn test_auto_swaps_only_on_value_evidence() {
        let config = EngineConfig {
            axis_order: AxisOrder::Auto,
            ..config()
        };
        // Seconde valeur hors de ±90 : latitude en premier
        let raw = json!([
            {"geometry": {"type": "Point", "coordinates": [45.2, 5.7]}},
            {"geometry": {"type": "Polygon", "coordinates": [[[13.4, 144.7], [13.5, 144.7], [13.5, 144.8], [13.4, 144.7]]]}}
        ]);
        let out = normalize_collection(&raw, "postes", &config).unwrap();
        assert_eq!(out.features[0].geometry, Geometry::Point(Point::new(5.7, 45.2)));

        // Aucune position décisive : ordre GeoJSON conservé
        let raw = json!([{"geometry": {"type": "Point", "coordinates": [45.2, 5.7]}}]);
        let out = normalize_collection(&raw, "postes", &config).unwrap();
        assert_eq!(out.features[0].geometry, Geometry::Point(Point::new(45.2, 5.7)));
    }

    /// Compte les événements tracing émis sur le thread courant
    struct EventCounter(std::sync::Arc<std::sync::atomic::AtomicUsize>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventCounter {
        fn on_event(
            &self,
            _event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[test]
    fn test_drops_are_counted_not_logged() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        use tracing_subscriber::layer::SubscriberExt;

        let events = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(EventCounter(events.clone()));
        let raw = json!([
            {"geometry": null},
            {"geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}},
            {"geometry": {"type": "Point", "coordinates": [5.0, 45.0]}}
        ]);

        let out = tracing::subscriber::with_default(subscriber, || {
            let out = normalize_collection(&raw, "rpg", &config()).unwrap();
            assert_eq!(events.load(Ordering::SeqCst), 0);
            // Le compteur voit bien les événements de ce thread
            tracing::warn!("sentinel");
            out
        });

        assert_eq!(out.stats.dropped(), 2);
        assert_eq!(events.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stats_merge() {
        let a = NormalizeStats { total: 3, kept: 2, malformed: 1, missing_geometry: 0 };
        let b = NormalizeStats { total: 2, kept: 1, malformed: 0, missing_geometry: 1 };
        let m = a.merge(b);
        assert_eq!(m.total, 5);
        assert_eq!(m.dropped(), 2);
    }
}
