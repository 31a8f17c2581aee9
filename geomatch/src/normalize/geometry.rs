//! Conversion GeoJSON → geo avec validation des coordonnées

use geo::{Coord, Geometry, LineString, MultiPolygon, Point, Polygon};

use crate::config::CoordUnits;
use crate::error::DropReason;

/// Contexte de lecture des coordonnées d'une collection
#[derive(Debug, Clone, Copy)]
pub(crate) struct CoordReader {
    /// Inverser les axes (source en lat/lon)
    pub swap: bool,
    pub units: CoordUnits,
}

impl CoordReader {
    /// Parse une géométrie GeoJSON brute
    ///
    /// Seuls Point, Polygon et MultiPolygon sont acceptés.
    pub fn parse(&self, value: &serde_json::Value) -> Result<Geometry, DropReason> {
        let geometry = geojson::Geometry::from_json_value(value.clone())
            .map_err(|_| DropReason::MalformedFeature)?;

        match geometry.value {
            geojson::Value::Point(ref pos) => Ok(Geometry::Point(Point(self.coord(pos)?))),
            geojson::Value::Polygon(ref rings) => Ok(Geometry::Polygon(self.polygon(rings)?)),
            geojson::Value::MultiPolygon(ref polygons) => {
                if polygons.is_empty() {
                    return Err(DropReason::MalformedFeature);
                }
                let polygons = polygons
                    .iter()
                    .map(|rings| self.polygon(rings))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Geometry::MultiPolygon(MultiPolygon::new(polygons)))
            }
            _ => Err(DropReason::MalformedFeature),
        }
    }

    fn coord(&self, pos: &[f64]) -> Result<Coord, DropReason> {
        if pos.len() < 2 {
            return Err(DropReason::MalformedFeature);
        }
        let (x, y) = if self.swap {
            (pos[1], pos[0])
        } else {
            (pos[0], pos[1])
        };
        if !x.is_finite() || !y.is_finite() {
            return Err(DropReason::MalformedFeature);
        }
        // Garde-fou contre des coordonnées projetées ou inversées annoncées en degrés
        if self.units == CoordUnits::Degrees && (x.abs() > 180.0 || y.abs() > 90.0) {
            return Err(DropReason::MalformedFeature);
        }
        Ok(Coord { x, y })
    }

    fn ring(&self, positions: &[Vec<f64>]) -> Result<LineString, DropReason> {
        let coords = positions
            .iter()
            .map(|p| self.coord(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LineString::new(coords))
    }

    fn polygon(&self, rings: &[Vec<Vec<f64>>]) -> Result<Polygon, DropReason> {
        let Some((exterior, interiors)) = rings.split_first() else {
            return Err(DropReason::MalformedFeature);
        };
        let exterior = self.ring(exterior)?;
        if exterior.0.len() < 3 {
            return Err(DropReason::MalformedFeature);
        }
        let mut holes = Vec::with_capacity(interiors.len());
        for ring in interiors {
            let ring = self.ring(ring)?;
            // Trou dégénéré : ignoré, l'extérieur reste exploitable
            if ring.0.len() >= 3 {
                holes.push(ring);
            }
        }
        Ok(Polygon::new(exterior, holes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const LONLAT: CoordReader = CoordReader {
        swap: false,
        units: CoordUnits::Degrees,
    };

    #[test]
    fn test_parse_point() {
        let geom = LONLAT
            .parse(&json!({"type": "Point", "coordinates": [5.7, 45.2]}))
            .unwrap();
        assert_eq!(geom, Geometry::Point(Point::new(5.7, 45.2)));
    }

    #[test]
    fn test_swap_axes() {
        let reader = CoordReader {
            swap: true,
            ..LONLAT
        };
        let geom = reader
            .parse(&json!({"type": "Point", "coordinates": [45.2, 5.7]}))
            .unwrap();
        assert_eq!(geom, Geometry::Point(Point::new(5.7, 45.2)));
    }

    #[test]
    fn test_reject_linestring() {
        let err = LONLAT
            .parse(&json!({"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]}))
            .unwrap_err();
        assert_eq!(err, DropReason::MalformedFeature);
    }

    #[test]
    fn test_reject_missing_coordinates() {
        assert!(LONLAT.parse(&json!({"type": "Point"})).is_err());
        assert!(LONLAT
            .parse(&json!({"type": "Point", "coordinates": [1.0]}))
            .is_err());
    }

    #[test]
    fn test_reject_out_of_range_degrees() {
        assert!(LONLAT
            .parse(&json!({"type": "Point", "coordinates": [652381.0, 6862047.0]}))
            .is_err());

        let metric = CoordReader {
            swap: false,
            units: CoordUnits::Meters,
        };
        assert!(metric
            .parse(&json!({"type": "Point", "coordinates": [652381.0, 6862047.0]}))
            .is_ok());
    }

    #[test]
    fn test_polygon_drops_degenerate_hole() {
        let geom = LONLAT
            .parse(&json!({
                "type": "Polygon",
                "coordinates": [
                    [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]],
                    [[0.5, 0.5]]
                ]
            }))
            .unwrap();
        match geom {
            Geometry::Polygon(p) => assert!(p.interiors().is_empty()),
            other => panic!("unexpected geometry {:?}", other),
        }
    }
}
