//! Distance planaire approchée
//!
//! En degrés, l'écart de longitude est pondéré par le cosinus de la latitude
//! du candidat (équirectangulaire local). La précision géodésique n'est pas
//! recherchée, seulement un ordre de classement stable.

use geo::Coord;

use crate::config::CoordUnits;

/// Mètres par degré de latitude
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// Métrique locale autour d'un point de requête
#[derive(Debug, Clone, Copy)]
pub struct LocalMetric {
    /// Pondération de l'axe x (cos φ en degrés, 1 en mètres)
    kx: f64,
    /// Conversion unité source → mètres
    scale: f64,
}

impl LocalMetric {
    pub fn at(units: CoordUnits, query: Coord) -> Self {
        match units {
            CoordUnits::Degrees => Self {
                kx: query.y.to_radians().cos().abs(),
                scale: METERS_PER_DEGREE,
            },
            CoordUnits::Meters => Self { kx: 1.0, scale: 1.0 },
        }
    }

    /// Distance pondérée au carré, en unités source
    pub fn distance_2(&self, a: Coord, b: Coord) -> f64 {
        let dx = (a.x - b.x) * self.kx;
        let dy = a.y - b.y;
        dx * dx + dy * dy
    }

    /// Minorant de `distance_2` à partir de la distance brute au carré
    ///
    /// `kx ≤ 1` donc `kx²·(Δx² + Δy²) ≤ kx²·Δx² + Δy²`.
    pub fn lower_bound(&self, raw_distance_2: f64) -> f64 {
        self.kx * self.kx * raw_distance_2
    }

    pub fn to_meters(&self, distance_2: f64) -> f64 {
        distance_2.sqrt() * self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_units() {
        let m = LocalMetric::at(CoordUnits::Meters, Coord { x: 0.0, y: 0.0 });
        let d2 = m.distance_2(Coord { x: 0.0, y: 0.0 }, Coord { x: 3.0, y: 4.0 });
        assert_eq!(m.to_meters(d2), 5.0);
    }

    #[test]
    fn test_degrees_latitude_step() {
        let q = Coord { x: 5.0, y: 45.0 };
        let m = LocalMetric::at(CoordUnits::Degrees, q);
        let d = m.to_meters(m.distance_2(q, Coord { x: 5.0, y: 45.01 }));
        assert!((d - 1110.0).abs() < 0.01, "d={}", d);
    }

    #[test]
    fn test_degrees_longitude_scaled_by_cosine() {
        let q = Coord { x: 5.0, y: 60.0 };
        let m = LocalMetric::at(CoordUnits::Degrees, q);
        let d = m.to_meters(m.distance_2(q, Coord { x: 5.01, y: 60.0 }));
        // cos(60°) = 0.5
        assert!((d - 555.0).abs() < 0.01, "d={}", d);
    }

    #[test]
    fn test_lower_bound_holds() {
        let q = Coord { x: 2.35, y: 48.85 };
        let m = LocalMetric::at(CoordUnits::Degrees, q);
        let p = Coord { x: 2.40, y: 48.80 };
        let raw = (q.x - p.x).powi(2) + (q.y - p.y).powi(2);
        assert!(m.lower_bound(raw) <= m.distance_2(q, p));
    }
}
