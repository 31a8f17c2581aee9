//! Index des postes pour la recherche du plus proche voisin
//!
//! Au-delà de [`EXHAUSTIVE_SCAN_LIMIT`] points, un `RTree` évite le parcours
//! O(N×M). En dessous, un parcours exhaustif est utilisé : plus rapide sur
//! de petits ensembles, et résultat strictement identique.

use geo::Coord;
use rstar::primitives::GeomWithData;
use rstar::RTree;

use super::distance::LocalMetric;
use crate::config::CoordUnits;
use crate::types::InfrastructurePoint;

/// Taille maximale d'un ensemble parcouru exhaustivement
pub const EXHAUSTIVE_SCAN_LIMIT: usize = 32;

/// Marge relative sur le critère d'arrêt, pour ne perdre aucun ex aequo
const STOP_SLACK: f64 = 1e-9;

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Résultat d'une recherche de plus proche poste
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nearest<'a> {
    pub point: &'a InfrastructurePoint,
    /// Distance en mètres
    pub distance: f64,
}

/// Stratégie de recherche
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    Exhaustive,
    Indexed,
}

/// Ensemble de postes d'une même classe
pub struct InfrastructureIndex {
    points: Vec<InfrastructurePoint>,
    tree: Option<RTree<IndexedPoint>>,
    units: CoordUnits,
}

impl InfrastructureIndex {
    /// Construit l'index, avec la stratégie adaptée à la taille
    pub fn build(points: Vec<InfrastructurePoint>, units: CoordUnits) -> Self {
        let strategy = if points.len() > EXHAUSTIVE_SCAN_LIMIT {
            SearchStrategy::Indexed
        } else {
            SearchStrategy::Exhaustive
        };
        Self::with_strategy(points, units, strategy)
    }

    /// Construit l'index avec une stratégie imposée
    pub fn with_strategy(
        points: Vec<InfrastructurePoint>,
        units: CoordUnits,
        strategy: SearchStrategy,
    ) -> Self {
        let tree = match strategy {
            SearchStrategy::Exhaustive => None,
            SearchStrategy::Indexed => Some(RTree::bulk_load(
                points
                    .iter()
                    .enumerate()
                    .map(|(i, p)| GeomWithData::new([p.coord.x, p.coord.y], i))
                    .collect(),
            )),
        };
        Self {
            points,
            tree,
            units,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn strategy(&self) -> SearchStrategy {
        if self.tree.is_some() {
            SearchStrategy::Indexed
        } else {
            SearchStrategy::Exhaustive
        }
    }

    /// Poste le plus proche de `query`, `None` si l'ensemble est vide
    ///
    /// Les ex aequo sont départagés par le plus petit identifiant.
    pub fn nearest(&self, query: Coord) -> Option<Nearest<'_>> {
        let metric = LocalMetric::at(self.units, query);
        let best = match &self.tree {
            Some(tree) => self.nearest_indexed(tree, query, &metric),
            None => self.nearest_exhaustive(query, &metric),
        }?;
        Some(Nearest {
            point: &self.points[best.index],
            distance: metric.to_meters(best.distance_2),
        })
    }

    fn nearest_exhaustive(&self, query: Coord, metric: &LocalMetric) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        for (index, point) in self.points.iter().enumerate() {
            let candidate = Candidate {
                index,
                distance_2: metric.distance_2(query, point.coord),
            };
            best = Some(self.better(best, candidate));
        }
        best
    }

    fn nearest_indexed(
        &self,
        tree: &RTree<IndexedPoint>,
        query: Coord,
        metric: &LocalMetric,
    ) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        // Parcours par distance brute croissante : on s'arrête dès que le
        // minorant de la distance pondérée dépasse le meilleur trouvé.
        for (item, raw_distance_2) in tree.nearest_neighbor_iter_with_distance_2(&[query.x, query.y]) {
            if let Some(b) = best {
                if metric.lower_bound(raw_distance_2) > b.distance_2 * (1.0 + STOP_SLACK) {
                    break;
                }
            }
            let index = item.data;
            let candidate = Candidate {
                index,
                distance_2: metric.distance_2(query, self.points[index].coord),
            };
            best = Some(self.better(best, candidate));
        }
        best
    }

    fn better(&self, current: Option<Candidate>, candidate: Candidate) -> Candidate {
        match current {
            None => candidate,
            Some(cur) => {
                let closer = candidate.distance_2 < cur.distance_2;
                let tie_lower_id = candidate.distance_2 == cur.distance_2
                    && self.points[candidate.index].id < self.points[cur.index].id;
                if closer || tie_lower_id {
                    candidate
                } else {
                    cur
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    index: usize,
    distance_2: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InfraClass;

    fn point(id: &str, x: f64, y: f64) -> InfrastructurePoint {
        InfrastructurePoint {
            id: id.to_string(),
            coord: Coord { x, y },
            class: InfraClass::Bt,
        }
    }

    fn grid(n: usize) -> Vec<InfrastructurePoint> {
        let mut points = Vec::new();
        for i in 0..n {
            for j in 0..n {
                points.push(point(
                    &format!("P{:03}-{:03}", i, j),
                    5.0 + i as f64 * 0.013,
                    45.0 + j as f64 * 0.007,
                ));
            }
        }
        points
    }

    #[test]
    fn test_empty_index() {
        let index = InfrastructureIndex::build(Vec::new(), CoordUnits::Degrees);
        assert!(index.is_empty());
        assert!(index.nearest(Coord { x: 5.0, y: 45.0 }).is_none());
    }

    #[test]
    fn test_strategy_by_size() {
        let small = InfrastructureIndex::build(grid(3), CoordUnits::Degrees);
        assert_eq!(small.strategy(), SearchStrategy::Exhaustive);
        let large = InfrastructureIndex::build(grid(10), CoordUnits::Degrees);
        assert_eq!(large.strategy(), SearchStrategy::Indexed);
    }

    #[test]
    fn test_tie_broken_by_lowest_id() {
        let points = vec![
            point("B", 1.0, 0.0),
            point("A", -1.0, 0.0),
            point("C", 0.0, 1.0),
        ];
        for strategy in [SearchStrategy::Exhaustive, SearchStrategy::Indexed] {
            let index = InfrastructureIndex::with_strategy(points.clone(), CoordUnits::Meters, strategy);
            let nearest = index.nearest(Coord { x: 0.0, y: 0.0 }).unwrap();
            assert_eq!(nearest.point.id, "A");
            assert_eq!(nearest.distance, 1.0);
        }
    }

    #[test]
    fn test_indexed_matches_exhaustive() {
        let points = grid(12);
        let exhaustive =
            InfrastructureIndex::with_strategy(points.clone(), CoordUnits::Degrees, SearchStrategy::Exhaustive);
        let indexed = InfrastructureIndex::with_strategy(points, CoordUnits::Degrees, SearchStrategy::Indexed);

        for k in 0..50 {
            let query = Coord {
                x: 4.95 + k as f64 * 0.0047,
                y: 44.98 + (k % 7) as f64 * 0.0131,
            };
            let a = exhaustive.nearest(query).unwrap();
            let b = indexed.nearest(query).unwrap();
            assert_eq!(a.point.id, b.point.id, "query {:?}", query);
            assert_eq!(a.distance, b.distance);
        }
    }

    #[test]
    fn test_high_latitude_prefers_longitude_neighbour() {
        // À 60°N, 0.01° de longitude ≈ 555 m contre 0.006° de latitude ≈ 666 m
        let points = vec![point("LAT", 5.0, 60.006), point("LON", 5.01, 60.0)];
        let index = InfrastructureIndex::build(points, CoordUnits::Degrees);
        let nearest = index.nearest(Coord { x: 5.0, y: 60.0 }).unwrap();
        assert_eq!(nearest.point.id, "LON");
    }
}
