//! Classement des candidats
//!
//! Ordre total et déterministe : surface décroissante, puis distance BT
//! croissante (distances nulles en dernier), puis identifiant (les candidats
//! identifiés avant les autres), puis clé d'identité.

use std::cmp::Ordering;

use crate::config::CoordUnits;
use crate::dedup::DedupKeyRef;
use crate::types::CandidateRecord;

/// Compare deux candidats selon l'ordre de classement
pub fn compare(a: &CandidateRecord, b: &CandidateRecord, units: CoordUnits) -> Ordering {
    b.surface
        .total_cmp(&a.surface)
        .then_with(|| nulls_last(a.distance_bt, b.distance_bt))
        .then_with(|| match (&a.feature.id, &b.feature.id) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| identity(a, units).cmp(&identity(b, units)))
}

fn identity(record: &CandidateRecord, units: CoordUnits) -> DedupKeyRef<'_> {
    DedupKeyRef::of(&record.feature, &record.commune, record.anchor, units)
}

fn nulls_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Trie une liste en place (tri stable)
pub fn rank(records: &mut [CandidateRecord], units: CoordUnits) {
    records.sort_by(|a, b| compare(a, b, units));
}

/// Retourne les `n` meilleurs candidats, sans modifier la liste d'origine
pub fn top_n(records: &[CandidateRecord], n: usize, units: CoordUnits) -> Vec<CandidateRecord> {
    let mut ranked = records.to_vec();
    rank(&mut ranked, units);
    ranked.truncate(n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, Feature, Properties};
    use geo::{Coord, Geometry, Point};

    fn record(id: Option<&str>, surface: f64, bt: Option<f64>, x: f64) -> CandidateRecord {
        CandidateRecord {
            feature: Feature {
                id: id.map(str::to_string),
                geometry: Geometry::Point(Point::new(x, 45.0)),
                properties: Properties::new(),
                layer: "rpg".into(),
            },
            category: Category::Parcelle,
            surface,
            distance_bt: bt,
            distance_hta: None,
            commune: "38185".into(),
            dept: "38".into(),
            anchor: Coord { x, y: 45.0 },
            folded: 0,
        }
    }

    fn ids(records: &[CandidateRecord]) -> Vec<String> {
        records
            .iter()
            .map(|r| r.feature.id.clone().unwrap_or_else(|| "-".into()))
            .collect()
    }

    #[test]
    fn test_surface_descending() {
        let mut records = vec![
            record(Some("small"), 100.0, None, 5.0),
            record(Some("big"), 900.0, None, 5.0),
            record(Some("mid"), 500.0, None, 5.0),
        ];
        rank(&mut records, CoordUnits::Degrees);
        assert_eq!(ids(&records), vec!["big", "mid", "small"]);
    }

    #[test]
    fn test_distance_then_id_tie_breaks() {
        let mut records = vec![
            record(Some("Z"), 100.0, None, 5.0),
            record(Some("Y"), 100.0, Some(50.0), 5.0),
            record(Some("B"), 100.0, Some(10.0), 5.0),
            record(Some("A"), 100.0, Some(10.0), 5.0),
            record(None, 100.0, Some(10.0), 5.0),
        ];
        rank(&mut records, CoordUnits::Degrees);
        assert_eq!(ids(&records), vec!["A", "B", "-", "Y", "Z"]);
    }

    #[test]
    fn test_id_less_ordered_by_position() {
        let mut records = vec![
            record(None, 100.0, None, 5.2),
            record(None, 100.0, None, 5.1),
        ];
        rank(&mut records, CoordUnits::Degrees);
        assert_eq!(records[0].anchor.x, 5.1);
    }

    #[test]
    fn test_top_n_truncates_and_is_deterministic() {
        let records: Vec<_> = (0..80)
            .map(|i| record(Some(&format!("P{:02}", i)), (i % 7) as f64, Some(i as f64), 5.0))
            .collect();
        let first = top_n(&records, 50, CoordUnits::Degrees);
        let mut reversed = records.clone();
        reversed.reverse();
        let second = top_n(&reversed, 50, CoordUnits::Degrees);

        assert_eq!(first.len(), 50);
        assert_eq!(first, second);
        assert_eq!(records.len(), 80);
    }
}
