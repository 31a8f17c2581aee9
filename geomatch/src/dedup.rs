//! Dédoublonnage des observations redondantes
//!
//! Un même objet peut remonter plusieurs fois lorsque des requêtes spatiales
//! se recouvrent (rayon et polygone exact, communes voisines). La clé
//! d'identité est `(couche, id externe)` ou, sans id, `(couche, commune,
//! centroïde arrondi)`.

use std::collections::HashMap;
use std::fmt;

use geo::Coord;
use serde::Serialize;

use crate::config::CoordUnits;
use crate::types::{CandidateRecord, Establishment, Feature};

/// Clé d'identité d'un objet réel
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DedupKey {
    External {
        layer: String,
        id: String,
    },
    Position {
        layer: String,
        commune: String,
        x: i64,
        y: i64,
    },
}

impl DedupKey {
    /// Calcule la clé d'une feature
    pub fn of(feature: &Feature, commune: &str, anchor: Coord, units: CoordUnits) -> Self {
        DedupKeyRef::of(feature, commune, anchor, units).into_owned()
    }
}

/// Clé d'identité empruntée, ordonnée comme `DedupKey`
///
/// Sert aux comparaisons répétées du classement, sans allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum DedupKeyRef<'a> {
    External {
        layer: &'a str,
        id: &'a str,
    },
    Position {
        layer: &'a str,
        commune: &'a str,
        x: i64,
        y: i64,
    },
}

impl<'a> DedupKeyRef<'a> {
    pub(crate) fn of(
        feature: &'a Feature,
        commune: &'a str,
        anchor: Coord,
        units: CoordUnits,
    ) -> Self {
        match feature.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => Self::External {
                layer: &feature.layer,
                id,
            },
            None => {
                let scale = units.dedup_scale();
                Self::Position {
                    layer: &feature.layer,
                    commune,
                    x: (anchor.x * scale).round() as i64,
                    y: (anchor.y * scale).round() as i64,
                }
            }
        }
    }

    fn into_owned(self) -> DedupKey {
        match self {
            Self::External { layer, id } => DedupKey::External {
                layer: layer.to_string(),
                id: id.to_string(),
            },
            Self::Position {
                layer,
                commune,
                x,
                y,
            } => DedupKey::Position {
                layer: layer.to_string(),
                commune: commune.to_string(),
                x,
                y,
            },
        }
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::External { layer, id } => write!(f, "{}:{}", layer, id),
            Self::Position {
                layer,
                commune,
                x,
                y,
            } => write!(f, "{}:{}@{},{}", layer, commune, x, y),
        }
    }
}

/// Observation fusionnable
pub trait Deduplicate: Sized {
    fn identity_key(&self, units: CoordUnits) -> DedupKey;

    /// Fusionne deux observations du même objet, `self` étant la première vue
    fn merge(self, later: Self) -> Self;
}

/// Fusionne les observations partageant une clé
///
/// L'ordre de première apparition est conservé. Idempotent : un second
/// passage ne trouve plus aucun doublon.
pub fn deduplicate<T: Deduplicate>(records: Vec<T>, units: CoordUnits) -> Vec<T> {
    let mut slots: Vec<Option<T>> = Vec::with_capacity(records.len());
    let mut positions: HashMap<DedupKey, usize> = HashMap::with_capacity(records.len());

    for record in records {
        let key = record.identity_key(units);
        match positions.get(&key) {
            Some(&pos) => {
                let merged = match slots[pos].take() {
                    Some(first) => first.merge(record),
                    None => record,
                };
                slots[pos] = Some(merged);
            }
            None => {
                positions.insert(key, slots.len());
                slots.push(Some(record));
            }
        }
    }

    slots.into_iter().flatten().collect()
}

/// Minimum de deux distances optionnelles, une valeur nulle étant ignorée
fn min_distance(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

impl Deduplicate for CandidateRecord {
    fn identity_key(&self, units: CoordUnits) -> DedupKey {
        DedupKey::of(&self.feature, &self.commune, self.anchor, units)
    }

    /// Garde l'observation la plus renseignée (la première en cas d'égalité)
    /// et le minimum de chaque distance, classe par classe.
    ///
    /// Le minimum est pris même quand les deux observations n'ont pas le même
    /// nombre d'attributs renseignés, et pas seulement à égalité : la fusion
    /// reste ainsi associative.
    fn merge(self, later: Self) -> Self {
        let distance_bt = min_distance(self.distance_bt, later.distance_bt);
        let distance_hta = min_distance(self.distance_hta, later.distance_hta);
        let folded = self.folded + later.folded + 1;

        let base = if later.feature.non_null_properties() > self.feature.non_null_properties() {
            later
        } else {
            self
        };

        CandidateRecord {
            distance_bt,
            distance_hta,
            folded,
            ..base
        }
    }
}

impl Deduplicate for Establishment {
    fn identity_key(&self, units: CoordUnits) -> DedupKey {
        DedupKey::of(&self.feature, &self.commune, self.anchor, units)
    }

    fn merge(self, later: Self) -> Self {
        let folded = self.folded + later.folded + 1;
        let base = if later.feature.non_null_properties() > self.feature.non_null_properties() {
            later
        } else {
            self
        };
        Establishment { folded, ..base }
    }
}
