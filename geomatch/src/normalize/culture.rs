//! Décodage des codes culture RPG (`CODE_CULTU`)

use crate::types::{Feature, PropertyValue};

/// Attribut source du code culture
pub const CODE_KEY: &str = "CODE_CULTU";

/// Attribut ajouté avec le libellé décodé
pub const LABEL_KEY: &str = "Culture";

const CULTURES: &[(&str, &str)] = &[
    ("AVH", "Avoine d'hiver"),
    ("AVP", "Avoine de printemps"),
    ("BDH", "Blé dur d'hiver"),
    ("BDP", "Blé dur de printemps"),
    ("BTH", "Blé tendre d'hiver"),
    ("BTP", "Blé tendre de printemps"),
    ("CZH", "Colza d'hiver"),
    ("CZP", "Colza de printemps"),
    ("EPE", "Épeautre"),
    ("JAC", "Jachère"),
    ("LUZ", "Luzerne"),
    ("MCR", "Mélange de céréales"),
    ("MID", "Maïs doux"),
    ("MIE", "Maïs ensilage"),
    ("MIS", "Maïs"),
    ("MLT", "Millet"),
    ("ORH", "Orge d'hiver"),
    ("ORP", "Orge de printemps"),
    ("PPH", "Prairie permanente"),
    ("PTR", "Prairie temporaire"),
    ("SGH", "Seigle d'hiver"),
    ("SGP", "Seigle de printemps"),
    ("SOG", "Sorgho"),
    ("SOJ", "Soja"),
    ("SRS", "Sarrasin"),
    ("TRN", "Tournesol"),
    ("TTH", "Triticale d'hiver"),
    ("TTP", "Triticale de printemps"),
    ("VRC", "Vigne"),
];

/// Libellé d'un code culture, le code lui-même s'il est inconnu
pub fn label(code: &str) -> &str {
    let code = code.trim();
    CULTURES
        .binary_search_by(|(c, _)| c.cmp(&code))
        .map(|i| CULTURES[i].1)
        .unwrap_or(code)
}

/// Retourne une copie de la feature enrichie du libellé `Culture`
///
/// Sans attribut `CODE_CULTU`, la feature est rendue telle quelle.
pub fn decorate(feature: Feature) -> Feature {
    let Some(code) = feature
        .property(CODE_KEY)
        .and_then(PropertyValue::as_str)
        .map(str::to_string)
    else {
        return feature;
    };
    let mut properties = feature.properties;
    properties.insert(
        LABEL_KEY.to_string(),
        PropertyValue::Text(label(&code).to_string()),
    );
    Feature {
        properties,
        ..feature
    }
}
