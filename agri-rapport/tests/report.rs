//! Tests de bout en bout : fichiers communaux → document JSON

use std::path::PathBuf;

use agri_rapport::input::{collect_inputs, read_envelopes};
use agri_rapport::ReportConfig;
use geomatch::{run_department, ReportDocument, ReportStatus, RunOptions};
use serde_json::json;

fn fixture_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("agri-rapport-dept-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();

    let commune = |code: &str, lon: f64| {
        json!({
            "code": code,
            "nom": format!("Commune {}", code),
            "dept": "38",
            "layers": [
                {
                    "layer": "gpu:rpg_parcelles",
                    "kind": "parcelle",
                    "collection": {
                        "type": "FeatureCollection",
                        "features": [
                            {
                                "type": "Feature",
                                "geometry": {"type": "Point", "coordinates": [lon, 45.2]},
                                "properties": {"ID_PARCEL": format!("{}-1", code), "SURF_PARC": 3.2, "CODE_CULTU": "MIS"}
                            },
                            {
                                "type": "Feature",
                                "geometry": {"type": "Point", "coordinates": [lon + 0.001, 45.2]},
                                "properties": {"ID_PARCEL": format!("{}-2", code), "SURF_PARC": 0.4}
                            }
                        ]
                    }
                },
                {
                    "layer": "postes_bt",
                    "kind": "poste_bt",
                    "collection": {
                        "type": "FeatureCollection",
                        "features": [
                            {"type": "Feature", "id": format!("BT-{}", code),
                             "geometry": {"type": "Point", "coordinates": [lon, 45.203]}, "properties": {}}
                        ]
                    }
                },
                {
                    "layer": "eleveurs",
                    "kind": "etablissement",
                    "collection": {
                        "type": "FeatureCollection",
                        "features": [
                            {"type": "Feature",
                             "geometry": {"type": "Point", "coordinates": [lon, 45.21]},
                             "properties": {"siret": format!("123{}", code), "nom": "GAEC"}}
                        ]
                    }
                }
            ]
        })
    };

    for (code, lon) in [("38001", 5.70), ("38002", 5.80)] {
        std::fs::write(
            dir.join(format!("{}.json", code)),
            serde_json::to_string(&commune(code, lon)).unwrap(),
        )
        .unwrap();
    }
    std::fs::write(dir.join("38999.json"), "{ broken").unwrap();
    dir
}

#[test]
fn test_department_document_from_files() {
    let dir = fixture_dir();
    let config = ReportConfig::from_preset("agricole").unwrap();
    let filter = config.build_filter().unwrap();

    let files = collect_inputs(&dir).unwrap();
    assert_eq!(files.len(), 3);
    let envelopes = read_envelopes(&files);

    let synthesis = run_department(
        "38",
        &envelopes,
        &config.engine,
        &filter,
        &RunOptions {
            jobs: 2,
            ..Default::default()
        },
    )
    .unwrap();

    // 0.4 ha < 1 ha : seule la première parcelle de chaque commune passe
    assert_eq!(synthesis.nb_parcelles, 2);
    assert_eq!(synthesis.nb_agriculteurs, 2);
    assert_eq!(synthesis.completeness.communes_failed, 1);
    assert_eq!(synthesis.completeness.status, ReportStatus::Partial);
    let broken = dir.join("38999.json").display().to_string();
    assert!(synthesis
        .completeness
        .notes
        .iter()
        .any(|note| note.commune.as_deref() == Some(broken.as_str())));

    let document = ReportDocument::from_department(&synthesis, config.engine.units);
    let value = serde_json::to_value(&document).unwrap();
    assert_eq!(value["scope"], "departement");
    assert_eq!(value["nb_parcelles"], 2);
    assert_eq!(value["surface_totale_ha"], 6.4);

    let top = &value["parcelles"]["top"]["features"][0]["properties"];
    assert_eq!(top["Culture"], "Maïs");
    assert_eq!(top["distance_formatted"], "333 m");
    assert_eq!(top["surface_m2"], 32_000.0);

    std::fs::remove_dir_all(&dir).unwrap();
}
