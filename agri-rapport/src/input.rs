//! Lecture des données communales déjà collectées

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::warn;

/// Collecte les fichiers `.json` / `.geojson` d'un fichier ou d'un répertoire
///
/// Le résultat est trié pour un traitement reproductible.
pub fn collect_inputs(path: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if path.is_file() {
        files.push(path.to_path_buf());
        return Ok(files);
    }

    for entry in std::fs::read_dir(path)
        .with_context(|| format!("Cannot read directory {}", path.display()))?
    {
        let entry = entry?;
        let entry_path = entry.path();

        if entry_path.is_dir() {
            files.extend(collect_inputs(&entry_path)?);
        } else if is_input_file(&entry_path) {
            files.push(entry_path);
        }
    }

    files.sort();
    Ok(files)
}

fn is_input_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| {
            ext.eq_ignore_ascii_case("json") || ext.eq_ignore_ascii_case("geojson")
        })
}

/// Lit une enveloppe communale
pub fn read_envelope(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Lit toutes les enveloppes d'un département
///
/// Chaque enveloppe reçoit son chemin dans `source`. Un fichier illisible
/// n'interrompt pas la lecture : il est remplacé par une enveloppe réduite à
/// `source`, que le moteur rejette et note sous ce chemin.
pub fn read_envelopes(files: &[PathBuf]) -> Vec<Value> {
    files
        .iter()
        .map(|path| {
            let source = path.display().to_string();
            match read_envelope(path) {
                Ok(mut value) => {
                    if let Value::Object(object) = &mut value {
                        object
                            .entry("source")
                            .or_insert_with(|| Value::String(source));
                    }
                    value
                }
                Err(e) => {
                    warn!(file = %source, error = %format!("{:#}", e), "Unreadable commune file");
                    json!({ "source": source })
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("agri-rapport-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_collect_inputs_sorted_and_filtered() {
        let dir = temp_dir("collect");
        std::fs::write(dir.join("b.json"), "{}").unwrap();
        std::fs::write(dir.join("a.geojson"), "{}").unwrap();
        std::fs::write(dir.join("notes.txt"), "x").unwrap();
        std::fs::create_dir_all(dir.join("sub")).unwrap();
        std::fs::write(dir.join("sub").join("c.json"), "{}").unwrap();

        let files = collect_inputs(&dir).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(&dir).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a.geojson", "b.json", "sub/c.json"]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_unreadable_file_keeps_its_path() {
        let dir = temp_dir("read");
        let good = dir.join("good.json");
        let bad = dir.join("bad.json");
        std::fs::write(&good, r#"{"code": "38185"}"#).unwrap();
        std::fs::write(&bad, "{ not json").unwrap();

        let values = read_envelopes(&[good.clone(), bad.clone()]);
        assert_eq!(values[0]["code"], "38185");
        assert_eq!(values[0]["source"], good.display().to_string());
        assert_eq!(values[1], json!({ "source": bad.display().to_string() }));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
