//! # agri-rapport
//!
//! Interface en ligne de commande du moteur `geomatch`.
//!
//! ## Usage CLI
//!
//! ```bash
//! # Rapport d'une commune
//! agri-rapport commune --input ./data/38185.json --config agricole
//!
//! # Synthèse départementale (un fichier JSON par commune)
//! agri-rapport departement --dept 38 --input ./data/38/ --jobs 8 > rapport_38.json
//! ```

pub mod cli;
pub mod config;
pub mod input;

pub use config::{ReportConfig, RuntimeEnv};
