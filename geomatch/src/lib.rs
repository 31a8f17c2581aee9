//! # geomatch
//!
//! Moteur de rapprochement spatial et de synthèse de rapports pour les
//! parcelles agricoles (RPG), toitures et terrains, selon leur distance aux
//! postes électriques BT et HTA.
//!
//! ## Chaîne de traitement
//!
//! - Normalisation des FeatureCollections brutes (entrées invalides écartées et comptées)
//! - Annotation : surface et distance au poste BT/HTA le plus proche (`rstar`)
//! - Filtrage par seuils (surface, distances, zones d'exclusion, culture)
//! - Dédoublonnage des observations redondantes
//! - Classement, rapport communal et synthèse départementale
//! - Mise en forme GeoJSON pour le rendu
//!
//! Le moteur ne fait aucune entrée/sortie : il reçoit des collections déjà
//! collectées et retourne des structures sérialisables.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use geomatch::{process_commune, CommuneInput, EngineConfig, FilterEngine, Thresholds};
//!
//! let config = EngineConfig::default();
//! let filter = FilterEngine::new(Thresholds {
//!     min_surface: Some(10_000.0),
//!     max_distance_bt: Some(500.0),
//!     ..Default::default()
//! })?;
//! let input = CommuneInput::from_value(&raw)?;
//! let report = process_commune(&input, &config, &filter)?;
//! println!("{}: {} parcelles", report.code, report.nb_parcelles);
//! ```

pub mod aggregate;
pub mod assemble;
pub mod completeness;
pub mod config;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod normalize;
pub mod pipeline;
pub mod proximity;
pub mod rank;
pub mod types;

pub use aggregate::{synthesize, CategorySummary, CommuneReport, DepartmentSynthesis};
pub use assemble::ReportDocument;
pub use completeness::{Completeness, ReportStatus};
pub use config::{AxisOrder, CoordUnits, EngineConfig, SurfaceKey};
pub use dedup::{deduplicate, DedupKey, Deduplicate};
pub use error::{DropReason, GeomatchError, NormalizeError};
pub use filter::{FilterEngine, ProximityPolicy, Thresholds};
pub use normalize::{normalize_collection, NormalizeStats, Normalized};
pub use pipeline::{
    process_commune, run_department, CancelFlag, CommuneInput, CommuneProgress, CommuneStatus,
    LayerInput, ProgressHook, RunOptions,
};
pub use proximity::{Annotator, InfrastructureIndex, Placement};
pub use types::{
    CandidateRecord, Category, Establishment, Feature, InfraClass, InfrastructurePoint, LayerKind,
    PropertyValue,
};
