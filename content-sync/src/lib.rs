//! # content-sync
//!
//! Synchronisation idempotente des publications normalisées vers deux
//! magasins indépendants : une table ordonnée (lignes positionnelles) et un
//! magasin géographique (attributs + point projeté).
//!
//! ## Features
//!
//! - Différentiel champ par champ contre chaque magasin
//! - Projection Web Mercator en Rust pur, ou PROJ avec le feature `proj`
//! - Journal d'audit des modifications (`logs.txt`)
//! - Rapport de run (console et JSON)
//!
//! ## Usage CLI
//!
//! ```bash
//! # Synchronisation complète depuis une configuration JSON
//! content-sync --config content-sync.json
//!
//! # Lignes canoniques d'un dump, sans toucher aux magasins
//! content-sync normalize --source blogger --input dumps/blogger.json
//!
//! # Projection d'une position
//! content-sync project --lat -13.9626 --lon 33.7741
//! ```

pub mod config;
pub mod diff;
pub mod report;
pub mod reproject;
pub mod store;
pub mod sync;

pub use config::SyncConfig;
pub use report::{StageReport, SyncReport, SyncStatus};
pub use reproject::Projector;
pub use sync::{Reconciler, SyncError};

/// Cible `tracing` du journal d'audit (modifications champ par champ)
pub const AUDIT_TARGET: &str = "content_sync::audit";
