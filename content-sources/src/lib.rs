//! # content-sources
//!
//! Normalisation des publications de plusieurs sources hétérogènes vers un
//! schéma canonique unique.
//!
//! ## Sources
//!
//! - Flux de cartes (image, vidéo, citation, article) avec EXIF
//! - Plateforme vidéo (pas de géolocalisation)
//! - API de blog (résumé et médias extraits du HTML)
//! - CMS auto-hébergé avec table de géocodage exportée à part
//!
//! ## Usage
//!
//! ```rust,ignore
//! use content_sources::{DumpPages, GeocodeTable, Normalizer, Source};
//! use std::path::Path;
//!
//! let geocodes = GeocodeTable::load(Path::new("gmw_locations.csv"))?;
//! let normalizer = Normalizer::new().with_geocodes(geocodes);
//!
//! for raw in DumpPages::open(Path::new("wordpress.json"), Source::Wordpress)?.records() {
//!     let record = normalizer.normalize(&raw?)?;
//!     println!("{}: {}", record.post_id, record.title);
//! }
//! ```

pub mod error;
pub mod feed;
pub mod geocode;
pub mod html;
pub mod source;
pub mod types;

pub use error::SourceError;
pub use feed::{DumpPages, PageSource, Records};
pub use geocode::GeocodeTable;
pub use source::{Normalizer, PageRecords, RawRecord};
pub use types::{CanonicalRecord, Coordinate, Origin, PostType, Source, TableRow};
