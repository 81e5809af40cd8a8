//! Projection des coordonnées vers le plan du magasin géographique
//!
//! Deux backends :
//! - Web Mercator en Rust pur (défaut)
//! - PROJ (`EPSG:4326 → EPSG:3857`), avec le feature `proj`
//!
//! La sentinelle « pas de position » ne passe jamais par la projection :
//! elle donne directement le point `(0, 0)`.

pub mod mercator;

use content_sources::types::round_to;
use content_sources::Coordinate;
use geo::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// EPSG du plan de projection
pub const TARGET_EPSG: u32 = 3857;

/// Précision des coordonnées projetées (mètres, ~1 cm)
pub const PROJECTED_PRECISION: i32 = 2;

/// Erreurs de projection
///
/// Une coordonnée non finie trahit un défaut du normaliseur en amont : ces
/// erreurs ne sont jamais rattrapées enregistrement par enregistrement.
#[derive(Debug, Error)]
pub enum ReprojectError {
    #[error("Non-finite coordinate: lat={latitude}, lon={longitude}")]
    NonFinite { latitude: f64, longitude: f64 },

    #[error("Projection backend unavailable: {0}")]
    Unavailable(String),

    #[error("Coordinate transformation failed: {0}")]
    Transform(String),
}

/// Point en coordonnées géographiques (radians)
#[derive(Debug, Clone, Copy)]
pub struct Geographic {
    /// Longitude en radians
    pub lon: f64,
    /// Latitude en radians
    pub lat: f64,
}

impl Geographic {
    /// Crée depuis des degrés
    pub fn from_degrees(lon_deg: f64, lat_deg: f64) -> Self {
        Self {
            lon: lon_deg.to_radians(),
            lat: lat_deg.to_radians(),
        }
    }
}

/// Backend de projection choisi dans la configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionBackend {
    /// Web Mercator sphérique en Rust pur
    #[default]
    Mercator,
    /// Bibliothèque PROJ
    Proj,
}

/// Vérifie si le backend PROJ est compilé
pub fn proj_available() -> bool {
    cfg!(feature = "proj")
}

enum Backend {
    Mercator,
    #[cfg(feature = "proj")]
    Proj(proj::Proj),
}

/// Projette les coordonnées des enregistrements canoniques
pub struct Projector {
    backend: Backend,
}

impl Default for Projector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Projector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projector")
            .field("backend", &self.backend_name())
            .finish()
    }
}

impl Projector {
    /// Projecteur Web Mercator en Rust pur
    pub fn new() -> Self {
        Self {
            backend: Backend::Mercator,
        }
    }

    /// Crée le projecteur demandé par la configuration
    pub fn for_backend(backend: ProjectionBackend) -> Result<Self, ReprojectError> {
        match backend {
            ProjectionBackend::Mercator => Ok(Self::new()),
            ProjectionBackend::Proj => Self::with_proj(),
        }
    }

    #[cfg(feature = "proj")]
    fn with_proj() -> Result<Self, ReprojectError> {
        let target = format!("EPSG:{}", TARGET_EPSG);
        let proj = proj::Proj::new_known_crs("EPSG:4326", &target, None)
            .map_err(|e| ReprojectError::Unavailable(e.to_string()))?;
        Ok(Self {
            backend: Backend::Proj(proj),
        })
    }

    #[cfg(not(feature = "proj"))]
    fn with_proj() -> Result<Self, ReprojectError> {
        Err(ReprojectError::Unavailable(
            "the PROJ backend requires the 'proj' feature. Build with: cargo build --features proj"
                .to_string(),
        ))
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Mercator => "mercator",
            #[cfg(feature = "proj")]
            Backend::Proj(_) => "proj",
        }
    }

    /// Projette une position, `(0, 0)` pour la sentinelle
    ///
    /// Le résultat est arrondi à 2 décimales.
    pub fn project(&self, coordinate: Option<Coordinate>) -> Result<Point<f64>, ReprojectError> {
        let Some(c) = coordinate else {
            return Ok(Point::new(0.0, 0.0));
        };

        if !c.latitude.is_finite() || !c.longitude.is_finite() {
            return Err(ReprojectError::NonFinite {
                latitude: c.latitude,
                longitude: c.longitude,
            });
        }

        let (x, y) = match &self.backend {
            Backend::Mercator => {
                mercator::geographic_to_web_mercator(Geographic::from_degrees(c.longitude, c.latitude))
            }
            #[cfg(feature = "proj")]
            Backend::Proj(proj) => {
                let limit = mercator::MAX_LATITUDE;
                let latitude = c.latitude.clamp(-limit, limit);
                proj.convert((c.longitude, latitude))
                    .map_err(|e| ReprojectError::Transform(e.to_string()))?
            }
        };

        Ok(Point::new(
            round_to(x, PROJECTED_PRECISION),
            round_to(y, PROJECTED_PRECISION),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_projects_to_origin() {
        let projector = Projector::new();
        let p = projector.project(None).unwrap();
        assert_eq!((p.x(), p.y()), (0.0, 0.0));
    }

    #[test]
    fn test_project_rounds_to_two_decimals() {
        let projector = Projector::new();
        let c = Coordinate::from_degrees(-13.9626, 33.7741);
        let p = projector.project(c).unwrap();

        assert_eq!(p.x(), 3_759_715.61);
        assert_eq!(p.y(), -1_569_926.09);
    }

    #[test]
    fn test_non_finite_input_is_an_error() {
        let projector = Projector::new();
        let c = Coordinate {
            latitude: f64::NAN,
            longitude: 33.0,
        };
        assert!(matches!(
            projector.project(Some(c)),
            Err(ReprojectError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_backend_from_config() {
        let projector = Projector::for_backend(ProjectionBackend::Mercator).unwrap();
        assert_eq!(projector.backend_name(), "mercator");

        let proj = Projector::for_backend(ProjectionBackend::Proj);
        assert_eq!(proj.is_ok(), proj_available());
    }

    #[cfg(feature = "proj")]
    #[test]
    fn test_proj_matches_mercator() {
        let c = Coordinate::from_degrees(-15.7861, 35.0058);
        let lite = Projector::new().project(c).unwrap();
        let proj = Projector::for_backend(ProjectionBackend::Proj)
            .unwrap()
            .project(c)
            .unwrap();

        assert!((lite.x() - proj.x()).abs() < 0.05);
        assert!((lite.y() - proj.y()).abs() < 0.05);
    }
}
