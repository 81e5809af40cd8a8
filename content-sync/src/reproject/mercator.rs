//! Projection Web Mercator (EPSG:3857)
//!
//! Modèle sphérique sur le rayon équatorial WGS84, comme les fonds de carte
//! tuilés sur lesquels la couche de publications est affichée.

use super::Geographic;

/// Demi-grand axe de l'ellipsoïde WGS84, en mètres
pub const WGS84_SEMI_MAJOR_AXIS: f64 = 6_378_137.0;

/// Latitude maximale projetée, en degrés
pub const MAX_LATITUDE: f64 = 85.0;

/// Convertit coordonnées géographiques vers Web Mercator (EPSG:3857)
pub fn geographic_to_web_mercator(geo: Geographic) -> (f64, f64) {
    let r = WGS84_SEMI_MAJOR_AXIS;

    // Limiter la latitude pour éviter l'infini aux pôles
    let limit = MAX_LATITUDE.to_radians();
    let lat = geo.lat.clamp(-limit, limit);

    let x = r * geo.lon;
    let y = r * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln();

    (x, y)
}
