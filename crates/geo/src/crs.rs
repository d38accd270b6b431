//! EPSG:4326 (WGS84) <-> EPSG:3857 (web Mercator) conversions.
//!
//! This is the only projection pair the engine supports; arbitrary CRS
//! handling is explicitly out of scope.

use crate::{Coordinate, Point};

/// Circumference of the earth at the equator in the web Mercator projection, in meters.
pub const EARTH_CIRCUMFERENCE_M: f64 = 40_075_016.685_578_49;

/// Web Mercator clamps latitude to this bound; beyond it `y` diverges to infinity.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Projects a WGS84 coordinate to web Mercator meters (EPSG:3857).
pub fn lat_lon_to_web_mercator(coord: Coordinate) -> Point<f64> {
    let lat = coord.latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = coord.longitude.to_radians() * (EARTH_CIRCUMFERENCE_M / (2.0 * std::f64::consts::PI));
    let y = (lat.to_radians() / 2.0 + std::f64::consts::FRAC_PI_4).tan().ln()
        * (EARTH_CIRCUMFERENCE_M / (2.0 * std::f64::consts::PI));
    Point::new(x, y)
}

/// Inverse of [`lat_lon_to_web_mercator`].
pub fn web_mercator_to_lat_lon(point: Point<f64>) -> Coordinate {
    let scale = EARTH_CIRCUMFERENCE_M / (2.0 * std::f64::consts::PI);
    let lon = (point.x() / scale).to_degrees();
    let lat = (2.0 * (point.y() / scale).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    Coordinate::latlon(lat, lon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn round_trip() {
        let original = Coordinate::latlon(51.05, 3.72);
        let projected = lat_lon_to_web_mercator(original);
        let back = web_mercator_to_lat_lon(projected);
        assert_relative_eq!(original.latitude, back.latitude, epsilon = 1e-9);
        assert_relative_eq!(original.longitude, back.longitude, epsilon = 1e-9);
    }

    #[test]
    fn origin_is_null_island() {
        let p = lat_lon_to_web_mercator(Coordinate::latlon(0.0, 0.0));
        assert_relative_eq!(p.x(), 0.0, epsilon = 1e-6);
        assert_relative_eq!(p.y(), 0.0, epsilon = 1e-6);
    }
}
