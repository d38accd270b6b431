//! JSON side-car metadata read alongside each `.zst` compressed source array.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SideCar {
    pub shape: (u32, u32),
    /// `[west, south, east, north]` in degrees.
    pub bounds: [f64; 4],
    pub nodata: i16,
    pub crs: String,
}

/// The legacy void sentinel some older source cells used in place of the
/// canonical `i16::MIN` NoData value.
pub const LEGACY_VOID: i16 = -32767;

impl SideCar {
    /// The NoData sentinel to apply to this cell's values, coercing the legacy
    /// void value to the canonical sentinel.
    pub fn canonical_nodata(&self) -> i16 {
        if self.nodata == LEGACY_VOID { i16::MIN } else { self.nodata }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_void_coerces_to_canonical() {
        let side_car = SideCar {
            shape: (3601, 3601),
            bounds: [3.0, 51.0, 4.0, 52.0],
            nodata: LEGACY_VOID,
            crs: "EPSG:4326".into(),
        };
        assert_eq!(side_car.canonical_nodata(), i16::MIN);
    }

    #[test]
    fn canonical_nodata_passes_through_unchanged() {
        let side_car = SideCar {
            shape: (3601, 3601),
            bounds: [3.0, 51.0, 4.0, 52.0],
            nodata: i16::MIN,
            crs: "EPSG:4326".into(),
        };
        assert_eq!(side_car.canonical_nodata(), i16::MIN);
    }
}
