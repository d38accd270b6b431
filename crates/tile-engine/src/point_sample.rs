//! Point-Sample Service: answers "what is the flood risk at this
//! coordinate?" by locating the pixel a geographic point falls on within
//! the fixed-zoom mosaic, decoding its wire value, and classifying the
//! result against a water level.

use geo::Coordinate;

use crate::{Error, Result, TileEngine};

#[derive(Debug, Clone, serde::Deserialize)]
pub struct PointSampleRequest {
    pub latitude: f64,
    pub longitude: f64,
    /// Water level to classify risk against, in meters. Defaults to 0.0
    /// (mean sea level) when omitted.
    #[serde(default)]
    pub water_level_m: Option<f64>,
    /// Caller-supplied hint that this coordinate is known to be open water
    /// (e.g. resolved from a separate basemap layer): at a NoData pixel this
    /// turns an "unknown" verdict into "very_high" rather than leaving the
    /// caller without an answer.
    #[serde(default)]
    pub is_water_hint: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PointSampleResponse {
    /// `None` when the sampled pixel is NoData and `is_water_hint` was false.
    pub elevation_m: Option<f64>,
    pub flood_risk_level: String,
    pub risk_description: String,
    pub water_level_m: f64,
}

const RISK_VERY_HIGH: &str = "very_high";
const RISK_HIGH: &str = "high";
const RISK_MODERATE: &str = "moderate";
const RISK_LOW: &str = "low";
const RISK_UNKNOWN: &str = "unknown";

pub(crate) async fn sample(engine: &TileEngine, request: PointSampleRequest) -> Result<PointSampleResponse> {
    if !(-90.0..=90.0).contains(&request.latitude) || !(-180.0..=180.0).contains(&request.longitude) {
        return Err(Error::InvalidRequest(format!(
            "coordinate ({}, {}) is not a valid latitude/longitude pair",
            request.latitude, request.longitude
        )));
    }
    let water_level_m = request.water_level_m.unwrap_or(0.0);
    let (min, max) = engine.config().water_level_range;
    if water_level_m < min || water_level_m > max {
        return Err(Error::InvalidRequest(format!("water level {water_level_m} outside [{min}, {max}]")));
    }

    let coord = Coordinate::latlon(request.latitude, request.longitude);
    let (tile, raw, _source) = engine.tile_for_coordinate(coord).await?;

    let (px, py) = tile.pixel_for_coordinate(coord);
    let idx = (py as usize * tile_codec::TILE_DIM + px as usize) * 2;
    let wire_value = u16::from_le_bytes([raw[idx], raw[idx + 1]]);
    let elevation_m = tile_codec::decode_value(wire_value);

    let (flood_risk_level, risk_description, elevation_m) = match elevation_m {
        None if request.is_water_hint => (RISK_VERY_HIGH.to_string(), "open water".to_string(), None),
        None => (RISK_UNKNOWN.to_string(), "no elevation data available at this location".to_string(), None),
        Some(elevation_m) => {
            let diff = elevation_m - water_level_m;
            let (level, risk_description) = classify(diff);
            (level, risk_description, Some(elevation_m))
        }
    };

    Ok(PointSampleResponse {
        elevation_m,
        flood_risk_level,
        risk_description,
        water_level_m,
    })
}

/// Classifies flood risk from `elevation - water_level`, in meters. The
/// thresholds mirror `colormap::flood_color`'s bands, discretized into named
/// levels rather than interpolated colors.
fn classify(diff: f64) -> (String, String) {
    if diff <= 0.0 {
        (RISK_VERY_HIGH.to_string(), "at or below the water level; already inundated".to_string())
    } else if diff < 0.5 {
        (RISK_HIGH.to_string(), "less than 0.5m above the water level".to_string())
    } else if diff < 2.0 {
        (RISK_MODERATE.to_string(), "less than 2m above the water level".to_string())
    } else if diff < 5.0 {
        (RISK_LOW.to_string(), "less than 5m above the water level".to_string())
    } else {
        (RISK_LOW.to_string(), "well above the water level; safe".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, TileEngine};

    fn write_cell(dir: &std::path::Path, lat_floor: i32, lon_floor: i32, shape: (u32, u32), value: i16) {
        let id = dem_store::SourceStore::cell_id(lat_floor, lon_floor);
        let side_car = dem_store::SideCar {
            shape,
            bounds: [lon_floor as f64, lat_floor as f64, (lon_floor + 1) as f64, (lat_floor + 1) as f64],
            nodata: -32768,
            crs: "EPSG:4326".into(),
        };
        std::fs::write(dir.join(format!("{id}.json")), serde_json::to_vec(&side_car).unwrap()).unwrap();
        let raw: Vec<u8> = (0..shape.0 * shape.1).flat_map(|_| value.to_le_bytes()).collect();
        std::fs::write(dir.join(format!("{id}.zst")), zstd::bulk::compress(&raw, 3).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn ocean_point_with_water_hint_is_very_high_risk() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TileEngine::new(Config::new(dir.path()));

        let request = PointSampleRequest {
            latitude: 0.0,
            longitude: -160.0,
            water_level_m: Some(1.0),
            is_water_hint: true,
        };
        let response = engine.sample_point(request).await.unwrap();
        assert_eq!(response.flood_risk_level, RISK_VERY_HIGH);
        assert_eq!(response.elevation_m, None);
    }

    #[tokio::test]
    async fn ocean_point_without_water_hint_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TileEngine::new(Config::new(dir.path()));

        let request = PointSampleRequest {
            latitude: 0.0,
            longitude: -160.0,
            water_level_m: None,
            is_water_hint: false,
        };
        let response = engine.sample_point(request).await.unwrap();
        assert_eq!(response.flood_risk_level, RISK_UNKNOWN);
    }

    #[tokio::test]
    async fn elevated_land_point_is_low_risk_at_sea_level() {
        let dir = tempfile::tempdir().unwrap();
        write_cell(dir.path(), 51, 3, (3601, 3601), 100);
        let engine = TileEngine::new(Config::new(dir.path()));

        let request = PointSampleRequest {
            latitude: 51.05,
            longitude: 3.72,
            water_level_m: Some(0.0),
            is_water_hint: false,
        };
        let response = engine.sample_point(request).await.unwrap();
        assert_eq!(response.flood_risk_level, RISK_LOW);
        assert!(response.elevation_m.unwrap() > 90.0);
    }

    #[tokio::test]
    async fn low_lying_point_below_water_level_is_very_high_risk() {
        let dir = tempfile::tempdir().unwrap();
        write_cell(dir.path(), 51, 3, (3601, 3601), 1);
        let engine = TileEngine::new(Config::new(dir.path()));

        let request = PointSampleRequest {
            latitude: 51.05,
            longitude: 3.72,
            water_level_m: Some(5.0),
            is_water_hint: false,
        };
        let response = engine.sample_point(request).await.unwrap();
        assert_eq!(response.flood_risk_level, RISK_VERY_HIGH);
    }

    #[tokio::test]
    async fn out_of_range_latitude_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TileEngine::new(Config::new(dir.path()));
        let request = PointSampleRequest {
            latitude: 120.0,
            longitude: 0.0,
            water_level_m: None,
            is_water_hint: false,
        };
        let err = engine.sample_point(request).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidRequest);
    }
}
