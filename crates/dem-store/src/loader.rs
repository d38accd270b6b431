//! Elevation Loader: resolves a web-Mercator tile to a 256x256 int16 mosaic.

use std::collections::HashMap;
use std::sync::Arc;

use geo::{Point, Tile};

use crate::array::DecompressedSourceArray;
use crate::store::{CellLookup, SourceStore};
use crate::Result;

/// Side length, in pixels, of a Mosaic Result.
pub const TILE_DIM: usize = tile_codec::TILE_DIM;

/// Canonical int16 NoData sentinel.
pub const NODATA: i16 = tile_codec::NODATA_I16;

/// Pixel-level resampling strategy. The wire uint16 payload path must always
/// use `Nearest` (point-sampling determinism); `Bilinear` is offered only for
/// presentation PNGs, selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resampling {
    Nearest,
    Bilinear,
}

/// A synthesized 256x256 int16 mosaic plus a has-data flag.
#[derive(Debug, Clone)]
pub struct MosaicResult {
    /// Row-major int16 array, `TILE_DIM * TILE_DIM` elements; `NODATA` where
    /// no covering cell exists or the source pixel is itself NoData.
    pub data: Vec<i16>,
    pub has_data: bool,
}

impl MosaicResult {
    fn all_nodata() -> Self {
        MosaicResult {
            data: vec![NODATA; TILE_DIM * TILE_DIM],
            has_data: false,
        }
    }
}

/// Materializes `(z, x, y) -> Mosaic Result` by mosaicking the Source Cells
/// that intersect the tile's geographic bounds.
pub struct ElevationLoader<'a> {
    store: &'a SourceStore,
}

impl<'a> ElevationLoader<'a> {
    pub fn new(store: &'a SourceStore) -> Self {
        ElevationLoader { store }
    }

    pub fn load(&self, tile: Tile, resampling: Resampling) -> Result<MosaicResult> {
        let bounds = tile.bounds();
        if !bounds.valid() {
            return Ok(MosaicResult::all_nodata());
        }

        // A boundary exactly on an integer degree is assigned, by the floor
        // convention `geo::Coordinate::cell_floor` already uses throughout
        // this codebase, to the cell whose south-west corner sits at that
        // boundary - i.e. the cell extending north/east of it. This is the
        // "ties resolve to a single neighbor, not both" tolerance the tile
        // algorithm calls for; no separate epsilon nudge is needed since
        // `cell_floor` already commits to one side.
        let lat_lo = bounds.south().floor() as i32;
        let lat_hi = (bounds.north() - f64::EPSILON).floor() as i32;
        let lon_lo = bounds.west().floor() as i32;
        let lon_hi = (bounds.east() - f64::EPSILON).floor() as i32;

        let mut cells: HashMap<(i32, i32), Option<Arc<DecompressedSourceArray>>> = HashMap::new();
        for lat in lat_lo..=lat_hi {
            for lon in lon_lo..=lon_hi {
                let entry = match self.store.open(lat, lon)? {
                    CellLookup::Present(array) => Some(array),
                    CellLookup::Absent => None,
                };
                cells.insert((lat, lon), entry);
            }
        }

        let mut data = vec![NODATA; TILE_DIM * TILE_DIM];
        let mut has_data = false;

        for row in 0..TILE_DIM {
            for col in 0..TILE_DIM {
                let fx = (col as f64 + 0.5) / TILE_DIM as f64;
                let fy = (row as f64 + 0.5) / TILE_DIM as f64;
                let coord = tile.pixel_coordinate(fx, fy);
                let (lat_floor, lon_floor) = coord.cell_floor();

                let Some(Some(array)) = cells.get(&(lat_floor, lon_floor)) else {
                    continue;
                };

                let point = Point::new(coord.longitude, coord.latitude);
                let value = match resampling {
                    Resampling::Nearest => array.sample_point(point).map(|v| v as f64),
                    Resampling::Bilinear => array.sample_point_bilinear(point),
                };

                if let Some(value) = value {
                    data[row * TILE_DIM + col] = value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
                    has_data = true;
                }
            }
        }

        Ok(MosaicResult { data, has_data })
    }
}
