//! Georeferencing metadata for a Source Cell's int16 raster array.
//!
//! Mirrors the side-car JSON contract: `shape`, `bounds`, `nodata`, `crs`.
//! Only EPSG:4326 sources are supported.

use crate::{Cell, GeoTransform, Point, RasterSize};

pub type CellSize = Point<f64>;

/// Georeferencing for a single Source Cell: its pixel grid, geographic bounds
/// and nodata sentinel. Always EPSG:4326 - the engine does not reproject sources.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoReference {
    pub raster_size: RasterSize,
    /// top-left x (west), pixel width, 0, top-left y (north), 0, pixel height (negative)
    pub transform: GeoTransform,
    pub nodata: i16,
}

impl GeoReference {
    pub fn new(raster_size: RasterSize, west: f64, north: f64, cell_size_deg: f64, nodata: i16) -> Self {
        GeoReference {
            raster_size,
            transform: GeoTransform::new([west, cell_size_deg, 0.0, north, 0.0, -cell_size_deg]),
            nodata,
        }
    }

    pub fn columns(&self) -> i32 {
        self.raster_size.cols.count()
    }

    pub fn rows(&self) -> i32 {
        self.raster_size.rows.count()
    }

    /// West/south/east/north bounds in degrees.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let top_left = self.transform.top_left();
        let west = top_left.x();
        let north = top_left.y();
        let east = west + self.columns() as f64 * self.transform.cell_size_x();
        let south = north + self.rows() as f64 * self.transform.cell_size_y();
        (west, south, east, north)
    }

    pub fn is_point_on_map(&self, point: Point<f64>) -> bool {
        let (west, south, east, north) = self.bounds();
        point.x() >= west && point.x() < east && point.y() <= north && point.y() > south
    }

    /// Maps a geographic point (in the same units as the transform, i.e. degrees)
    /// to the containing raster cell. Does not bounds-check the result.
    pub fn point_to_cell(&self, point: Point<f64>) -> Cell {
        let inverse = self
            .transform
            .invert()
            .expect("georeference transform is always invertible: non-zero cell size");
        let p = inverse.apply(point.x(), point.y());
        Cell::from_row_col(p.y().floor() as i32, p.x().floor() as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Columns, Rows};

    #[test]
    fn point_to_cell_round_trips_through_center() {
        let geo = GeoReference::new(RasterSize::with_rows_cols(Rows(3601), Columns(3601)), 3.0, 52.0, 1.0 / 3600.0, -32768);
        let cell = geo.point_to_cell(Point::new(3.5, 51.5));
        assert!(cell.row >= 0 && cell.row < 3601);
        assert!(cell.col >= 0 && cell.col < 3601);
    }

    #[test]
    fn bounds_match_construction() {
        let geo = GeoReference::new(RasterSize::square(100), 10.0, 11.0, 0.01, -32768);
        let (west, south, east, north) = geo.bounds();
        assert_eq!(west, 10.0);
        assert_eq!(north, 11.0);
        assert!((east - 11.0).abs() < 1e-9);
        assert!((south - 10.0).abs() < 1e-9);
    }
}
