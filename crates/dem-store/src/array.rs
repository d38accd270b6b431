//! The decompressed int16 raster array behind a single Source Cell.

use geo::{Cell, GeoReference, Point};

/// A decompressed Source Cell: its int16 elevation grid plus the georeference
/// needed to map a geographic point to a pixel. Logically immutable once
/// built - interned in the [`crate::SourceCache`] and shared via `Arc`.
pub struct DecompressedSourceArray {
    data: Vec<i16>,
    georef: GeoReference,
}

impl DecompressedSourceArray {
    pub fn new(data: Vec<i16>, georef: GeoReference) -> Self {
        debug_assert_eq!(data.len(), georef.raster_size.cell_count());
        DecompressedSourceArray { data, georef }
    }

    pub fn georef(&self) -> &GeoReference {
        &self.georef
    }

    /// Approximate in-memory footprint, used for cache accounting.
    pub fn byte_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<i16>() + std::mem::size_of::<GeoReference>()
    }

    /// Samples the raw int16 value at `cell`, or `None` if out of bounds or NoData.
    /// The value returned is already coerced to the canonical `i16::MIN` sentinel.
    pub fn sample_cell(&self, cell: Cell) -> Option<i16> {
        if cell.row < 0 || cell.col < 0 || cell.row >= self.georef.rows() || cell.col >= self.georef.columns() {
            return None;
        }

        let idx = cell.row as usize * self.georef.columns() as usize + cell.col as usize;
        let v = self.data[idx];
        if v == self.georef.nodata { None } else { Some(v) }
    }

    /// Samples at a geographic point (WGS84 degrees), nearest-neighbor.
    pub fn sample_point(&self, point: Point<f64>) -> Option<i16> {
        if !self.georef.is_point_on_map(point) {
            return None;
        }
        self.sample_cell(self.georef.point_to_cell(point))
    }

    /// Bilinear sample at a geographic point. Falls back to `None` if any of the
    /// four surrounding source pixels is NoData or off-grid (no partial blending
    /// with NoData, to avoid biasing elevations toward the sentinel).
    pub fn sample_point_bilinear(&self, point: Point<f64>) -> Option<f64> {
        if !self.georef.is_point_on_map(point) {
            return None;
        }

        let inverse = self.georef.transform.invert().ok()?;
        let p = inverse.apply(point.x(), point.y());
        // Pixel-center convention: integer (col, row) addresses the pixel center.
        let fx = p.x() - 0.5;
        let fy = p.y() - 0.5;
        let col0 = fx.floor();
        let row0 = fy.floor();
        let tx = fx - col0;
        let ty = fy - row0;

        let col0 = col0 as i32;
        let row0 = row0 as i32;

        let v00 = self.sample_cell(Cell::from_row_col(row0, col0))?;
        let v10 = self.sample_cell(Cell::from_row_col(row0, col0 + 1))?;
        let v01 = self.sample_cell(Cell::from_row_col(row0 + 1, col0))?;
        let v11 = self.sample_cell(Cell::from_row_col(row0 + 1, col0 + 1))?;

        let top = v00 as f64 * (1.0 - tx) + v10 as f64 * tx;
        let bottom = v01 as f64 * (1.0 - tx) + v11 as f64 * tx;
        Some(top * (1.0 - ty) + bottom * ty)
    }
}
