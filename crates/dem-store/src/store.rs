//! Read-only DEM Source Store: `(lat_floor, lon_floor) -> Decompressed Source Array`.

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use geo::{Columns, GeoReference, RasterSize, Rows};
use parking_lot::Mutex;

use crate::array::DecompressedSourceArray;
use crate::cache::SourceCache;
use crate::sidecar::{LEGACY_VOID, SideCar};
use crate::{Error, Result};

/// Default in-memory budget for decompressed source arrays, in entries.
pub const DEFAULT_SOURCE_CACHE_CAPACITY: usize = 64;

thread_local! {
    /// One persistent decompression context per worker thread, avoiding the
    /// per-call allocation a fresh `Decompressor` would incur.
    static DECOMPRESSOR: RefCell<zstd::bulk::Decompressor<'static>> =
        RefCell::new(zstd::bulk::Decompressor::new().expect("zstd decompressor context"));
}

/// The outcome of looking up a Source Cell. Absence is not an error: it
/// represents ocean or an un-ingested degree square.
pub enum CellLookup {
    Present(Arc<DecompressedSourceArray>),
    Absent,
}

/// Read-only mapping from 1x1 degree geographic cells to decompressed int16
/// rasters, backed by `<root>/<cell_id>.zst` + `<root>/<cell_id>.json`.
pub struct SourceStore {
    root: PathBuf,
    cache: SourceCache,
    /// Cells that have already produced a `SourceCorrupt` warning this
    /// process lifetime, so repeated requests for a damaged cell don't spam
    /// the log (the testable-properties scenario: "logged once per cell per
    /// process lifetime").
    corrupt_warned: Mutex<HashSet<(i32, i32)>>,
}

impl SourceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_capacity(root, DEFAULT_SOURCE_CACHE_CAPACITY)
    }

    pub fn with_capacity(root: impl Into<PathBuf>, source_cache_capacity: usize) -> Self {
        SourceStore {
            root: root.into(),
            cache: SourceCache::new(source_cache_capacity),
            corrupt_warned: Mutex::new(HashSet::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of decompressed source arrays currently interned in the source LRU.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Canonical on-disk stem for a Source Cell, e.g. `N52E003` / `S01W070`.
    pub fn cell_id(lat_floor: i32, lon_floor: i32) -> String {
        let ns = if lat_floor >= 0 { 'N' } else { 'S' };
        let ew = if lon_floor >= 0 { 'E' } else { 'W' };
        format!("{ns}{:02}{ew}{:03}", lat_floor.abs(), lon_floor.abs())
    }

    fn paths_for(&self, lat_floor: i32, lon_floor: i32) -> (PathBuf, PathBuf) {
        let id = Self::cell_id(lat_floor, lon_floor);
        (self.root.join(format!("{id}.zst")), self.root.join(format!("{id}.json")))
    }

    /// Opens the Source Cell at `(lat_floor, lon_floor)`, decompressing and
    /// caching it if necessary. Returns `Absent` for missing cells and for
    /// cells whose on-disk data is corrupt (logged once); only genuine I/O
    /// failures (e.g. permission errors) are propagated as `Err`.
    pub fn open(&self, lat_floor: i32, lon_floor: i32) -> Result<CellLookup> {
        let key = (lat_floor, lon_floor);
        if let Some(array) = self.cache.get(key) {
            return Ok(CellLookup::Present(array));
        }

        let (zst_path, sidecar_path) = self.paths_for(lat_floor, lon_floor);

        let compressed = match std::fs::read(&zst_path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(CellLookup::Absent),
            Err(err) => return Err(Error::Io(err)),
        };

        let side_car_bytes = match std::fs::read(&sidecar_path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(CellLookup::Absent),
            Err(err) => return Err(Error::Io(err)),
        };
        let side_car: SideCar = serde_json::from_slice(&side_car_bytes)?;

        let expected_len = side_car.shape.0 as usize * side_car.shape.1 as usize * std::mem::size_of::<i16>();
        let decompressed = DECOMPRESSOR.with(|d| d.borrow_mut().decompress(&compressed, expected_len));
        let decompressed = match decompressed {
            Ok(bytes) => bytes,
            Err(err) => {
                self.warn_corrupt_once(key, &err.to_string());
                return Ok(CellLookup::Absent);
            }
        };

        if decompressed.len() != expected_len {
            self.warn_corrupt_once(
                key,
                &format!("declared shape {:?} implies {expected_len} bytes, decompressed {}", side_car.shape, decompressed.len()),
            );
            return Ok(CellLookup::Absent);
        }

        let canonical_nodata = side_car.canonical_nodata();
        let data: Vec<i16> = decompressed
            .chunks_exact(2)
            .map(|b| {
                let raw = i16::from_le_bytes([b[0], b[1]]);
                // The legacy void sentinel is coerced to NoData wherever it
                // appears in the raster, not only when it's the cell's
                // declared sentinel: a cell can declare the canonical
                // sentinel yet still contain stray legacy-void pixels.
                if raw == side_car.nodata || raw == LEGACY_VOID { canonical_nodata } else { raw }
            })
            .collect();

        let (west, south, east, north) = (side_car.bounds[0], side_car.bounds[1], side_car.bounds[2], side_car.bounds[3]);
        let cols = side_car.shape.1;
        let rows = side_car.shape.0;
        let cell_size = (east - west) / cols as f64;
        let mut georef = GeoReference::new(
            RasterSize::with_rows_cols(Rows(rows as i32), Columns(cols as i32)),
            west,
            north,
            cell_size,
            canonical_nodata,
        );
        // Rows and columns need not be equal; correct the vertical pixel size
        // independently so non-square grids still address the right row.
        georef.transform.set_cell_size_y(-(north - south) / rows as f64);

        let array = Arc::new(DecompressedSourceArray::new(data, georef));
        self.cache.insert(key, Arc::clone(&array));
        Ok(CellLookup::Present(array))
    }

    fn warn_corrupt_once(&self, key: (i32, i32), detail: &str) {
        let mut warned = self.corrupt_warned.lock();
        if warned.insert(key) {
            log::warn!(
                "source cell {} is corrupt, treating as absent: {detail}",
                Self::cell_id(key.0, key.1)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_id_formats_all_quadrants() {
        assert_eq!(SourceStore::cell_id(52, 3), "N52E003");
        assert_eq!(SourceStore::cell_id(-1, -70), "S01W070");
        assert_eq!(SourceStore::cell_id(0, 0), "N00E000");
    }

    #[test]
    fn absent_cell_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SourceStore::new(dir.path());
        match store.open(52, 3).unwrap() {
            CellLookup::Absent => {}
            CellLookup::Present(_) => panic!("expected absent cell"),
        }
    }

    fn write_test_cell(dir: &Path, lat_floor: i32, lon_floor: i32, shape: (u32, u32), nodata: i16, values: &[i16]) {
        let id = SourceStore::cell_id(lat_floor, lon_floor);
        let side_car = SideCar {
            shape,
            bounds: [lon_floor as f64, lat_floor as f64, (lon_floor + 1) as f64, (lat_floor + 1) as f64],
            nodata,
            crs: "EPSG:4326".into(),
        };
        std::fs::write(dir.join(format!("{id}.json")), serde_json::to_vec(&side_car).unwrap()).unwrap();

        let mut raw = Vec::with_capacity(values.len() * 2);
        for v in values {
            raw.extend_from_slice(&v.to_le_bytes());
        }
        let compressed = zstd::bulk::compress(&raw, 3).unwrap();
        std::fs::write(dir.join(format!("{id}.zst")), compressed).unwrap();
    }

    #[test]
    fn present_cell_round_trips_values_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let values = vec![100i16; 4];
        write_test_cell(dir.path(), 52, 3, (2, 2), -32768, &values);

        let store = SourceStore::new(dir.path());
        let array = match store.open(52, 3).unwrap() {
            CellLookup::Present(array) => array,
            CellLookup::Absent => panic!("expected present cell"),
        };
        assert_eq!(array.sample_cell(geo::Cell::from_row_col(0, 0)), Some(100));

        // Second open must hit the cache, not re-read the file.
        std::fs::remove_file(dir.path().join(format!("{}.zst", SourceStore::cell_id(52, 3)))).unwrap();
        assert!(matches!(store.open(52, 3).unwrap(), CellLookup::Present(_)));
    }

    #[test]
    fn legacy_void_values_coerce_to_canonical_nodata() {
        let dir = tempfile::tempdir().unwrap();
        write_test_cell(dir.path(), 52, 3, (1, 2), crate::sidecar::LEGACY_VOID, &[10, crate::sidecar::LEGACY_VOID]);

        let store = SourceStore::new(dir.path());
        let array = match store.open(52, 3).unwrap() {
            CellLookup::Present(array) => array,
            CellLookup::Absent => panic!("expected present cell"),
        };
        assert_eq!(array.sample_cell(geo::Cell::from_row_col(0, 0)), Some(10));
        assert_eq!(array.sample_cell(geo::Cell::from_row_col(0, 1)), None);
    }

    #[test]
    fn stray_legacy_void_pixels_coerce_even_under_canonical_declared_nodata() {
        let dir = tempfile::tempdir().unwrap();
        // Declared sentinel is already canonical, but a pixel still carries
        // the legacy void value - it must be coerced too, not kept as a
        // (bogus) elevation reading.
        write_test_cell(dir.path(), 52, 3, (1, 2), i16::MIN, &[10, crate::sidecar::LEGACY_VOID]);

        let store = SourceStore::new(dir.path());
        let array = match store.open(52, 3).unwrap() {
            CellLookup::Present(array) => array,
            CellLookup::Absent => panic!("expected present cell"),
        };
        assert_eq!(array.sample_cell(geo::Cell::from_row_col(0, 0)), Some(10));
        assert_eq!(array.sample_cell(geo::Cell::from_row_col(0, 1)), None);
    }

    #[test]
    fn shape_mismatch_is_treated_as_absent_and_warned_once() {
        let dir = tempfile::tempdir().unwrap();
        // Declare a 10x10 shape but only compress 4 values.
        write_test_cell(dir.path(), 52, 3, (10, 10), -32768, &[1, 2, 3, 4]);

        let store = SourceStore::new(dir.path());
        assert!(matches!(store.open(52, 3).unwrap(), CellLookup::Absent));
        assert_eq!(store.corrupt_warned.lock().len(), 1);
        // Repeated lookups don't grow the warned set.
        assert!(matches!(store.open(52, 3).unwrap(), CellLookup::Absent));
        assert_eq!(store.corrupt_warned.lock().len(), 1);
    }
}
