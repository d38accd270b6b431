//! The generation manifest recorded alongside a precompressed pyramid.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Per-zoom-level bookkeeping the offline generator records as it walks a
/// bounding box, so operators can sanity-check a run without re-walking the
/// whole tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoomStats {
    pub tiles_written: u64,
    pub tiles_skipped_all_nodata: u64,
}

/// Summary of a completed (or in-progress) artifact generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Version of the generator that produced this pyramid; bumped whenever
    /// the wire format or resampling policy changes, so a tile server can
    /// refuse to trust a manifest written by an incompatible generator.
    pub generator_version: String,
    pub source_root: String,
    pub min_zoom: u32,
    pub max_zoom: u32,
    pub generated_at_unix: u64,
    /// Content-encoding variants materialized for every tile in this run
    /// (e.g. `["br", "gzip"]`), in file-suffix form.
    pub variants: Vec<String>,
    pub by_zoom: BTreeMap<u32, ZoomStats>,
}

/// Bumped whenever the wire format, resampling policy, or on-disk layout
/// this generator writes changes in a way older readers can't handle.
pub const GENERATOR_VERSION: &str = "1";

impl Manifest {
    pub fn new(source_root: impl Into<String>, min_zoom: u32, max_zoom: u32, generated_at_unix: u64, variants: Vec<String>) -> Self {
        Manifest {
            generator_version: GENERATOR_VERSION.to_string(),
            source_root: source_root.into(),
            min_zoom,
            max_zoom,
            generated_at_unix,
            variants,
            by_zoom: BTreeMap::new(),
        }
    }

    pub fn record_written(&mut self, zoom: u32) {
        self.by_zoom.entry(zoom).or_default().tiles_written += 1;
    }

    pub fn record_skipped_all_nodata(&mut self, zoom: u32) {
        self.by_zoom.entry(zoom).or_default().tiles_skipped_all_nodata += 1;
    }

    pub fn total_tiles_written(&self) -> u64 {
        self.by_zoom.values().map(|s| s.tiles_written).sum()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Writes the manifest via temp-file-then-rename, matching the atomicity
    /// the generator relies on for individual tile artifacts.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &bytes)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");

        let mut manifest = Manifest::new("/data/dem", 0, 14, 1_700_000_000, vec!["br".to_string(), "gzip".to_string()]);
        manifest.record_written(10);
        manifest.record_written(10);
        manifest.record_skipped_all_nodata(10);
        manifest.save(&path).unwrap();

        let loaded = Manifest::load(&path).unwrap();
        assert_eq!(loaded.total_tiles_written(), 2);
        assert_eq!(loaded.by_zoom[&10].tiles_skipped_all_nodata, 1);
    }
}
