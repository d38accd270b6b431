use std::path::PathBuf;

/// Every tunable the engine needs, gathered into one explicitly constructed
/// value (per the design note against module-level singletons): built once
/// at process startup, passed by reference into request handlers, dropped
/// at shutdown. The HTTP harness (`tools/tileserver`) is responsible for
/// turning CLI/env input into this record; the engine itself takes no
/// dependency on an argument parser.
#[derive(Debug, Clone)]
pub struct Config {
    /// Filesystem root for DEM `.zst` + `.json` source cells.
    pub source_dir: PathBuf,
    /// Filesystem root for the precompressed `.u16[.br|.gz]` pyramid.
    /// `None` disables precompressed lookups entirely (every tile is
    /// synthesized at request time).
    pub precompressed_dir: Option<PathBuf>,
    /// Max decompressed source arrays held in RAM.
    pub source_cache_max: usize,
    /// Max rendered PNGs held in RAM.
    pub png_cache_max: usize,
    /// Policy maximum zoom; requests above this are rejected. Cannot exceed
    /// `MAX_Z`.
    pub max_zoom: i32,
    /// `(min, max)` water level in meters.
    pub water_level_range: (f64, f64),
    /// Max in-flight tile syntheses before requests queue.
    pub concurrency_cap: usize,
    /// Max queued requests beyond the concurrency cap before `Overloaded`.
    pub queue_cap: usize,
    /// Per-request deadline.
    pub deadline_ms: u64,
}

/// Hard ceiling on `max_zoom`: the precompressed pyramid and the loader's
/// resolution budget are not defined past this zoom.
pub const MAX_Z: i32 = 11;
pub const MIN_WL_M: f64 = -10.0;
pub const MAX_WL_M: f64 = 1000.0;

impl Config {
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Config {
            source_dir: source_dir.into(),
            precompressed_dir: None,
            source_cache_max: dem_store::DEFAULT_SOURCE_CACHE_CAPACITY,
            png_cache_max: tile_cache::DEFAULT_CAPACITY,
            max_zoom: MAX_Z,
            water_level_range: (MIN_WL_M, MAX_WL_M),
            concurrency_cap: 64,
            queue_cap: 256,
            deadline_ms: 5_000,
        }
    }
}
