//! Walks a bounding box across a zoom range, mosaicking and encoding each
//! tile and writing it into a precompressed artifact pyramid.

use std::path::PathBuf;

use artifact_store::{ArtifactStore, Encoding, Manifest};
use dem_store::{ElevationLoader, Resampling, SourceStore};
use geo::{Coordinate, Tile};
use indicatif::ProgressBar;
use rayon::prelude::*;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("source store error: {0}")]
    Source(#[from] dem_store::Error),
    #[error("artifact store error: {0}")]
    Artifact(#[from] artifact_store::Error),
    #[error("codec error: {0}")]
    Codec(#[from] tile_codec::Error),
    #[error("unknown encoding {0:?}; expected one of br, gzip, identity")]
    UnknownEncoding(String),
}

pub struct GenerateOptions {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub min_zoom: i32,
    pub max_zoom: i32,
    /// `(south, west, north, east)`, in degrees.
    pub bbox: (f64, f64, f64, f64),
    pub encodings: Vec<Encoding>,
    pub source_cache_max: usize,
}

pub fn parse_encoding(s: &str) -> Result<Encoding> {
    match s.trim().to_ascii_lowercase().as_str() {
        "br" | "brotli" => Ok(Encoding::Brotli),
        "gzip" | "gz" => Ok(Encoding::Gzip),
        "identity" | "none" => Ok(Encoding::Identity),
        other => Err(Error::UnknownEncoding(other.to_string())),
    }
}

enum TileOutcome {
    Written,
    SkippedAllNoData,
}

fn generate_one(store: &SourceStore, artifacts: &ArtifactStore, tile: Tile, encodings: &[Encoding]) -> Result<TileOutcome> {
    let loader = ElevationLoader::new(store);
    let mosaic = loader.load(tile, Resampling::Nearest)?;

    if !mosaic.has_data {
        return Ok(TileOutcome::SkippedAllNoData);
    }

    let payload = tile_codec::encode_tile(&mosaic.data)?;
    artifacts.write_tile(tile.z as u32, tile.x as u32, tile.y as u32, &payload, encodings)?;
    Ok(TileOutcome::Written)
}

/// Runs the full generation pass: aborts if the source tree looks empty,
/// walks every `(z, x, y)` in `opts.bbox` across `[min_zoom, max_zoom]` in
/// parallel, and writes the manifest last, atomically.
pub fn run(opts: GenerateOptions, progress: impl Fn(i32, u64, u64) + Sync) -> Result<Manifest> {
    ArtifactStore::require_nonempty_source(&opts.source_dir)?;

    let store = SourceStore::with_capacity(&opts.source_dir, opts.source_cache_max);
    let artifacts = ArtifactStore::new(&opts.output_dir);

    let (south, west, north, east) = opts.bbox;
    let variants = opts.encodings.iter().map(|e| variant_label(*e).to_string()).collect();
    let mut manifest = Manifest::new(
        opts.source_dir.display().to_string(),
        opts.min_zoom as u32,
        opts.max_zoom as u32,
        unix_now(),
        variants,
    );

    for zoom in opts.min_zoom..=opts.max_zoom {
        let top_left = Tile::for_coordinate(Coordinate::latlon(north, west), zoom);
        let bottom_right = Tile::for_coordinate(Coordinate::latlon(south, east), zoom);

        let mut tiles = Vec::new();
        for x in top_left.x..=bottom_right.x {
            for y in top_left.y..=bottom_right.y {
                tiles.push(Tile { x, y, z: zoom });
            }
        }

        let total = tiles.len() as u64;
        let bar = ProgressBar::new(total);
        let outcomes: Vec<TileOutcome> = tiles
            .par_iter()
            .map(|&tile| {
                let outcome = generate_one(&store, &artifacts, tile, &opts.encodings);
                bar.inc(1);
                progress(zoom, bar.position(), total);
                outcome
            })
            .collect::<Result<_>>()?;
        bar.finish_and_clear();

        for outcome in outcomes {
            match outcome {
                TileOutcome::Written => manifest.record_written(zoom as u32),
                TileOutcome::SkippedAllNoData => manifest.record_skipped_all_nodata(zoom as u32),
            }
        }
    }

    manifest.save(&opts.output_dir.join("manifest.json"))?;
    Ok(manifest)
}

fn variant_label(encoding: Encoding) -> &'static str {
    match encoding {
        Encoding::Brotli => "br",
        Encoding::Gzip => "gzip",
        Encoding::Identity => "identity",
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}
