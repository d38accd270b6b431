//! DEM Source Store and Elevation Loader: reads Zstd-compressed int16 source
//! cells from disk and mosaics them into 256x256 web-Mercator tiles.

mod array;
mod cache;
mod error;
mod loader;
pub mod sidecar;
mod store;

pub use array::DecompressedSourceArray;
pub use error::Error;
pub use loader::{ElevationLoader, MosaicResult, Resampling, NODATA, TILE_DIM};
pub use sidecar::SideCar;
pub use store::{CellLookup, SourceStore, DEFAULT_SOURCE_CACHE_CAPACITY};

pub type Result<T = ()> = std::result::Result<T, Error>;
