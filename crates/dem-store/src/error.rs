use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed side-car metadata: {0}")]
    Sidecar(#[from] serde_json::Error),
    #[error("zstd decompression failed for cell ({lat_floor}, {lon_floor}): {source}")]
    Decompress {
        lat_floor: i32,
        lon_floor: i32,
        #[source]
        source: std::io::Error,
    },
    #[error("source cell ({lat_floor}, {lon_floor}) is corrupt: declared shape does not match decompressed byte length")]
    CorruptShape { lat_floor: i32, lon_floor: i32 },
}
