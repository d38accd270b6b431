//! Bijective int16 elevation <-> uint16 wire quantization.

mod error;

pub use error::Error;
pub type Result<T = ()> = std::result::Result<T, Error>;

/// Canonical int16 NoData sentinel (matches `geo::Nodata` for `i16`).
pub const NODATA_I16: i16 = i16::MIN;
/// Wire sentinel for NoData.
pub const NODATA_U16: u16 = 0xFFFF;

pub const ELEVATION_MIN_M: f64 = -500.0;
pub const ELEVATION_MAX_M: f64 = 9000.0;
pub const ELEVATION_RANGE_M: f64 = ELEVATION_MAX_M - ELEVATION_MIN_M;

/// Side length of a tile in pixels.
pub const TILE_DIM: usize = 256;
/// Bytes per encoded tile payload: `256 * 256 * size_of::<u16>()`.
pub const PAYLOAD_BYTES: usize = TILE_DIM * TILE_DIM * 2;

const MAX_QUANTIZED: f64 = 65534.0;

/// Encodes a single elevation value (meters, or `NODATA_I16`) to its wire uint16.
pub fn encode_value(elevation: i16) -> u16 {
    if elevation == NODATA_I16 {
        return NODATA_U16;
    }

    let e = elevation as f64;
    let u = ((e - ELEVATION_MIN_M) / ELEVATION_RANGE_M * MAX_QUANTIZED).round();
    u.clamp(0.0, MAX_QUANTIZED) as u16
}

/// Decodes a wire uint16 back to meters, or `None` for NoData.
pub fn decode_value(u: u16) -> Option<f64> {
    if u == NODATA_U16 {
        return None;
    }

    Some(u as f64 / MAX_QUANTIZED * ELEVATION_RANGE_M + ELEVATION_MIN_M)
}

/// Encodes a 256x256 row-major int16 mosaic into a little-endian 131,072-byte payload.
pub fn encode_tile(mosaic: &[i16]) -> Result<Vec<u8>> {
    if mosaic.len() != TILE_DIM * TILE_DIM {
        return Err(Error::InvalidLength {
            expected: TILE_DIM * TILE_DIM,
            actual: mosaic.len(),
        });
    }

    let mut out = Vec::with_capacity(PAYLOAD_BYTES);
    for &elevation in mosaic {
        out.extend_from_slice(&encode_value(elevation).to_le_bytes());
    }
    Ok(out)
}

/// Decodes a 131,072-byte payload into a 256x256 row-major int16 mosaic.
/// NoData pixels are represented as `NODATA_I16` in the output.
pub fn decode_tile(payload: &[u8]) -> Result<Vec<i16>> {
    if payload.len() != PAYLOAD_BYTES {
        return Err(Error::InvalidLength {
            expected: PAYLOAD_BYTES,
            actual: payload.len(),
        });
    }

    let mut out = Vec::with_capacity(TILE_DIM * TILE_DIM);
    for chunk in payload.chunks_exact(2) {
        let u = u16::from_le_bytes([chunk[0], chunk[1]]);
        let elevation = match decode_value(u) {
            Some(e) => e.round() as i16,
            None => NODATA_I16,
        };
        out.push(elevation);
    }
    Ok(out)
}

/// A payload consisting of all-NoData pixels: `0xFF 0xFF` repeated `TILE_DIM * TILE_DIM` times.
pub fn all_nodata_payload() -> Vec<u8> {
    vec![0xFFu8; PAYLOAD_BYTES]
}
