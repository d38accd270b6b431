//! Content-encoding vocabulary for precompressed uint16 artifacts.

use std::io::{Read, Write};

use crate::Result;

/// A content-encoding variant an artifact may be materialized under. The
/// preference order the engine negotiates in is `Brotli > Gzip > Identity`
/// (see `ArtifactStore::negotiate`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Encoding {
    Brotli,
    Gzip,
    Identity,
}

impl Encoding {
    pub const ALL: [Encoding; 3] = [Encoding::Brotli, Encoding::Gzip, Encoding::Identity];

    /// The file extension suffix appended to `<z>/<x>/<y>.u16`.
    pub fn file_suffix(self) -> &'static str {
        match self {
            Encoding::Brotli => "u16.br",
            Encoding::Gzip => "u16.gz",
            Encoding::Identity => "u16",
        }
    }

    /// The `Content-Encoding` header value, or `None` for identity.
    pub fn content_encoding_header(self) -> Option<&'static str> {
        match self {
            Encoding::Brotli => Some("br"),
            Encoding::Gzip => Some("gzip"),
            Encoding::Identity => None,
        }
    }

    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Encoding::Identity => Ok(data.to_vec()),
            Encoding::Gzip => {
                let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(data)?;
                Ok(encoder.finish()?)
            }
            Encoding::Brotli => {
                let mut out = Vec::new();
                let params = brotli::enc::BrotliEncoderParams::default();
                brotli::BrotliCompress(&mut std::io::Cursor::new(data), &mut out, &params)?;
                Ok(out)
            }
        }
    }

    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Encoding::Identity => Ok(data.to_vec()),
            Encoding::Gzip => {
                let mut decoder = flate2::read::GzDecoder::new(data);
                let mut out = Vec::new();
                decoder.read_to_end(&mut out)?;
                Ok(out)
            }
            Encoding::Brotli => {
                let mut out = Vec::new();
                brotli::BrotliDecompress(&mut std::io::Cursor::new(data), &mut out)?;
                Ok(out)
            }
        }
    }
}

/// The client's ordered content-encoding acceptance, parsed from an
/// `Accept-Encoding` request header. Identity is implicitly always
/// acceptable, per HTTP semantics, unless a request explicitly forbids it -
/// this store never models that refinement since no caller needs it.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptEncoding {
    pub br: bool,
    pub gzip: bool,
}

impl AcceptEncoding {
    pub fn parse(header: &str) -> Self {
        let lower = header.to_ascii_lowercase();
        AcceptEncoding {
            br: lower.split(',').any(|tok| tok.trim().starts_with("br")),
            gzip: lower.split(',').any(|tok| tok.trim().starts_with("gzip")),
        }
    }

    pub fn accepts(&self, encoding: Encoding) -> bool {
        match encoding {
            Encoding::Brotli => self.br,
            Encoding::Gzip => self.gzip,
            Encoding::Identity => true,
        }
    }

    pub const fn identity_only() -> Self {
        AcceptEncoding { br: false, gzip: false }
    }
}
