//! Precompressed Artifact Store: disk layout, content negotiation, and
//! atomic generator writes for the precompressed uint16 tile pyramid.

mod encoding;
mod error;
mod manifest;
mod store;

pub use encoding::{AcceptEncoding, Encoding};
pub use error::Error;
pub use manifest::{Manifest, ZoomStats};
pub use store::ArtifactStore;

pub type Result<T = ()> = std::result::Result<T, Error>;
