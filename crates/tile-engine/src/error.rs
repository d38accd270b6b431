use thiserror::Error;

/// The abstract failure taxonomy the engine surfaces at its boundary.
/// `CoverageMiss` and `SourceCorrupt` are deliberately absent here: both are
/// recovered locally (an all-NoData payload, a logged-once warning) and
/// never reach a caller as an error value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    NotFound,
    StoreUnavailable,
    Overloaded,
    Timeout,
    Internal,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("no mosaic could be produced and runtime synthesis was forbidden")]
    NotFound,
    #[error("source store error: {0}")]
    SourceStore(#[from] dem_store::Error),
    #[error("artifact store error: {0}")]
    ArtifactStore(#[from] artifact_store::Error),
    #[error("codec error: {0}")]
    Codec(#[from] tile_codec::Error),
    #[error("png encoding failed: {0}")]
    PngEncode(String),
    #[error("request queue is full")]
    Overloaded,
    #[error("request exceeded its deadline")]
    Timeout,
    #[error("internal engine error: {0}")]
    Internal(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Error::NotFound => ErrorKind::NotFound,
            Error::SourceStore(_) | Error::ArtifactStore(_) => ErrorKind::StoreUnavailable,
            Error::Codec(_) | Error::PngEncode(_) | Error::Internal(_) => ErrorKind::Internal,
            Error::Overloaded => ErrorKind::Overloaded,
            Error::Timeout => ErrorKind::Timeout,
        }
    }
}
