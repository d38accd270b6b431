use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("source directory {0:?} is empty or missing")]
    EmptySource(std::path::PathBuf),
}
