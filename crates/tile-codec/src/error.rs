use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
