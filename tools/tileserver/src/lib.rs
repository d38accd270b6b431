mod apperror;
pub mod tileapihandler;

pub use apperror::AppError;

pub type Error = tile_engine::Error;
pub type Result<T> = tile_engine::Result<T>;
