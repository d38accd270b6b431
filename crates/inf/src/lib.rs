pub use error::Error;
pub type Result<T = ()> = std::result::Result<T, Error>;

pub mod cast;
pub mod color;
pub mod duration;
mod error;

#[doc(inline)]
pub use color::Color;
