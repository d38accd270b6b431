pub type Result<T = ()> = std::result::Result<T, Error>;

mod cell;
pub mod coordinate;
pub mod crs;
mod error;
mod georeference;
mod geotransform;
mod latlonbounds;
mod nodata;
mod point;
mod rastersize;
mod rect;
mod tile;
pub mod tileutils;

#[doc(inline)]
pub use cell::{Cell, CellIterator};
#[doc(inline)]
pub use coordinate::Coordinate;
#[doc(inline)]
pub use error::Error;
#[doc(inline)]
pub use georeference::GeoReference;
#[doc(inline)]
pub use geotransform::GeoTransform;
#[doc(inline)]
pub use latlonbounds::LatLonBounds;
#[doc(inline)]
pub use nodata::Nodata;
#[doc(inline)]
pub use point::Point;
#[doc(inline)]
pub use rastersize::{Columns, RasterSize, Rows};
#[doc(inline)]
pub use rect::Rect;
#[doc(inline)]
pub use tile::Tile;
