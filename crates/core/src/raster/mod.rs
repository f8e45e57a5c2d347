//! Raster data structures and operations

mod connectivity;
mod element;
mod geotransform;
mod grid;
mod multiband;

pub use connectivity::Connectivity;
pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
pub use multiband::MultiBandRaster;
