//! Vectorization of labeled regions
//!
//! - Polygonize: one pixel-aligned polygon (with holes) per region
//! - Measurements: UTM measurement frame, ground area, WGS84 centroids

mod measurements;
mod polygonize;

pub use measurements::{reproject_polygon, utm_zone_for, MeasurementFrame};
pub use polygonize::{polygonize, RegionPolygon};
