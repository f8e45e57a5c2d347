//! Region extraction from classified rasters

mod labeling;

pub use labeling::{label_regions, LabelParams, LabeledRegions, RegionLabeler};
