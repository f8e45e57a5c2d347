//! # Burnscar Algorithms
//!
//! Burned-area mapping from multi-band imagery.
//!
//! ## Modules
//!
//! - **classification**: band mapping, feature scaling, classifier models,
//!   memory-bounded row-band classification
//! - **segmentation**: connected-component labeling of burned pixels
//! - **vector**: polygonization and UTM area measurement
//! - **burn**: result assembly, sampling, reports, single-file pipeline
//!   and batch driver

pub mod burn;
pub mod classification;
pub(crate) mod maybe_rayon;
pub mod segmentation;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::burn::{
        assemble, discover_rasters, process_batch, process_file, vectorize_mask, BatchReporter,
        BurnSummary, PipelineConfig, PolygonRecord, TracingReporter,
    };
    pub use crate::classification::{
        classify_chunked, BandMapping, ChunkParams, Classifier, MinMaxScaler, ModelArtifact, Scaler,
    };
    pub use crate::segmentation::{label_regions, LabeledRegions};
    pub use crate::vector::{polygonize, MeasurementFrame, RegionPolygon};
    pub use burnscar_core::prelude::*;
}
