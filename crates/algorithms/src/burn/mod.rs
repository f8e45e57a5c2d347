//! Burned-area pipeline: per-file processing, result assembly, reports
//! and the batch driver

mod batch;
mod config;
mod pipeline;
mod report;
mod summary;

pub use batch::{discover_rasters, process_batch, BatchReporter, BatchResult, TracingReporter};
pub use config::PipelineConfig;
pub use pipeline::{
    classify_file, classify_source, polygonize_file, process_file, vectorize_mask, FileOutcome,
    FileOutputs,
};
pub use report::{fire_date_from_name, BurnReport, FireEvent, SampledPolygon};
pub use summary::{assemble, sample_size, select_sample, BurnSummary, PolygonRecord};
