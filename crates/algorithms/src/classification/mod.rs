//! Burned/unburned pixel classification
//!
//! - **Schema**: explicit band → feature-name table and chunk normalization
//! - **Scaler**: fitted min-max feature scaling
//! - **Model**: trained classifiers loaded from JSON artifacts
//! - **Chunked**: memory-bounded, row-band parallel classification

mod chunked;
mod model;
mod scaler;
mod schema;

pub use chunked::{classify_chunked, BandSource, ChunkParams, RowBands};
pub use model::{
    Centroid, Classifier, LogisticModel, ModelArtifact, NearestCentroid, RegressionTree,
    TreeEnsemble, TreeNode, BURNED, UNBURNED,
};
pub use scaler::{MinMaxScaler, Scaler};
pub use schema::{normalize_chunk, BandFeature, BandMapping, FeatureTable};
