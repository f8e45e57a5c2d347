//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::classification::{BandMapping, ChunkParams};
use burnscar_core::raster::Connectivity;
use burnscar_core::{Error, Result};

/// Settings for one classification + vectorization run.
///
/// Every field has a default, so a JSON file only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on pixels classified per row band
    pub max_pixels_per_chunk: usize,
    /// Adjacency rule for region labeling and polygon boundaries
    pub connectivity: Connectivity,
    /// Most polygons in the reporting sample
    pub sample_cap: usize,
    /// Seed of the reporting sample draw
    pub sample_seed: u64,
    /// Classify row bands concurrently
    pub parallel_chunks: bool,
    /// Process batch files concurrently
    pub parallel_files: bool,
    /// File extensions recognized as rasters (without dot, case-insensitive)
    pub extensions: Vec<String>,
    /// A file name must contain one of these substrings; empty accepts all
    pub name_filters: Vec<String>,
    /// Raster band → feature name table
    pub bands: BandMapping,
    /// Write `<stem>_predicted.tif` next to the vector output
    pub write_label_raster: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_pixels_per_chunk: 1_000_000,
            connectivity: Connectivity::Four,
            sample_cap: 5,
            sample_seed: 42,
            parallel_chunks: true,
            parallel_files: false,
            extensions: vec!["tif".into(), "tiff".into()],
            name_filters: Vec::new(),
            bands: BandMapping::default(),
            write_label_raster: true,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a JSON configuration file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_pixels_per_chunk == 0 {
            return Err(Error::InvalidParameter {
                name: "max_pixels_per_chunk",
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }
        if self.extensions.iter().all(|e| e.trim_start_matches('.').is_empty()) {
            return Err(Error::InvalidParameter {
                name: "extensions",
                value: format!("{:?}", self.extensions),
                reason: "at least one raster extension is required".into(),
            });
        }
        self.bands.validate()
    }

    pub fn chunk_params(&self) -> ChunkParams {
        ChunkParams {
            max_pixels_per_chunk: self.max_pixels_per_chunk,
            parallel: self.parallel_chunks,
        }
    }

    /// Whether a file name passes the extension and name filters
    pub fn accepts(&self, file_name: &str) -> bool {
        let ext_ok = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|want| want.trim_start_matches('.').eq_ignore_ascii_case(ext))
            });
        let name_ok = self.name_filters.is_empty()
            || self.name_filters.iter().any(|f| file_name.contains(f.as_str()));
        ext_ok && name_ok
    }
}
