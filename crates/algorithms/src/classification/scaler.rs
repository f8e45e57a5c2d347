//! Fitted feature scalers

use ndarray::ArrayViewMut2;
use serde::{Deserialize, Serialize};
use std::path::Path;

use burnscar_core::{Error, Result};

/// A fitted per-feature transform applied before classification.
///
/// Implementations are read-only after loading and shared across chunks
/// and files.
pub trait Scaler: Send + Sync {
    /// Feature names in the column order `transform` expects
    fn feature_names(&self) -> &[String];

    /// Scale `values` (one row per pixel) in place
    fn transform(&self, values: ArrayViewMut2<'_, f64>) -> Result<()>;
}

fn default_feature_range() -> (f64, f64) {
    (0.0, 1.0)
}

/// Min-max scaler: maps each feature's fitted `[data_min, data_max]` onto
/// `feature_range`.
///
/// Features with zero fitted range get unit scale, so constant inputs are
/// shifted but never divided by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub feature_names: Vec<String>,
    pub data_min: Vec<f64>,
    pub data_max: Vec<f64>,
    #[serde(default = "default_feature_range")]
    pub feature_range: (f64, f64),
}

impl MinMaxScaler {
    pub fn new(feature_names: Vec<String>, data_min: Vec<f64>, data_max: Vec<f64>) -> Result<Self> {
        let scaler = Self {
            feature_names,
            data_min,
            data_max,
            feature_range: default_feature_range(),
        };
        scaler.validate()?;
        Ok(scaler)
    }

    /// Load a fitted scaler from a JSON document
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let artifact_err = |reason: String| Error::Artifact {
            path: path.to_path_buf(),
            reason,
        };
        let text = std::fs::read_to_string(path).map_err(|e| artifact_err(e.to_string()))?;
        let scaler: Self = serde_json::from_str(&text).map_err(|e| artifact_err(e.to_string()))?;
        scaler.validate().map_err(|e| artifact_err(e.to_string()))?;
        Ok(scaler)
    }

    pub fn validate(&self) -> Result<()> {
        let n = self.feature_names.len();
        if n == 0 {
            return Err(Error::Algorithm("scaler has no features".into()));
        }
        if self.data_min.len() != n || self.data_max.len() != n {
            return Err(Error::Algorithm(format!(
                "scaler has {} features but {} minima and {} maxima",
                n,
                self.data_min.len(),
                self.data_max.len()
            )));
        }
        let (lo, hi) = self.feature_range;
        if !lo.is_finite() || !hi.is_finite() || lo >= hi {
            return Err(Error::Algorithm(format!(
                "invalid feature range ({}, {})",
                lo, hi
            )));
        }
        Ok(())
    }

    /// Per-feature (scale, offset) so that `x * scale + offset` is the result
    fn coefficients(&self) -> Vec<(f64, f64)> {
        let (lo, hi) = self.feature_range;
        self.data_min
            .iter()
            .zip(&self.data_max)
            .map(|(&min, &max)| {
                let range = max - min;
                let range = if range == 0.0 { 1.0 } else { range };
                let scale = (hi - lo) / range;
                (scale, lo - min * scale)
            })
            .collect()
    }
}

impl Scaler for MinMaxScaler {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn transform(&self, mut values: ArrayViewMut2<'_, f64>) -> Result<()> {
        if values.ncols() != self.feature_names.len() {
            return Err(Error::SchemaMismatch(format!(
                "scaler expects {} features, chunk has {}",
                self.feature_names.len(),
                values.ncols()
            )));
        }
        for (mut column, (scale, offset)) in values.columns_mut().into_iter().zip(self.coefficients()) {
            column.mapv_inplace(|x| x * scale + offset);
        }
        Ok(())
    }
}
