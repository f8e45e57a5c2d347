//! Band-to-feature schema and per-chunk normalization
//!
//! Raster bands are bound to classifier feature names through an explicit
//! table, validated when the configuration is loaded. A chunk of raw band
//! values (one row per pixel, one column per raster band) is reordered into
//! the scaler's feature order and scaled.

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::scaler::Scaler;
use burnscar_core::{Error, Result};

/// One entry of the band table: raster band (1-based) → feature name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandFeature {
    pub band: usize,
    pub name: String,
}

/// Declared mapping from raster band indices to feature names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BandMapping {
    features: Vec<BandFeature>,
}

/// Post-fire Sentinel-2 band stack, in file band order
const SENTINEL2_POST_FIRE: [&str; 9] = [
    "Band_3_Post",
    "Band_4_Post",
    "Band_5_Post",
    "Band_6_Post",
    "Band_7_Post",
    "Band_8_Post",
    "Band_8A_Post",
    "Band_9_Post",
    "Band_12_Post",
];

impl BandMapping {
    /// Build and validate a mapping
    pub fn new(features: Vec<BandFeature>) -> Result<Self> {
        let mapping = Self { features };
        mapping.validate()?;
        Ok(mapping)
    }

    /// Map `names` to bands 1..=n in order
    pub fn sequential<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        Self::new(
            names
                .iter()
                .enumerate()
                .map(|(i, name)| BandFeature {
                    band: i + 1,
                    name: name.as_ref().to_string(),
                })
                .collect(),
        )
    }

    /// The nine-band post-fire Sentinel-2 stack (bands 3, 4, 5, 6, 7, 8, 8A,
    /// 9 and 12) as raster bands 1..=9
    pub fn sentinel2_post_fire() -> Self {
        Self {
            features: SENTINEL2_POST_FIRE
                .iter()
                .enumerate()
                .map(|(i, name)| BandFeature {
                    band: i + 1,
                    name: (*name).to_string(),
                })
                .collect(),
        }
    }

    /// Reject empty tables, band 0, and duplicated bands or names
    pub fn validate(&self) -> Result<()> {
        let invalid = |value: String, reason: &str| Error::InvalidParameter {
            name: "bands",
            value,
            reason: reason.to_string(),
        };

        if self.features.is_empty() {
            return Err(invalid("[]".into(), "band table is empty"));
        }
        let mut bands = HashSet::new();
        let mut names = HashSet::new();
        for f in &self.features {
            if f.band == 0 {
                return Err(invalid(f.name.clone(), "band indices are 1-based"));
            }
            if !bands.insert(f.band) {
                return Err(invalid(f.band.to_string(), "band mapped more than once"));
            }
            if !names.insert(f.name.as_str()) {
                return Err(invalid(f.name.clone(), "feature name mapped more than once"));
            }
        }
        Ok(())
    }

    pub fn features(&self) -> &[BandFeature] {
        &self.features
    }

    /// Raster band bound to a feature name
    pub fn band_for(&self, name: &str) -> Option<usize> {
        self.features.iter().find(|f| f.name == name).map(|f| f.band)
    }

    /// Highest band index the mapping refers to
    pub fn max_band(&self) -> usize {
        self.features.iter().map(|f| f.band).max().unwrap_or(0)
    }

    /// Zero-based pixel-table columns holding `names`, in that order.
    ///
    /// Fails with `SchemaMismatch` when a name has no band or its band is
    /// beyond the raster's band count.
    pub fn columns_for<S: AsRef<str>>(&self, names: &[S], band_count: usize) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                let band = self.band_for(name).ok_or_else(|| {
                    Error::SchemaMismatch(format!("feature '{}' is not bound to any band", name))
                })?;
                if band > band_count {
                    return Err(Error::SchemaMismatch(format!(
                        "feature '{}' reads band {} but the raster has {} bands",
                        name, band, band_count
                    )));
                }
                Ok(band - 1)
            })
            .collect()
    }
}

impl Default for BandMapping {
    fn default() -> Self {
        Self::sentinel2_post_fire()
    }
}

/// Named per-pixel feature matrix (one row per pixel)
#[derive(Debug, Clone)]
pub struct FeatureTable {
    names: Vec<String>,
    values: Array2<f64>,
}

impl FeatureTable {
    pub fn new(names: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if values.ncols() != names.len() {
            return Err(Error::SchemaMismatch(format!(
                "{} feature names for {} columns",
                names.len(),
                values.ncols()
            )));
        }
        Ok(Self { names, values })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Number of pixels
    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.values.ncols()
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.values.row(i)
    }

    /// Fail unless columns are exactly `expected`, in order
    pub fn require_names(&self, expected: &[String]) -> Result<()> {
        if self.names != expected {
            return Err(Error::SchemaMismatch(format!(
                "expected features {:?}, got {:?}",
                expected, self.names
            )));
        }
        Ok(())
    }
}

/// Reorder a raw pixel table into the scaler's feature order and scale it.
///
/// `raw` has one column per raster band, in band order. The output has the
/// same number of rows and one column per scaler feature.
pub fn normalize_chunk(raw: &Array2<f64>, mapping: &BandMapping, scaler: &dyn Scaler) -> Result<FeatureTable> {
    let names = scaler.feature_names();
    let columns = mapping.columns_for(names, raw.ncols())?;

    let mut values = Array2::zeros((raw.nrows(), columns.len()));
    for (dst, &src) in columns.iter().enumerate() {
        values.column_mut(dst).assign(&raw.column(src));
    }
    scaler.transform(values.view_mut())?;

    FeatureTable::new(names.to_vec(), values)
}
