//! Trained burn classifiers
//!
//! Models are loaded from JSON artifacts and only predict; training
//! happens elsewhere. Every model declares the feature names it was fitted
//! on, and prediction fails with `SchemaMismatch` if the incoming table
//! does not carry exactly those columns in that order.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::schema::FeatureTable;
use burnscar_core::{Error, Result};

/// Negative class
pub const UNBURNED: u8 = 0;
/// Positive class
pub const BURNED: u8 = 1;

/// A trained per-pixel binary classifier.
///
/// Read-only after loading and shared across chunks and files.
pub trait Classifier: Send + Sync {
    /// Feature names the model was fitted on, in column order
    fn feature_names(&self) -> &[String];

    /// One label in {0, 1} per table row
    fn predict(&self, features: &FeatureTable) -> Result<Vec<u8>>;
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn default_threshold() -> f64 {
    0.5
}

fn label_for(probability: f64, threshold: f64) -> u8 {
    if probability >= threshold {
        BURNED
    } else {
        UNBURNED
    }
}

/// Logistic regression: burned when `sigmoid(w·x + b) >= threshold`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub feature_names: Vec<String>,
    pub weights: Vec<f64>,
    pub intercept: f64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl LogisticModel {
    fn probability(&self, x: ArrayView1<'_, f64>) -> f64 {
        let z: f64 = self.weights.iter().zip(x.iter()).map(|(w, v)| w * v).sum();
        sigmoid(z + self.intercept)
    }

    fn validate(&self) -> Result<()> {
        if self.weights.len() != self.feature_names.len() {
            return Err(Error::Algorithm(format!(
                "{} weights for {} features",
                self.weights.len(),
                self.feature_names.len()
            )));
        }
        Ok(())
    }
}

impl Classifier for LogisticModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, features: &FeatureTable) -> Result<Vec<u8>> {
        features.require_names(&self.feature_names)?;
        Ok(features
            .values()
            .rows()
            .into_iter()
            .map(|row| label_for(self.probability(row), self.threshold))
            .collect())
    }
}

/// A class centroid in feature space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub label: u8,
    pub mean: Vec<f64>,
}

/// Minimum-distance classifier: each pixel takes the label of the nearest
/// centroid (Euclidean). Pixels with non-finite features are unburned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestCentroid {
    pub feature_names: Vec<String>,
    pub centroids: Vec<Centroid>,
}

impl NearestCentroid {
    fn validate(&self) -> Result<()> {
        if self.centroids.len() < 2 {
            return Err(Error::Algorithm(
                "minimum distance requires at least 2 centroids".into(),
            ));
        }
        let n = self.feature_names.len();
        for c in &self.centroids {
            if c.mean.len() != n {
                return Err(Error::Algorithm(format!(
                    "centroid for label {} has {} values, expected {}",
                    c.label,
                    c.mean.len(),
                    n
                )));
            }
            if c.label > BURNED {
                return Err(Error::Algorithm(format!("label {} is not 0 or 1", c.label)));
            }
        }
        Ok(())
    }

    fn nearest(&self, x: ArrayView1<'_, f64>) -> u8 {
        if x.iter().any(|v| !v.is_finite()) {
            return UNBURNED;
        }
        let mut best_dist = f64::INFINITY;
        let mut best_label = UNBURNED;
        for c in &self.centroids {
            let dist: f64 = c.mean.iter().zip(x.iter()).map(|(m, v)| (v - m).powi(2)).sum();
            if dist < best_dist {
                best_dist = dist;
                best_label = c.label;
            }
        }
        best_label
    }
}

impl Classifier for NearestCentroid {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, features: &FeatureTable) -> Result<Vec<u8>> {
        features.require_names(&self.feature_names)?;
        Ok(features
            .values()
            .rows()
            .into_iter()
            .map(|row| self.nearest(row))
            .collect())
    }
}

/// Node of a regression tree, stored in a flat array with the root at 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// `x[feature] <= threshold` goes left, otherwise (and NaN) right
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Children must point forward so evaluation always terminates
    fn validate(&self, n_features: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::Algorithm("empty tree".into()));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split { feature, left, right, .. } = *node {
                if feature >= n_features {
                    return Err(Error::Algorithm(format!(
                        "node {} splits on feature {} of {}",
                        i, feature, n_features
                    )));
                }
                for child in [left, right] {
                    if child <= i || child >= self.nodes.len() {
                        return Err(Error::Algorithm(format!(
                            "node {} has invalid child {}",
                            i, child
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn evaluate(&self, x: ArrayView1<'_, f64>) -> f64 {
        let mut i = 0;
        loop {
            match self.nodes[i] {
                TreeNode::Leaf { value } => return value,
                TreeNode::Split { feature, threshold, left, right } => {
                    i = if x[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

/// Gradient-boosted tree ensemble with a logistic link:
/// burned when `sigmoid(base_score + Σ tree(x)) >= threshold`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<RegressionTree>,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl TreeEnsemble {
    fn validate(&self) -> Result<()> {
        self.trees
            .iter()
            .try_for_each(|t| t.validate(self.feature_names.len()))
    }

    fn margin(&self, x: ArrayView1<'_, f64>) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.evaluate(x)).sum::<f64>()
    }
}

impl Classifier for TreeEnsemble {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, features: &FeatureTable) -> Result<Vec<u8>> {
        features.require_names(&self.feature_names)?;
        Ok(features
            .values()
            .rows()
            .into_iter()
            .map(|row| label_for(sigmoid(self.margin(row)), self.threshold))
            .collect())
    }
}

/// Serialized classifier, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Logistic(LogisticModel),
    NearestCentroid(NearestCentroid),
    TreeEnsemble(TreeEnsemble),
}

impl ModelArtifact {
    /// Load and validate a classifier from a JSON document
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let artifact_err = |reason: String| Error::Artifact {
            path: path.to_path_buf(),
            reason,
        };
        let text = std::fs::read_to_string(path).map_err(|e| artifact_err(e.to_string()))?;
        let model: Self = serde_json::from_str(&text).map_err(|e| artifact_err(e.to_string()))?;
        model.validate().map_err(|e| artifact_err(e.to_string()))?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            ModelArtifact::Logistic(m) => m.validate(),
            ModelArtifact::NearestCentroid(m) => m.validate(),
            ModelArtifact::TreeEnsemble(m) => m.validate(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelArtifact::Logistic(_) => "logistic",
            ModelArtifact::NearestCentroid(_) => "nearest_centroid",
            ModelArtifact::TreeEnsemble(_) => "tree_ensemble",
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            ModelArtifact::Logistic(m) => m,
            ModelArtifact::NearestCentroid(m) => m,
            ModelArtifact::TreeEnsemble(m) => m,
        }
    }
}

impl Classifier for ModelArtifact {
    fn feature_names(&self) -> &[String] {
        self.inner().feature_names()
    }

    fn predict(&self, features: &FeatureTable) -> Result<Vec<u8>> {
        self.inner().predict(features)
    }
}
