//! Batch driver with per-file failure isolation
//!
//! Progress and failures go to an injected [`BatchReporter`]; a failing
//! file is reported and the rest of the batch continues.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use super::config::PipelineConfig;
use super::pipeline::{process_file, FileOutcome};
use crate::classification::{Classifier, Scaler};
use crate::maybe_rayon::*;
use burnscar_core::{Error, Result};

/// Receives batch progress events; shared across worker threads
pub trait BatchReporter: Sync {
    fn file_started(&self, path: &Path);

    fn file_completed(&self, outcome: &FileOutcome);

    /// The file was processed but contains no burned regions
    fn empty_result(&self, path: &Path);

    fn file_failed(&self, path: &Path, error: &Error);
}

/// Reporter that forwards every event to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl BatchReporter for TracingReporter {
    fn file_started(&self, path: &Path) {
        info!("Processing {}", path.display());
    }

    fn file_completed(&self, outcome: &FileOutcome) {
        info!(
            "Finished {}: {} regions, {:.1} m²",
            outcome.input.display(),
            outcome.summary.region_count(),
            outcome.summary.total_area
        );
    }

    fn empty_result(&self, path: &Path) {
        warn!("{}: empty result, no burned regions", path.display());
    }

    fn file_failed(&self, path: &Path, error: &Error) {
        error!("{} failed [{}]: {}", path.display(), error.kind(), error);
    }
}

/// Outcome of every file in a batch, in input order
#[derive(Debug)]
pub struct BatchResult {
    pub results: Vec<(PathBuf, Result<FileOutcome>)>,
}

impl BatchResult {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn all_failed(&self) -> bool {
        !self.results.is_empty() && self.succeeded() == 0
    }

    pub fn total_area(&self) -> f64 {
        self.outcomes().map(|o| o.summary.total_area).sum()
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &FileOutcome> + '_ {
        self.results.iter().filter_map(|(_, r)| r.as_ref().ok())
    }
}

/// Recursively find raster files under `dir` accepted by the config's
/// extension and name filters, sorted by path
pub fn discover_rasters(dir: &Path, config: &PipelineConfig) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| config.accepts(name))
            {
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}

/// Process every file, writing outputs into `out_dir`.
///
/// Each file's error is caught, handed to the reporter and recorded; it
/// never stops the remaining files.
pub fn process_batch(
    files: &[PathBuf],
    out_dir: &Path,
    config: &PipelineConfig,
    scaler: &dyn Scaler,
    classifier: &dyn Classifier,
    reporter: &dyn BatchReporter,
) -> BatchResult {
    let run_one = |path: &PathBuf| {
        reporter.file_started(path);
        let result = process_file(path, out_dir, config, scaler, classifier);
        match &result {
            Ok(outcome) => {
                if outcome.is_empty() {
                    reporter.empty_result(path);
                }
                reporter.file_completed(outcome);
            }
            Err(e) => reporter.file_failed(path, e),
        }
        (path.clone(), result)
    };

    let results: Vec<_> = if config.parallel_files {
        files.into_par_iter().map(run_one).collect()
    } else {
        files.iter().map(run_one).collect()
    };

    BatchResult { results }
}
