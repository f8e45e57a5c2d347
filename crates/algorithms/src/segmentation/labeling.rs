//! Connected-component labeling of burned pixels
//!
//! Every maximal connected run of burned (value 1) pixels receives a unique
//! positive id. Ids follow raster-scan order of each region's first pixel
//! (row-major, top-to-bottom, left-to-right), so downstream polygon ids are
//! reproducible.

use ndarray::Array2;
use std::collections::VecDeque;

use crate::classification::BURNED;
use burnscar_core::raster::{Connectivity, Raster};
use burnscar_core::{Algorithm, Error, Result};

/// Parameters for region labeling
#[derive(Debug, Clone, Default)]
pub struct LabelParams {
    /// Adjacency rule (default: 4-connectivity)
    pub connectivity: Connectivity,
}

/// Region labeling algorithm
#[derive(Debug, Clone, Default)]
pub struct RegionLabeler;

impl Algorithm for RegionLabeler {
    type Input = Raster<u8>;
    type Output = LabeledRegions;
    type Params = LabelParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "RegionLabeler"
    }

    fn description(&self) -> &'static str {
        "Label connected regions of burned pixels in raster-scan order"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        label_regions(&input, params.connectivity)
    }
}

/// Region ids for one mask, plus the rule that produced them.
///
/// The connectivity travels with the labels so the polygonizer can never
/// imply a stronger adjacency than the labeler used.
#[derive(Debug, Clone)]
pub struct LabeledRegions {
    /// Region id per pixel; 0 is background
    pub labels: Raster<u32>,
    /// Number of regions (ids are `1..=count`)
    pub count: usize,
    pub connectivity: Connectivity,
}

impl LabeledRegions {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Pixel count per region, indexed by `id - 1`
    pub fn region_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.count];
        for &id in self.labels.data().iter() {
            if id > 0 {
                sizes[id as usize - 1] += 1;
            }
        }
        sizes
    }
}

/// Label connected regions of burned pixels.
///
/// Pixels equal to 1 are foreground; everything else (including any other
/// class value) is background and stays 0 in the output. The output keeps
/// the mask's transform and CRS.
pub fn label_regions(mask: &Raster<u8>, connectivity: Connectivity) -> Result<LabeledRegions> {
    let (rows, cols) = mask.shape();
    let data = mask.data();
    let mut labels = Array2::<u32>::zeros((rows, cols));
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
    let offsets = connectivity.offsets();
    let mut next_id: u32 = 0;

    for row in 0..rows {
        for col in 0..cols {
            if data[(row, col)] != BURNED || labels[(row, col)] != 0 {
                continue;
            }

            next_id = next_id.checked_add(1).ok_or_else(|| {
                Error::Algorithm("region count exceeds u32 label range".into())
            })?;
            labels[(row, col)] = next_id;
            queue.push_back((row, col));

            while let Some((r, c)) = queue.pop_front() {
                for &(dr, dc) in offsets {
                    let nr = r as isize + dr;
                    let nc = c as isize + dc;
                    if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                        continue;
                    }
                    let (nr, nc) = (nr as usize, nc as usize);
                    if data[(nr, nc)] == BURNED && labels[(nr, nc)] == 0 {
                        labels[(nr, nc)] = next_id;
                        queue.push_back((nr, nc));
                    }
                }
            }
        }
    }

    Ok(LabeledRegions {
        labels: mask.derive(labels)?,
        count: next_id as usize,
        connectivity,
    })
}
