//! Memory-bounded classification of large rasters
//!
//! The image is cut into contiguous row bands of at most
//! `max_pixels_per_chunk` pixels. Each band is read, normalized, classified
//! and written into its own disjoint slice of the output, so bands can run
//! in parallel without synchronization and the result never depends on
//! the band size.

use ndarray::Array2;
use std::io::{Read, Seek};
use std::ops::Range;
use tracing::debug;

use super::model::{Classifier, BURNED};
use super::scaler::Scaler;
use super::schema::{normalize_chunk, BandMapping};
use crate::maybe_rayon::*;
use burnscar_core::io::GeoTiffReader;
use burnscar_core::raster::{GeoTransform, MultiBandRaster, Raster, RasterElement};
use burnscar_core::{Error, Result, CRS};

/// A multi-band image that can be read one row range at a time
pub trait BandSource: Sync {
    /// Dimensions as (rows, cols)
    fn shape(&self) -> (usize, usize);

    fn band_count(&self) -> usize;

    fn geo_transform(&self) -> GeoTransform;

    fn crs(&self) -> Option<&CRS>;

    /// Pixel table for `rows`: one row per pixel (row-major), one column
    /// per band in band order
    fn read_rows(&self, rows: Range<usize>) -> Result<Array2<f64>>;
}

impl<T: RasterElement> BandSource for MultiBandRaster<T> {
    fn shape(&self) -> (usize, usize) {
        MultiBandRaster::shape(self)
    }

    fn band_count(&self) -> usize {
        MultiBandRaster::band_count(self)
    }

    fn geo_transform(&self) -> GeoTransform {
        *self.transform()
    }

    fn crs(&self) -> Option<&CRS> {
        MultiBandRaster::crs(self)
    }

    fn read_rows(&self, rows: Range<usize>) -> Result<Array2<f64>> {
        self.pixel_table(rows)
    }
}

/// File-backed source: each row band decodes only its own strips or tiles
impl<R: Read + Seek + Send> BandSource for GeoTiffReader<R> {
    fn shape(&self) -> (usize, usize) {
        GeoTiffReader::shape(self)
    }

    fn band_count(&self) -> usize {
        GeoTiffReader::band_count(self)
    }

    fn geo_transform(&self) -> GeoTransform {
        *self.transform()
    }

    fn crs(&self) -> Option<&CRS> {
        GeoTiffReader::crs(self)
    }

    fn read_rows(&self, rows: Range<usize>) -> Result<Array2<f64>> {
        self.pixel_table(rows)
    }
}

/// Row-band partition of an image under a pixel budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBands {
    rows: usize,
    band_height: usize,
}

impl RowBands {
    /// Bands of `floor(max_pixels / cols)` rows; the last may be shorter.
    ///
    /// A budget smaller than one image row is rejected, since it would
    /// yield zero-height bands.
    pub fn new(rows: usize, cols: usize, max_pixels: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        if max_pixels < cols {
            return Err(Error::InvalidParameter {
                name: "max_pixels_per_chunk",
                value: max_pixels.to_string(),
                reason: format!("must be at least the image width ({})", cols),
            });
        }
        Ok(Self {
            rows,
            band_height: (max_pixels / cols).min(rows),
        })
    }

    pub fn band_height(&self) -> usize {
        self.band_height
    }

    /// Number of bands
    pub fn len(&self) -> usize {
        self.rows.div_ceil(self.band_height)
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Row range of band `index`
    pub fn range(&self, index: usize) -> Range<usize> {
        let start = (index * self.band_height).min(self.rows);
        start..(start + self.band_height).min(self.rows)
    }

    /// Bands in top-to-bottom order
    pub fn iter(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.len()).map(move |i| self.range(i))
    }
}

/// Parameters for chunked classification
#[derive(Debug, Clone)]
pub struct ChunkParams {
    /// Upper bound on pixels per row band (default: 1 000 000)
    pub max_pixels_per_chunk: usize,
    /// Classify bands concurrently (default: true)
    pub parallel: bool,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            max_pixels_per_chunk: 1_000_000,
            parallel: true,
        }
    }
}

/// Classify a whole image band by band into a {0, 1} label raster with the
/// source's transform and CRS.
///
/// A chunk whose bands do not cover the scaler's features fails with
/// `SchemaMismatch`; the first failing band aborts the image.
pub fn classify_chunked<S: BandSource>(
    source: &S,
    mapping: &BandMapping,
    scaler: &dyn Scaler,
    classifier: &dyn Classifier,
    params: &ChunkParams,
) -> Result<Raster<u8>> {
    let (rows, cols) = source.shape();
    let bands = RowBands::new(rows, cols, params.max_pixels_per_chunk)?;

    // Fail before reading anything if the schema cannot be satisfied
    mapping.columns_for(scaler.feature_names(), source.band_count())?;

    debug!(
        "Classifying {}x{} image in {} row bands of {} rows",
        cols,
        rows,
        bands.len(),
        bands.band_height()
    );

    let work = |(index, out): (usize, &mut [u8])| -> Result<()> {
        let range = bands.range(index);
        let raw = source.read_rows(range.clone())?;
        let features = normalize_chunk(&raw, mapping, scaler)?;
        let labels = classifier.predict(&features)?;

        if labels.len() != out.len() {
            return Err(Error::Algorithm(format!(
                "classifier returned {} labels for {} pixels in rows {:?}",
                labels.len(),
                out.len(),
                range
            )));
        }
        if let Some(bad) = labels.iter().find(|&&l| l > BURNED) {
            return Err(Error::Algorithm(format!(
                "classifier returned label {}, expected 0 or 1",
                bad
            )));
        }
        out.copy_from_slice(&labels);
        Ok(())
    };

    let mut labels = vec![0u8; rows * cols];
    let chunk_len = bands.band_height() * cols;
    if params.parallel {
        labels.par_chunks_mut(chunk_len).enumerate().try_for_each(work)?;
    } else {
        labels.chunks_mut(chunk_len).enumerate().try_for_each(work)?;
    }

    let mut raster = Raster::from_vec(labels, rows, cols)?;
    raster.set_transform(source.geo_transform());
    raster.set_crs(source.crs().cloned());
    Ok(raster)
}
