//! Multi-band raster stacks

use std::ops::Range;

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use ndarray::{s, Array2, Array3, ArrayView2, Axis};

/// A georeferenced stack of co-registered bands.
///
/// Samples are stored band-major as `(band, row, col)`. Band indices in the
/// public API are 1-based, matching raster file conventions.
#[derive(Debug, Clone)]
pub struct MultiBandRaster<T: RasterElement> {
    data: Array3<T>,
    transform: GeoTransform,
    crs: Option<CRS>,
}

impl<T: RasterElement> MultiBandRaster<T> {
    /// Wrap a `(band, row, col)` array
    pub fn from_array(data: Array3<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
        }
    }

    /// Stack same-shaped single-band arrays in band order
    pub fn from_bands(bands: &[Array2<T>]) -> Result<Self> {
        let first = bands.first().ok_or(Error::InvalidDimensions {
            width: 0,
            height: 0,
        })?;
        let (rows, cols) = first.dim();
        let mut data = Array3::zeros((bands.len(), rows, cols));
        for (i, band) in bands.iter().enumerate() {
            if band.dim() != (rows, cols) {
                let (ar, ac) = band.dim();
                return Err(Error::SizeMismatch { er: rows, ec: cols, ar, ac });
            }
            data.index_axis_mut(Axis(0), i).assign(band);
        }
        Ok(Self::from_array(data))
    }

    /// Build from pixel-interleaved samples (`rows * cols * bands` values,
    /// all bands of a pixel adjacent), as decoded from a chunky TIFF.
    pub fn from_interleaved(samples: Vec<T>, rows: usize, cols: usize, bands: usize) -> Result<Self> {
        if bands == 0 || samples.len() != rows * cols * bands {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        let interleaved = Array3::from_shape_vec((rows, cols, bands), samples)
            .map_err(|e| Error::Other(e.to_string()))?;
        let data = interleaved.permuted_axes([2, 0, 1]).as_standard_layout().to_owned();
        Ok(Self::from_array(data))
    }

    pub fn band_count(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn rows(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn cols(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    /// View of one band (1-based index)
    pub fn band(&self, index: usize) -> Result<ArrayView2<'_, T>> {
        if index == 0 || index > self.band_count() {
            return Err(Error::InvalidParameter {
                name: "band",
                value: index.to_string(),
                reason: format!("raster has {} bands", self.band_count()),
            });
        }
        Ok(self.data.index_axis(Axis(0), index - 1))
    }

    /// Copy one band out as a single-band raster with the same georeference
    pub fn band_raster(&self, index: usize) -> Result<Raster<T>> {
        let mut raster = Raster::from_array(self.band(index)?.to_owned());
        raster.set_transform(self.transform);
        raster.set_crs(self.crs.clone());
        Ok(raster)
    }

    /// Flatten a row range into a per-pixel table.
    ///
    /// Output has one row per pixel (row-major within the range) and one
    /// column per band, in band order.
    pub fn pixel_table(&self, rows: Range<usize>) -> Result<Array2<f64>> {
        if rows.start > rows.end || rows.end > self.rows() {
            return Err(Error::IndexOutOfBounds {
                row: rows.end,
                col: 0,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        let window = self.data.slice(s![.., rows.clone(), ..]);
        let n_pixels = rows.len() * self.cols();
        let mut table = Array2::zeros((n_pixels, self.band_count()));

        for (b, band) in window.axis_iter(Axis(0)).enumerate() {
            let mut column = table.column_mut(b);
            for (dst, &v) in column.iter_mut().zip(band.iter()) {
                *dst = v.to_f64().unwrap_or(f64::NAN);
            }
        }
        Ok(table)
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// Bounds (min_x, min_y, max_x, max_y) in native CRS units
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }
}
