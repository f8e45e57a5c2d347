//! Native GeoTIFF reading/writing using the `tiff` crate.
//!
//! Georeferencing is read from ModelPixelScale + ModelTiepoint, or from
//! ModelTransformation, and the CRS from the GeoKeyDirectory
//! (ProjectedCSTypeGeoKey / GeographicTypeGeoKey). Multi-band images must be
//! pixel-interleaved (PlanarConfiguration = 1). [`GeoTiffReader`] decodes
//! row windows strip by strip (or tile by tile) instead of whole images.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, MultiBandRaster, Raster, RasterElement};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::ops::Range;
use std::path::Path;
use std::sync::Mutex;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{Gray32Float, Gray8};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;
const USER_DEFINED: u16 = 32767;

/// Read one band (1-indexed, default 1) of a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    read_multiband_geotiff(path)?.band_raster(band.unwrap_or(1))
}

/// Read all bands of a GeoTIFF file
pub fn read_multiband_geotiff<T, P>(path: P) -> Result<MultiBandRaster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(BufReader::new(file))
}

/// Read all bands of a GeoTIFF held in memory
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<MultiBandRaster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
}

fn cast_samples<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or(T::default_nodata()))
        .collect()
}

fn decoded_samples<T: RasterElement>(result: DecodingResult) -> Result<Vec<T>> {
    let samples = match result {
        DecodingResult::U8(buf) => cast_samples(buf),
        DecodingResult::U16(buf) => cast_samples(buf),
        DecodingResult::U32(buf) => cast_samples(buf),
        DecodingResult::U64(buf) => cast_samples(buf),
        DecodingResult::I8(buf) => cast_samples(buf),
        DecodingResult::I16(buf) => cast_samples(buf),
        DecodingResult::I32(buf) => cast_samples(buf),
        DecodingResult::I64(buf) => cast_samples(buf),
        DecodingResult::F32(buf) => cast_samples(buf),
        DecodingResult::F64(buf) => cast_samples(buf),
        #[allow(unreachable_patterns)]
        _ => return Err(Error::UnsupportedDataType("Unsupported TIFF pixel format".to_string())),
    };
    Ok(samples)
}

fn decode_geotiff<T, R>(reader: R) -> Result<MultiBandRaster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader).map_err(|e| Error::invalid_data("TIFF decode error", e))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::invalid_data("Cannot read dimensions", e))?;
    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::invalid_data("Cannot read image data", e))?;
    let samples: Vec<T> = decoded_samples(result)?;

    let pixels = rows * cols;
    if pixels == 0 || samples.len() % pixels != 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }
    let bands = samples.len() / pixels;

    let mut raster = MultiBandRaster::from_interleaved(samples, rows, cols, bands)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));

    Ok(raster)
}

/// Windowed reader over a striped or tiled, pixel-interleaved GeoTIFF.
///
/// Only the strips or tiles that intersect a requested row range are
/// decoded, so memory follows the window size rather than the image size.
/// The decoder sits behind a mutex; concurrent windows decode one at a time.
pub struct GeoTiffReader<R: Read + Seek = BufReader<File>> {
    decoder: Mutex<Decoder<R>>,
    rows: usize,
    cols: usize,
    bands: usize,
    chunk_width: usize,
    chunk_height: usize,
    transform: GeoTransform,
    crs: Option<CRS>,
}

impl GeoTiffReader<BufReader<File>> {
    /// Open a GeoTIFF file; only the header and geo tags are read
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> GeoTiffReader<R> {
    pub fn new(reader: R) -> Result<Self> {
        let mut decoder =
            Decoder::new(reader).map_err(|e| Error::invalid_data("TIFF decode error", e))?;

        let (width, height) = decoder
            .dimensions()
            .map_err(|e| Error::invalid_data("Cannot read dimensions", e))?;
        let bands = decoder
            .find_tag_unsigned::<u16>(Tag::SamplesPerPixel)
            .map_err(|e| Error::invalid_data("Cannot read SamplesPerPixel", e))?
            .unwrap_or(1) as usize;
        let planar = decoder
            .find_tag_unsigned::<u16>(Tag::PlanarConfiguration)
            .map_err(|e| Error::invalid_data("Cannot read PlanarConfiguration", e))?
            .unwrap_or(1);
        if planar != 1 {
            return Err(Error::UnsupportedDataType(
                "band-sequential (planar) TIFF layout".to_string(),
            ));
        }

        let (chunk_width, chunk_height) = decoder.chunk_dimensions();
        let (rows, cols) = (height as usize, width as usize);
        if rows == 0 || cols == 0 || bands == 0 || chunk_width == 0 || chunk_height == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let transform = read_geotransform(&mut decoder).unwrap_or_default();
        let crs = read_crs(&mut decoder);

        Ok(Self {
            decoder: Mutex::new(decoder),
            rows,
            cols,
            bands,
            chunk_width: chunk_width as usize,
            chunk_height: chunk_height as usize,
            transform,
            crs,
        })
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn band_count(&self) -> usize {
        self.bands
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Rows of each strip or tile
    pub fn chunk_height(&self) -> usize {
        self.chunk_height
    }

    /// Pixel table for `rows`, laid out like
    /// [`MultiBandRaster::pixel_table`]: one row per pixel (row-major), one
    /// column per band.
    pub fn pixel_table(&self, rows: Range<usize>) -> Result<Array2<f64>> {
        if rows.start > rows.end || rows.end > self.rows {
            return Err(Error::IndexOutOfBounds {
                row: rows.end,
                col: 0,
                rows: self.rows,
                cols: self.cols,
            });
        }
        let mut table = Array2::from_elem((rows.len() * self.cols, self.bands), f64::NAN);
        if rows.is_empty() {
            return Ok(table);
        }

        let across = self.cols.div_ceil(self.chunk_width);
        let first = rows.start / self.chunk_height;
        let last = (rows.end - 1) / self.chunk_height;

        let mut decoder = self
            .decoder
            .lock()
            .map_err(|_| Error::Other("GeoTIFF decoder lock poisoned".to_string()))?;

        for chunk_row in first..=last {
            let row0 = chunk_row * self.chunk_height;
            let data_rows = self.chunk_height.min(self.rows - row0);
            for chunk_col in 0..across {
                let col0 = chunk_col * self.chunk_width;
                let data_cols = self.chunk_width.min(self.cols - col0);
                let index = u32::try_from(chunk_row * across + chunk_col)
                    .map_err(|e| Error::invalid_data("Chunk index out of range", e))?;

                let chunk = decoder
                    .read_chunk(index)
                    .map_err(|e| Error::invalid_data("Cannot read TIFF chunk", e))?;
                let samples: Vec<f64> = decoded_samples(chunk)?;
                if samples.len() != data_rows * data_cols * self.bands {
                    return Err(Error::invalid_data(
                        "Unexpected TIFF chunk size",
                        format!("chunk {} holds {} samples", index, samples.len()),
                    ));
                }

                let overlap = row0.max(rows.start)..(row0 + data_rows).min(rows.end);
                for row in overlap {
                    for c in 0..data_cols {
                        let src = ((row - row0) * data_cols + c) * self.bands;
                        let dst = (row - rows.start) * self.cols + col0 + c;
                        for b in 0..self.bands {
                            table[[dst, b]] = samples[src + b];
                        }
                    }
                }
            }
        }
        Ok(table)
    }
}

/// GeoTransform from ModelPixelScale + ModelTiepoint, or ModelTransformation
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok();
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok();

    if let (Some(scale), Some(tiepoint)) = (&scale, &tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
        }
    }

    // Row-major 4x4 matrix
    let t = decoder.get_tag_f64_vec(Tag::ModelTransformationTag).ok()?;
    if t.len() < 16 {
        return None;
    }
    Some(GeoTransform {
        origin_x: t[3],
        origin_y: t[7],
        pixel_width: t[0],
        pixel_height: t[5],
        row_rotation: t[1],
        col_rotation: t[4],
    })
}

/// EPSG code from the GeoKeyDirectory, projected key first
fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok()?;
    parse_geokeys(&keys)
}

fn parse_geokeys(keys: &[u16]) -> Option<CRS> {
    // Header: [version, revision, minor, count], then 4 shorts per key:
    // [key_id, tiff_tag_location, count, value_or_offset]
    let count = *keys.get(3)? as usize;
    let entries: Vec<&[u16]> = keys[4..].chunks_exact(4).take(count).collect();

    let inline_value = |wanted: u16| {
        entries
            .iter()
            .find(|e| e[0] == wanted && e[1] == 0)
            .map(|e| e[3])
            .filter(|&v| v != 0 && v != USER_DEFINED)
    };

    inline_value(PROJECTED_CS_TYPE_KEY)
        .or_else(|| inline_value(GEOGRAPHIC_TYPE_KEY))
        .map(|code| CRS::from_epsg(code as u32))
}

fn build_geokeys(crs: Option<&CRS>) -> Vec<u16> {
    let epsg = crs.and_then(|c| c.epsg()).and_then(|code| u16::try_from(code).ok());
    let geographic = crs
        .and_then(|c| c.projection().ok())
        .is_some_and(|p| p.is_geographic());

    // GTModelTypeGeoKey: 1 = projected, 2 = geographic
    let model_type = if geographic { 2 } else { 1 };
    let mut entries: Vec<[u16; 4]> = vec![
        [GT_MODEL_TYPE_KEY, 0, 1, model_type],
        [GT_RASTER_TYPE_KEY, 0, 1, 1], // RasterPixelIsArea
    ];
    if let Some(code) = epsg {
        let key = if geographic {
            GEOGRAPHIC_TYPE_KEY
        } else {
            PROJECTED_CS_TYPE_KEY
        };
        entries.push([key, 0, 1, code]);
    }

    let mut keys = vec![1, 1, 0, entries.len() as u16];
    keys.extend(entries.into_iter().flatten());
    keys
}

fn write_geo_tags<W, K>(
    dir: &mut DirectoryEncoder<'_, W, K>,
    gt: &GeoTransform,
    crs: Option<&CRS>,
) -> Result<()>
where
    W: Write + Seek,
    K: TiffKind,
{
    let tag_err = |e| Error::invalid_data("Cannot write GeoTIFF tag", e);

    if gt.row_rotation == 0.0 && gt.col_rotation == 0.0 {
        let scale = [gt.pixel_width, -gt.pixel_height, 0.0];
        dir.write_tag(Tag::ModelPixelScaleTag, &scale[..])
            .map_err(tag_err)?;
        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        dir.write_tag(Tag::ModelTiepointTag, &tiepoint[..])
            .map_err(tag_err)?;
    } else {
        let matrix = [
            gt.pixel_width, gt.row_rotation, 0.0, gt.origin_x,
            gt.col_rotation, gt.pixel_height, 0.0, gt.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        dir.write_tag(Tag::ModelTransformationTag, &matrix[..])
            .map_err(tag_err)?;
    }

    let geokeys = build_geokeys(crs);
    dir.write_tag(Tag::GeoKeyDirectoryTag, geokeys.as_slice())
        .map_err(tag_err)?;
    Ok(())
}

/// Write a Raster to a GeoTIFF file as 32-bit float
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_f32(raster, BufWriter::new(file))
}

/// Write a Raster to an in-memory 32-bit float GeoTIFF
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_f32(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

/// Write a class-label raster as an 8-bit GeoTIFF
pub fn write_label_geotiff<P: AsRef<Path>>(raster: &Raster<u8>, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))
        .map_err(|e| Error::invalid_data("TIFF encoder error", e))?;

    let (rows, cols) = raster.shape();
    let mut image = encoder
        .new_image::<Gray8>(cols as u32, rows as u32)
        .map_err(|e| Error::invalid_data("Cannot create TIFF image", e))?;

    write_geo_tags(image.encoder(), raster.transform(), raster.crs())?;

    let data: Vec<u8> = raster.data().iter().copied().collect();
    image
        .write_data(&data)
        .map_err(|e| Error::invalid_data("Cannot write image data", e))?;
    Ok(())
}

fn encode_f32<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder =
        TiffEncoder::new(writer).map_err(|e| Error::invalid_data("TIFF encoder error", e))?;

    let (rows, cols) = raster.shape();
    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| Error::invalid_data("Cannot create TIFF image", e))?;

    write_geo_tags(image.encoder(), raster.transform(), raster.crs())?;

    image
        .write_data(&data)
        .map_err(|e| Error::invalid_data("Cannot write image data", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::NamedTempFile;
    use tiff::encoder::colortype::RGB32Float;

    fn sample_raster() -> Raster<f32> {
        let mut raster: Raster<f32> = Raster::new(20, 30);
        raster.set_transform(GeoTransform::new(399_960.0, 1_600_020.0, 10.0, -10.0));
        raster.set_crs(Some(CRS::utm(47, true)));
        for row in 0..20 {
            for col in 0..30 {
                raster.set(row, col, (row * 30 + col) as f32).unwrap();
            }
        }
        raster
    }

    #[test]
    fn test_buffer_roundtrip_keeps_georeference() {
        let raster = sample_raster();
        let buf = write_geotiff_to_buffer(&raster).unwrap();
        let loaded: MultiBandRaster<f32> = read_geotiff_from_buffer(&buf).unwrap();

        assert_eq!(loaded.band_count(), 1);
        assert_eq!(loaded.shape(), raster.shape());
        assert_eq!(loaded.crs(), Some(&CRS::utm(47, true)));
        assert_relative_eq!(loaded.transform().origin_x, 399_960.0);
        assert_relative_eq!(loaded.transform().pixel_height, -10.0);
        assert_eq!(loaded.band(1).unwrap()[(7, 11)], 7.0 * 30.0 + 11.0);
    }

    #[test]
    fn test_label_file_roundtrip() {
        let mut mask: Raster<u8> = Raster::new(8, 8);
        mask.set_transform(GeoTransform::new(100.0, 14.0, 0.001, -0.001));
        mask.set_crs(Some(CRS::wgs84()));
        mask.set(2, 3, 1).unwrap();
        mask.set(5, 5, 1).unwrap();

        let tmp = NamedTempFile::with_suffix(".tif").unwrap();
        write_label_geotiff(&mask, tmp.path()).unwrap();

        let loaded: Raster<u8> = read_geotiff(tmp.path(), None).unwrap();
        assert_eq!(loaded.count_equal(1), 2);
        assert_eq!(loaded.get(2, 3).unwrap(), 1);
        assert_eq!(loaded.crs(), Some(&CRS::wgs84()));
    }

    #[test]
    fn test_geo_tags_survive_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        for code in [32635, 4326, 32647] {
            let mut mask: Raster<u8> = Raster::new(4, 5);
            mask.set_transform(GeoTransform::new(300_000.0, 2_100_000.0, 30.0, -30.0));
            mask.set_crs(Some(CRS::from_epsg(code)));
            let path = dir.path().join(format!("mask_{}.tif", code));
            write_label_geotiff(&mask, &path).unwrap();

            let loaded: Raster<u8> = read_geotiff(&path, None).unwrap();
            assert_eq!(loaded.crs(), Some(&CRS::from_epsg(code)));
            assert_relative_eq!(loaded.transform().origin_y, 2_100_000.0);
            assert_relative_eq!(loaded.transform().pixel_width, 30.0);

            let reader = GeoTiffReader::open(&path).unwrap();
            assert_eq!(reader.crs(), Some(&CRS::from_epsg(code)));
        }
    }

    /// 10x7 three-band float image in strips of 3 rows; sample = index
    fn write_striped(path: &Path) {
        let file = File::create(path).unwrap();
        let mut encoder = TiffEncoder::new(BufWriter::new(file)).unwrap();
        let mut image = encoder.new_image::<RGB32Float>(7, 10).unwrap();
        image.rows_per_strip(3).unwrap();
        write_geo_tags(
            image.encoder(),
            &GeoTransform::new(500_000.0, 4_000_000.0, 10.0, -10.0),
            Some(&CRS::utm(35, true)),
        )
        .unwrap();
        let data: Vec<f32> = (0..10 * 7 * 3).map(|i| i as f32).collect();
        image.write_data(&data).unwrap();
    }

    #[test]
    fn test_windowed_reads_match_full_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("striped.tif");
        write_striped(&path);

        let reader = GeoTiffReader::open(&path).unwrap();
        assert_eq!(reader.shape(), (10, 7));
        assert_eq!(reader.band_count(), 3);
        assert_eq!(reader.chunk_height(), 3);
        assert_eq!(reader.crs(), Some(&CRS::utm(35, true)));
        assert_relative_eq!(reader.transform().origin_x, 500_000.0);

        let full: MultiBandRaster<f32> = read_multiband_geotiff(&path).unwrap();
        for rows in [0..10, 0..3, 2..8, 5..6, 9..10, 4..4] {
            let window = reader.pixel_table(rows.clone()).unwrap();
            assert_eq!(window, full.pixel_table(rows.clone()).unwrap(), "rows {:?}", rows);
        }

        // Pixel (row 4, col 2), band 3
        let window = reader.pixel_table(4..5).unwrap();
        assert_eq!(window[[2, 2]], ((4 * 7 + 2) * 3 + 2) as f64);

        assert!(reader.pixel_table(8..11).is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_multiband_geotiff::<u16, _>("/nonexistent/scene.tif").unwrap_err();
        assert_eq!(err.kind(), "io");
    }

    #[test]
    fn test_geokeys_roundtrip() {
        let keys = build_geokeys(Some(&CRS::utm(33, false)));
        assert_eq!(parse_geokeys(&keys), Some(CRS::from_epsg(32733)));

        let keys = build_geokeys(Some(&CRS::wgs84()));
        assert_eq!(parse_geokeys(&keys), Some(CRS::wgs84()));

        assert_eq!(parse_geokeys(&build_geokeys(None)), None);
    }
}
