//! Single-file pipeline: classify → label → polygonize → measure → write

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::config::PipelineConfig;
use super::report::BurnReport;
use super::summary::{assemble, BurnSummary};
use crate::classification::{classify_chunked, BandSource, Classifier, Scaler, BURNED, UNBURNED};
use crate::segmentation::label_regions;
use crate::vector::{polygonize, MeasurementFrame};
use burnscar_core::io::{read_geotiff, write_geojson, write_label_geotiff, GeoTiffReader};
use burnscar_core::raster::Raster;
use burnscar_core::{Error, Result};

/// Files written for one input raster
#[derive(Debug, Clone)]
pub struct FileOutputs {
    pub label_raster: Option<PathBuf>,
    pub vector: PathBuf,
    pub report: PathBuf,
}

/// Result of one processed raster
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub summary: BurnSummary,
    pub report: BurnReport,
    pub outputs: FileOutputs,
}

impl FileOutcome {
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty()
    }
}

/// Classify a band source with the configured chunking
pub fn classify_source<S: BandSource>(
    source: &S,
    config: &PipelineConfig,
    scaler: &dyn Scaler,
    classifier: &dyn Classifier,
) -> Result<Raster<u8>> {
    classify_chunked(source, &config.bands, scaler, classifier, &config.chunk_params())
}

/// Classify a multi-band raster file into a {0, 1} label raster.
///
/// The file is read one row band at a time; only the label raster is held
/// whole in memory.
pub fn classify_file<P: AsRef<Path>>(
    input: P,
    config: &PipelineConfig,
    scaler: &dyn Scaler,
    classifier: &dyn Classifier,
) -> Result<Raster<u8>> {
    let input = input.as_ref();
    let source = GeoTiffReader::open(input)?;
    let (rows, cols) = source.shape();
    debug!(
        "Opened {} ({}x{}, {} bands, {}-row chunks)",
        input.display(),
        cols,
        rows,
        source.band_count(),
        source.chunk_height()
    );
    classify_source(&source, config, scaler, classifier)
}

/// Label, polygonize and measure a {0, 1} mask.
///
/// A mask without burned pixels is a valid, empty summary.
pub fn vectorize_mask(mask: &Raster<u8>, config: &PipelineConfig) -> Result<BurnSummary> {
    let frame = MeasurementFrame::for_raster(mask)?;
    let regions = label_regions(mask, config.connectivity)?;
    let polygons = polygonize(&regions)?;
    if polygons.len() != regions.count {
        return Err(Error::Algorithm(format!(
            "{} regions produced {} polygons",
            regions.count,
            polygons.len()
        )));
    }
    debug!(
        "{} regions, measuring in {} (zone {}{})",
        regions.count,
        frame.projected_crs(),
        frame.zone(),
        if frame.is_north() { "N" } else { "S" }
    );
    assemble(polygons, &frame, config.sample_cap, config.sample_seed)
}

/// Classify one raster file and write its label raster, polygons and
/// report into `out_dir`
pub fn process_file(
    input: &Path,
    out_dir: &Path,
    config: &PipelineConfig,
    scaler: &dyn Scaler,
    classifier: &dyn Classifier,
) -> Result<FileOutcome> {
    let mask = classify_file(input, config, scaler, classifier)?;
    finish(input, out_dir, &mask, config, config.write_label_raster)
}

/// Vectorize an already classified label raster (band 1, burned = 1)
pub fn polygonize_file(input: &Path, out_dir: &Path, config: &PipelineConfig) -> Result<FileOutcome> {
    let mask = read_geotiff::<u8, _>(input, Some(1))?;
    finish(input, out_dir, &mask, config, false)
}

fn finish(
    input: &Path,
    out_dir: &Path,
    mask: &Raster<u8>,
    config: &PipelineConfig,
    write_labels: bool,
) -> Result<FileOutcome> {
    let file_name = input
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Other(format!("invalid file name: {}", input.display())))?;
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);

    let burned = mask.count_equal(BURNED);
    let unburned = mask.count_equal(UNBURNED);
    info!("{}: {} burned, {} unburned pixels", file_name, burned, unburned);

    // Resolve the measurement frame before anything is written
    let summary = vectorize_mask(mask, config)?;
    if summary.is_empty() {
        warn!("{}: no burned regions", file_name);
    } else {
        info!(
            "{}: {} regions, total area {:.1} m²",
            file_name,
            summary.region_count(),
            summary.total_area
        );
    }

    fs::create_dir_all(out_dir)?;

    let label_raster = if write_labels {
        let path = out_dir.join(format!("{}_predicted.tif", stem));
        write_label_geotiff(mask, &path)?;
        Some(path)
    } else {
        None
    };

    let vector = out_dir.join(format!("{}.geojson", stem));
    write_geojson(&summary.to_feature_collection(), &vector)?;

    let report = BurnReport::new(file_name, &summary, burned, unburned);
    let report_path = out_dir.join(format!("{}_report.json", stem));
    report.write_json(&report_path)?;

    Ok(FileOutcome {
        input: input.to_path_buf(),
        summary,
        report,
        outputs: FileOutputs {
            label_raster,
            vector,
            report: report_path,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::{BandMapping, LogisticModel, MinMaxScaler};
    use burnscar_core::io::{read_multiband_geotiff, write_geotiff};
    use burnscar_core::raster::{Connectivity, GeoTransform};
    use burnscar_core::CRS;
    use ndarray::{array, Array2};

    fn utm_mask(data: ndarray::Array2<u8>) -> Raster<u8> {
        let mut mask = Raster::from_array(data);
        mask.set_transform(GeoTransform::new(500_000.0, 4_000_000.0, 10.0, -10.0));
        mask.set_crs(Some(CRS::utm(35, true)));
        mask
    }

    #[test]
    fn test_vectorize_mask_counts_and_areas() {
        let mask = utm_mask(array![
            [1, 1, 0, 0],
            [1, 1, 0, 1],
            [0, 0, 0, 1],
            [0, 0, 1, 0],
        ]);
        let four = vectorize_mask(&mask, &PipelineConfig::default()).unwrap();
        assert_eq!(four.region_count(), 3);
        assert!((four.total_area - 700.0).abs() < 1e-6);
        assert_eq!(four.records[0].pixel_count, 4);

        let config = PipelineConfig {
            connectivity: Connectivity::Eight,
            ..Default::default()
        };
        let eight = vectorize_mask(&mask, &config).unwrap();
        assert_eq!(eight.region_count(), 2);
        assert!((eight.total_area - 700.0).abs() < 1e-6);
    }

    #[test]
    fn test_vectorize_mask_without_crs() {
        let mask = Raster::from_array(array![[1u8, 0], [0, 0]]);
        let err = vectorize_mask(&mask, &PipelineConfig::default()).unwrap_err();
        assert_eq!(err.kind(), "crs-resolution");
    }

    #[test]
    fn test_polygonize_file_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("S2_20220410_T47QLA_predicted.tif");
        write_label_geotiff(&utm_mask(array![[1, 0, 0], [0, 0, 0], [0, 0, 1]]), &input).unwrap();

        let out = dir.path().join("out");
        let outcome = polygonize_file(&input, &out, &PipelineConfig::default()).unwrap();

        assert_eq!(outcome.summary.region_count(), 2);
        assert!(outcome.outputs.label_raster.is_none());
        assert!(outcome.outputs.vector.exists());
        assert!(outcome.outputs.report.exists());
        assert_eq!(outcome.report.burned_pixels, 2);
        assert_eq!(outcome.report.unburned_pixels, 7);
        assert_eq!(
            outcome.report.fire_date,
            chrono::NaiveDate::from_ymd_opt(2022, 4, 10)
        );
    }

    /// Burned where the value is 0 or 1 out of 0..=4
    fn value_setup() -> (PipelineConfig, MinMaxScaler, LogisticModel) {
        let config = PipelineConfig {
            bands: BandMapping::sequential(&["v"]).unwrap(),
            max_pixels_per_chunk: 18,
            ..Default::default()
        };
        let scaler = MinMaxScaler::new(vec!["v".into()], vec![0.0], vec![4.0]).unwrap();
        let model = LogisticModel {
            feature_names: vec!["v".into()],
            weights: vec![-20.0],
            intercept: 9.0,
            threshold: 0.5,
        };
        (config, scaler, model)
    }

    fn write_values(path: &Path, crs: Option<CRS>) {
        let data = Array2::from_shape_fn((12, 9), |(r, c)| ((r * 9 + c * 2) % 5) as f32);
        let mut values = Raster::from_array(data);
        values.set_transform(GeoTransform::new(500_000.0, 4_000_000.0, 10.0, -10.0));
        values.set_crs(crs);
        write_geotiff(&values, path).unwrap();
    }

    #[test]
    fn test_classify_file_matches_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("scene.tif");
        write_values(&input, Some(CRS::utm(35, true)));
        let (config, scaler, model) = value_setup();

        let streamed = classify_file(&input, &config, &scaler, &model).unwrap();
        let stack = read_multiband_geotiff::<f32, _>(&input).unwrap();
        let in_memory = classify_source(&stack, &config, &scaler, &model).unwrap();

        assert_eq!(streamed.data(), in_memory.data());
        assert_eq!(streamed.crs(), Some(&CRS::utm(35, true)));
        assert_eq!(streamed.transform(), in_memory.transform());
        assert!(streamed.count_equal(BURNED) > 0);
    }

    #[test]
    fn test_unresolvable_crs_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("scene.tif");
        write_values(&input, None);
        let (config, scaler, model) = value_setup();

        let out = dir.path().join("out");
        let err = process_file(&input, &out, &config, &scaler, &model).unwrap_err();
        assert_eq!(err.kind(), "crs-resolution");
        assert!(!out.join("scene_predicted.tif").exists());
        assert!(!out.join("scene.geojson").exists());
    }
}
