//! Burnscar CLI - burned-area mapping from multi-band imagery

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use burnscar_algorithms::burn::{
    classify_file, discover_rasters, polygonize_file, process_batch, process_file, BatchReporter,
    FileOutcome, PipelineConfig, TracingReporter,
};
use burnscar_algorithms::classification::{MinMaxScaler, ModelArtifact, BURNED, UNBURNED};
use burnscar_algorithms::vector::MeasurementFrame;
use burnscar_core::io::{read_multiband_geotiff, write_label_geotiff};
use burnscar_core::raster::Connectivity;
use burnscar_core::Error;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "burnscar")]
#[command(author, version, about = "Burned-area mapping: classify, polygonize, measure", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Classify a multi-band raster into a burned/unburned label raster
    Classify {
        /// Input multi-band raster
        input: PathBuf,
        /// Output label raster (u8 GeoTIFF)
        output: PathBuf,
        #[command(flatten)]
        artifacts: ArtifactArgs,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Vectorize a label raster (burned = 1) into measured polygons
    Polygonize {
        /// Input label raster
        input: PathBuf,
        /// Output directory
        out_dir: PathBuf,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Classify and vectorize one raster
    Run {
        /// Input multi-band raster
        input: PathBuf,
        /// Output directory
        out_dir: PathBuf,
        #[command(flatten)]
        artifacts: ArtifactArgs,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Classify and vectorize every raster found under a directory
    Batch {
        /// Directory searched recursively for rasters
        input_dir: PathBuf,
        /// Output directory
        out_dir: PathBuf,
        #[command(flatten)]
        artifacts: ArtifactArgs,
        #[command(flatten)]
        pipeline: PipelineArgs,
        /// Process files in parallel
        #[arg(long)]
        parallel_files: bool,
    },
}

#[derive(Args)]
struct ArtifactArgs {
    /// Fitted min-max scaler (JSON)
    #[arg(long)]
    scaler: PathBuf,
    /// Trained classifier (JSON)
    #[arg(long)]
    model: PathBuf,
}

#[derive(Args)]
struct PipelineArgs {
    /// Pipeline configuration (JSON); flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Maximum pixels classified per row band
    #[arg(long)]
    max_pixels: Option<usize>,
    /// Region connectivity: 4 or 8
    #[arg(long)]
    connectivity: Option<Connectivity>,
    /// Maximum number of sampled polygons in the report
    #[arg(long)]
    sample_cap: Option<usize>,
    /// Seed for the report sample
    #[arg(long)]
    seed: Option<u64>,
}

// ─── Helpers ────────────────────────────────────────────────────────────

impl PipelineArgs {
    fn load(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(max_pixels) = self.max_pixels {
            config.max_pixels_per_chunk = max_pixels;
        }
        if let Some(connectivity) = self.connectivity {
            config.connectivity = connectivity;
        }
        if let Some(cap) = self.sample_cap {
            config.sample_cap = cap;
        }
        if let Some(seed) = self.seed {
            config.sample_seed = seed;
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

impl ArtifactArgs {
    fn load(&self) -> Result<(MinMaxScaler, ModelArtifact)> {
        let pb = spinner("Loading scaler and model...");
        let scaler = MinMaxScaler::from_json_file(&self.scaler).context("Failed to load scaler")?;
        let model = ModelArtifact::from_json_file(&self.model).context("Failed to load model")?;
        pb.finish_and_clear();
        info!("Model: {} over {} features", model.name(), scaler.feature_names.len());
        Ok((scaler, model))
    }
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn print_outcome(outcome: &FileOutcome, elapsed: Duration) {
    let summary = &outcome.summary;
    println!("{}", outcome.input.display());
    println!("  Regions: {}", summary.region_count());
    println!("  Total area: {:.1} m² ({:.4} km²)", summary.total_area, summary.total_area / 1e6);
    println!("  Measured in: {}", summary.measurement_crs);
    if let Some(date) = outcome.report.fire_date {
        println!("  Fire date: {}", date);
    }
    for record in summary.sampled() {
        println!(
            "  Sample #{}: lat {:.6}, lon {:.6}, {:.1} m²",
            record.id, record.centroid.1, record.centroid.0, record.area
        );
    }
    if let Some(path) = &outcome.outputs.label_raster {
        println!("  Labels: {}", path.display());
    }
    println!("  Polygons: {}", outcome.outputs.vector.display());
    println!("  Report: {}", outcome.outputs.report.display());
    println!("  Processing time: {:.2?}", elapsed);
}

/// Batch reporter that logs through tracing and advances a progress bar
struct ProgressReporter {
    bar: ProgressBar,
    inner: TracingReporter,
}

impl BatchReporter for ProgressReporter {
    fn file_started(&self, path: &Path) {
        self.bar.set_message(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        self.bar.suspend(|| self.inner.file_started(path));
    }

    fn file_completed(&self, outcome: &FileOutcome) {
        self.bar.suspend(|| self.inner.file_completed(outcome));
        self.bar.inc(1);
    }

    fn empty_result(&self, path: &Path) {
        self.bar.suspend(|| self.inner.empty_result(path));
    }

    fn file_failed(&self, path: &Path, error: &Error) {
        self.bar.suspend(|| self.inner.file_failed(path, error));
        self.bar.inc(1);
    }
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Info { input } => {
            let raster = read_multiband_geotiff::<f64, _>(&input).context("Failed to read raster")?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, rows * cols);
            println!("Bands: {}", raster.band_count());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            match raster.crs() {
                Some(crs) => {
                    println!("CRS: {}", crs);
                    match MeasurementFrame::derive(crs, bounds) {
                        Ok(frame) => {
                            let (lon, lat) = frame.center();
                            println!("Center: lon {:.6}, lat {:.6}", lon, lat);
                            println!("Measurement CRS: {}", frame.projected_crs());
                        }
                        Err(e) => println!("Measurement CRS: unavailable ({})", e),
                    }
                }
                None => println!("CRS: none"),
            }

            for band in 1..=raster.band_count() {
                let stats = raster.band_raster(band)?.statistics();
                println!("\nBand {}:", band);
                if let (Some(min), Some(max)) = (stats.min, stats.max) {
                    println!("  Range: {:.4} .. {:.4}", min, max);
                }
                if let Some(mean) = stats.mean {
                    println!("  Mean: {:.4}", mean);
                }
                println!("  Valid cells: {}", stats.valid_count);
            }
        }

        Commands::Classify {
            input,
            output,
            artifacts,
            pipeline,
        } => {
            let config = pipeline.load()?;
            let (scaler, model) = artifacts.load()?;

            let start = Instant::now();
            let pb = spinner("Classifying...");
            let labels = classify_file(&input, &config, &scaler, &model).context("Classification failed")?;
            pb.finish_and_clear();
            write_label_geotiff(&labels, &output).context("Failed to write output")?;
            let elapsed = start.elapsed();

            println!("Labels saved to: {}", output.display());
            println!(
                "  Burned pixels: {}, unburned: {}",
                labels.count_equal(BURNED),
                labels.count_equal(UNBURNED)
            );
            println!("  Processing time: {:.2?}", elapsed);
        }

        Commands::Polygonize {
            input,
            out_dir,
            pipeline,
        } => {
            let config = pipeline.load()?;
            let start = Instant::now();
            let pb = spinner("Polygonizing...");
            let outcome = polygonize_file(&input, &out_dir, &config).context("Polygonization failed")?;
            pb.finish_and_clear();
            print_outcome(&outcome, start.elapsed());
        }

        Commands::Run {
            input,
            out_dir,
            artifacts,
            pipeline,
        } => {
            let config = pipeline.load()?;
            let (scaler, model) = artifacts.load()?;
            let start = Instant::now();
            let pb = spinner("Processing...");
            let outcome =
                process_file(&input, &out_dir, &config, &scaler, &model).context("Processing failed")?;
            pb.finish_and_clear();
            print_outcome(&outcome, start.elapsed());
        }

        Commands::Batch {
            input_dir,
            out_dir,
            artifacts,
            pipeline,
            parallel_files,
        } => {
            let mut config = pipeline.load()?;
            config.parallel_files |= parallel_files;
            let (scaler, model) = artifacts.load()?;

            let files = discover_rasters(&input_dir, &config)
                .with_context(|| format!("Failed to scan {}", input_dir.display()))?;
            if files.is_empty() {
                println!("No rasters found under {}", input_dir.display());
                return Ok(());
            }
            info!("Found {} rasters", files.len());

            let bar = ProgressBar::new(files.len() as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            let reporter = ProgressReporter {
                bar,
                inner: TracingReporter,
            };

            let start = Instant::now();
            let result = process_batch(&files, &out_dir, &config, &scaler, &model, &reporter);
            reporter.bar.finish_and_clear();

            println!("Processed {} files in {:.2?}", result.results.len(), start.elapsed());
            println!("  Succeeded: {}", result.succeeded());
            println!("  Failed: {}", result.failed());
            println!("  Total burned area: {:.1} m²", result.total_area());
            for (path, r) in &result.results {
                if let Err(e) = r {
                    println!("  {}: {}", path.display(), e);
                }
            }

            if result.all_failed() {
                bail!("all {} files failed", result.results.len());
            }
        }
    }

    Ok(())
}
