//! Benchmarks for labeling, polygonization and classification

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use burnscar_algorithms::classification::{
    classify_chunked, BandMapping, ChunkParams, LogisticModel, MinMaxScaler,
};
use burnscar_algorithms::segmentation::label_regions;
use burnscar_algorithms::vector::polygonize;
use burnscar_core::raster::{Connectivity, GeoTransform, MultiBandRaster, Raster};
use burnscar_core::CRS;
use ndarray::Array3;

/// Patchy mask: blobs of varying size with holes and diagonal contacts
fn create_test_mask(size: usize) -> Raster<u8> {
    let mut r = Raster::new(size, size);
    r.set_transform(GeoTransform::new(500_000.0, 5_000_000.0, 10.0, -10.0));
    r.set_crs(Some(CRS::utm(33, true)));
    for row in 0..size {
        for col in 0..size {
            let v = (row * 7 + col * 13 + (row / 5) * (col / 5)) % 11;
            r.set(row, col, u8::from(v < 4)).unwrap();
        }
    }
    r
}

fn create_test_image(size: usize, bands: usize) -> MultiBandRaster<f32> {
    let data = Array3::from_shape_fn((bands, size, size), |(b, r, c)| {
        ((r * 31 + c * 17 + b * 7) % 1000) as f32 / 1000.0
    });
    MultiBandRaster::from_array(data)
}

fn bench_label(c: &mut Criterion) {
    let mut group = c.benchmark_group("vectorize/label");
    for size in [256, 512, 1024] {
        let mask = create_test_mask(size);
        for conn in [Connectivity::Four, Connectivity::Eight] {
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", conn), size),
                &size,
                |b, _| b.iter(|| label_regions(black_box(&mask), conn).unwrap()),
            );
        }
    }
    group.finish();
}

fn bench_polygonize(c: &mut Criterion) {
    let mut group = c.benchmark_group("vectorize/polygonize");
    for size in [256, 512, 1024] {
        let regions = label_regions(&create_test_mask(size), Connectivity::Four).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| polygonize(black_box(&regions)).unwrap())
        });
    }
    group.finish();
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("vectorize/classify");
    let names = ["b1", "b2", "b3", "b4"];
    let mapping = BandMapping::sequential(&names).unwrap();
    let feature_names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
    let scaler = MinMaxScaler::new(feature_names.clone(), vec![0.0; 4], vec![1.0; 4]).unwrap();
    let model = LogisticModel {
        feature_names,
        weights: vec![1.0, -1.0, 0.5, -0.5],
        intercept: 0.0,
        threshold: 0.5,
    };
    let image = create_test_image(1024, 4);

    for budget in [65_536, 262_144, 1_048_576] {
        let params = ChunkParams {
            max_pixels_per_chunk: budget,
            parallel: true,
        };
        group.bench_with_input(BenchmarkId::new("budget", budget), &budget, |b, _| {
            b.iter(|| classify_chunked(black_box(&image), &mapping, &scaler, &model, &params).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_label, bench_polygonize, bench_classify);
criterion_main!(benches);
