//! Result assembly and reporting sample

use geo::Polygon;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::maybe_rayon::*;
use crate::vector::{MeasurementFrame, RegionPolygon};
use burnscar_core::vector::{Feature, FeatureCollection};
use burnscar_core::{Result, CRS};

/// One measured region
#[derive(Debug, Clone)]
pub struct PolygonRecord {
    /// 1-based, raster-scan discovery order
    pub id: u32,
    /// Geometry in the raster's native CRS
    pub geometry: Polygon<f64>,
    /// Ground area in square metres of the measurement CRS
    pub area: f64,
    /// WGS84 (longitude, latitude) of the centroid
    pub centroid: (f64, f64),
    pub pixel_count: usize,
}

/// Output table of one processed raster
#[derive(Debug, Clone)]
pub struct BurnSummary {
    pub records: Vec<PolygonRecord>,
    pub total_area: f64,
    /// Indices into `records`, in draw order
    pub sample: Vec<usize>,
    pub native_crs: CRS,
    pub measurement_crs: CRS,
}

impl BurnSummary {
    pub fn region_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sampled records, in draw order
    pub fn sampled(&self) -> impl Iterator<Item = &PolygonRecord> + '_ {
        self.sample.iter().filter_map(move |&i| self.records.get(i))
    }

    /// Native-CRS features with `id` and `area` properties
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let mut collection = FeatureCollection::new(Some(self.native_crs.clone()));
        for record in &self.records {
            let mut feature = Feature::new(record.geometry.clone()).with_id(u64::from(record.id));
            feature.set_property("id", i64::from(record.id));
            feature.set_property("area", record.area);
            collection.push(feature);
        }
        collection
    }
}

/// `min(cap, floor(0.1 * count))`
pub fn sample_size(count: usize, cap: usize) -> usize {
    cap.min(count / 10)
}

/// Seeded draw of distinct indices in `0..count`
pub fn select_sample(count: usize, cap: usize, seed: u64) -> Vec<usize> {
    let amount = sample_size(count, cap);
    if amount == 0 {
        return Vec::new();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    rand::seq::index::sample(&mut rng, count, amount).into_vec()
}

/// Measure every polygon in `frame` and build the output table.
///
/// Zero polygons is a valid result: no records, zero area, empty sample.
pub fn assemble(
    polygons: Vec<RegionPolygon>,
    frame: &MeasurementFrame,
    sample_cap: usize,
    sample_seed: u64,
) -> Result<BurnSummary> {
    let mut records = polygons
        .into_par_iter()
        .map(|region| {
            let area = frame.area(&region.polygon)?;
            let centroid = frame.centroid_lon_lat(&region.polygon)?;
            Ok(PolygonRecord {
                id: region.id,
                geometry: region.polygon,
                area,
                centroid,
                pixel_count: region.pixel_count,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    records.sort_by_key(|r| r.id);

    let total_area = records.iter().map(|r| r.area).sum();
    let sample = select_sample(records.len(), sample_cap, sample_seed);

    Ok(BurnSummary {
        records,
        total_area,
        sample,
        native_crs: frame.native_crs().clone(),
        measurement_crs: frame.projected_crs().clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use burnscar_core::vector::AttributeValue;
    use geo::polygon;

    fn square(id: u32, x0: f64, y0: f64, side: f64) -> RegionPolygon {
        RegionPolygon {
            id,
            polygon: polygon![
                (x: x0, y: y0),
                (x: x0 + side, y: y0),
                (x: x0 + side, y: y0 + side),
                (x: x0, y: y0 + side),
                (x: x0, y: y0),
            ],
            pixel_count: 1,
        }
    }

    fn utm_frame() -> MeasurementFrame {
        MeasurementFrame::derive(&CRS::utm(33, true), (400_000.0, 5_000_000.0, 410_000.0, 5_010_000.0)).unwrap()
    }

    #[test]
    fn test_sample_size() {
        assert_eq!(sample_size(0, 5), 0);
        assert_eq!(sample_size(9, 5), 0);
        assert_eq!(sample_size(10, 5), 1);
        assert_eq!(sample_size(37, 5), 3);
        assert_eq!(sample_size(1000, 5), 5);
        assert_eq!(sample_size(1000, 0), 0);
    }

    #[test]
    fn test_sample_is_distinct_and_in_range() {
        for count in [0, 5, 10, 24, 50, 51, 200, 10_000] {
            let sample = select_sample(count, 5, 7);
            assert_eq!(sample.len(), sample_size(count, 5));
            let mut sorted = sample.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), sample.len());
            assert!(sample.iter().all(|&i| i < count));
        }
    }

    #[test]
    fn test_sample_is_seeded() {
        assert_eq!(select_sample(500, 5, 42), select_sample(500, 5, 42));
        let draws: Vec<_> = (0..8).map(|seed| select_sample(500, 5, seed)).collect();
        assert!(draws.iter().any(|d| d != &draws[0]));
    }

    #[test]
    fn test_assemble_totals_and_order() {
        let frame = utm_frame();
        let polygons = vec![
            square(2, 402_000.0, 5_002_000.0, 20.0),
            square(1, 401_000.0, 5_001_000.0, 10.0),
        ];
        let summary = assemble(polygons, &frame, 5, 42).unwrap();

        assert_eq!(summary.region_count(), 2);
        assert_eq!(summary.records[0].id, 1);
        assert_relative_eq!(summary.records[0].area, 100.0, max_relative = 1e-9);
        assert_relative_eq!(summary.total_area, 500.0, max_relative = 1e-9);
        assert!(summary.sample.is_empty());
        assert_eq!(summary.measurement_crs, CRS::utm(33, true));
    }

    #[test]
    fn test_assemble_empty() {
        let summary = assemble(Vec::new(), &utm_frame(), 5, 42).unwrap();
        assert!(summary.is_empty());
        assert_eq!(summary.total_area, 0.0);
        assert!(summary.sample.is_empty());
        assert!(summary.to_feature_collection().is_empty());
    }

    #[test]
    fn test_feature_collection_keeps_native_crs() {
        let summary = assemble(vec![square(1, 401_000.0, 5_001_000.0, 30.0)], &utm_frame(), 5, 42).unwrap();
        let fc = summary.to_feature_collection();
        assert_eq!(fc.crs, Some(CRS::utm(33, true)));
        let feature = &fc.features[0];
        assert_eq!(feature.get_property("id"), Some(&AttributeValue::Int(1)));
        match feature.get_property("area") {
            Some(AttributeValue::Float(a)) => assert_relative_eq!(*a, 900.0, max_relative = 1e-9),
            other => panic!("unexpected area {:?}", other),
        }
    }
}
