//! Per-file fire-event report

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::summary::BurnSummary;
use burnscar_core::Result;

/// Fire date encoded in a scene file name: the second `_`-separated token,
/// whose first eight characters are `YYYYMMDD`.
///
/// `S2_20230115_T47QLA.tif` → 2023-01-15. Names without a parsable token
/// give `None`.
pub fn fire_date_from_name(file_name: &str) -> Option<NaiveDate> {
    let token = file_name.split('_').nth(1)?;
    let digits = token.get(..8)?;
    NaiveDate::parse_from_str(digits, "%Y%m%d").ok()
}

/// One sampled polygon as reported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledPolygon {
    pub id: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub area: f64,
}

/// One burned region as a dated fire event at its centroid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireEvent {
    pub id: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub area: f64,
    pub fire_date: Option<NaiveDate>,
}

/// Serializable summary of one processed raster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnReport {
    pub file: String,
    pub native_crs: String,
    pub measurement_crs: String,
    pub region_count: usize,
    pub total_area: f64,
    pub burned_pixels: usize,
    pub unburned_pixels: usize,
    pub fire_date: Option<NaiveDate>,
    /// Every region, in id order
    pub events: Vec<FireEvent>,
    pub sample: Vec<SampledPolygon>,
}

impl BurnReport {
    pub fn new(file_name: &str, summary: &BurnSummary, burned_pixels: usize, unburned_pixels: usize) -> Self {
        let fire_date = fire_date_from_name(file_name);
        let events = summary
            .records
            .iter()
            .map(|r| FireEvent {
                id: r.id,
                latitude: r.centroid.1,
                longitude: r.centroid.0,
                area: r.area,
                fire_date,
            })
            .collect();
        let sample = summary
            .sampled()
            .map(|r| SampledPolygon {
                id: r.id,
                latitude: r.centroid.1,
                longitude: r.centroid.0,
                area: r.area,
            })
            .collect();

        Self {
            file: file_name.to_string(),
            native_crs: summary.native_crs.identifier(),
            measurement_crs: summary.measurement_crs.identifier(),
            region_count: summary.region_count(),
            total_area: summary.total_area,
            burned_pixels,
            unburned_pixels,
            fire_date,
            events,
            sample,
        }
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::burn::summary::PolygonRecord;
    use burnscar_core::CRS;
    use geo::polygon;

    #[test]
    fn test_fire_date() {
        assert_eq!(
            fire_date_from_name("S2_20230115_T47QLA.tif"),
            NaiveDate::from_ymd_opt(2023, 1, 15)
        );
        assert_eq!(
            fire_date_from_name("mosaic_20190302T034531_T48.tif"),
            NaiveDate::from_ymd_opt(2019, 3, 2)
        );
        assert_eq!(fire_date_from_name("scene.tif"), None);
        assert_eq!(fire_date_from_name("S2_2023.tif"), None);
        assert_eq!(fire_date_from_name("S2_20231345_x.tif"), None);
    }

    fn record(id: u32, centroid: (f64, f64), area: f64) -> PolygonRecord {
        PolygonRecord {
            id,
            geometry: polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)],
            area,
            centroid,
            pixel_count: 4,
        }
    }

    #[test]
    fn test_report_json() {
        let summary = BurnSummary {
            records: vec![
                record(1, (101.5, 18.25), 400.0),
                record(2, (101.6, 18.30), 800.0),
                record(3, (101.7, 18.35), 1200.0),
            ],
            total_area: 2400.0,
            sample: vec![1],
            native_crs: CRS::wgs84(),
            measurement_crs: CRS::utm(47, true),
        };

        let report = BurnReport::new("S2_20230115_T47QLA.tif", &summary, 12, 88);
        assert_eq!(report.sample.len(), 1);
        assert_eq!(report.sample[0].id, 2);
        assert_eq!(report.sample[0].latitude, 18.30);

        // Every region is an event, sampled or not
        assert_eq!(report.events.len(), report.region_count);
        let ids: Vec<u32> = report.events.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(report.events[0].latitude, 18.25);
        assert_eq!(report.events[0].longitude, 101.5);
        assert!(report
            .events
            .iter()
            .all(|e| e.fire_date == NaiveDate::from_ymd_opt(2023, 1, 15)));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        report.write_json(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"fire_date\": \"2023-01-15\""));
        let back: BurnReport = serde_json::from_str(&text).unwrap();
        assert_eq!(back, report);
    }
}
