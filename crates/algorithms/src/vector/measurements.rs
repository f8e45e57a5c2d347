//! Ground measurements of native-CRS polygons
//!
//! Areas are never taken in the raster's own CRS (degrees, or inflated Web
//! Mercator metres). A `MeasurementFrame` picks the UTM zone under the
//! raster's geographic center, and polygons are reprojected vertex by vertex
//! into it before measuring. Centroids are reported separately as WGS84
//! longitude/latitude.

use geo::{Area, Centroid, Coord, MapCoords, Polygon};

use burnscar_core::crs::{utm, CoordTransform};
use burnscar_core::raster::{Raster, RasterElement};
use burnscar_core::{Error, Result, CRS};

/// UTM zone and hemisphere for a geographic position: zone
/// `floor((lon + 180) / 6) + 1`, north when `lat >= 0`.
pub fn utm_zone_for(lon: f64, lat: f64) -> (u32, bool) {
    (utm::zone_for_longitude(lon), lat >= 0.0)
}

/// Reproject every ring vertex, keeping ring structure and holes
pub fn reproject_polygon(polygon: &Polygon<f64>, transform: &CoordTransform) -> Result<Polygon<f64>> {
    polygon.try_map_coords(|c| {
        let (x, y) = transform.transform(c.x, c.y)?;
        Ok(Coord { x, y })
    })
}

/// Local metric frame for measuring one raster's polygons
#[derive(Debug, Clone)]
pub struct MeasurementFrame {
    native: CRS,
    projected: CRS,
    zone: u32,
    north: bool,
    center: (f64, f64),
    to_projected: CoordTransform,
    to_geographic: CoordTransform,
}

impl MeasurementFrame {
    /// Derive the frame from a native CRS and its bounds
    /// `(min_x, min_y, max_x, max_y)`.
    ///
    /// Fails with `CrsResolution` when the CRS is unsupported, the extent is
    /// degenerate, or its center has no geographic position.
    pub fn derive(native: &CRS, bounds: (f64, f64, f64, f64)) -> Result<Self> {
        let (min_x, min_y, max_x, max_y) = bounds;
        let finite = [min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite());
        if !finite || max_x <= min_x || max_y <= min_y {
            return Err(Error::CrsResolution(format!(
                "degenerate extent {:?}",
                bounds
            )));
        }

        let to_geographic = CoordTransform::new(native, &CRS::wgs84())?;
        let center_x = (min_x + max_x) / 2.0;
        let center_y = (min_y + max_y) / 2.0;
        let (lon, lat) = to_geographic.transform(center_x, center_y)?;
        if !(-90.0..=90.0).contains(&lat) {
            return Err(Error::CrsResolution(format!(
                "extent center latitude {} is out of range",
                lat
            )));
        }

        let (zone, north) = utm_zone_for(lon, lat);
        let projected = CRS::utm(zone, north);
        let to_projected = CoordTransform::new(native, &projected)?;

        Ok(Self {
            native: native.clone(),
            projected,
            zone,
            north,
            center: (lon, lat),
            to_projected,
            to_geographic,
        })
    }

    /// Frame for a raster's CRS and extent; a raster without CRS cannot be
    /// measured.
    pub fn for_raster<T: RasterElement>(raster: &Raster<T>) -> Result<Self> {
        let crs = raster
            .crs()
            .ok_or_else(|| Error::CrsResolution("raster has no CRS".into()))?;
        Self::derive(crs, raster.bounds())
    }

    pub fn native_crs(&self) -> &CRS {
        &self.native
    }

    /// The derived UTM CRS
    pub fn projected_crs(&self) -> &CRS {
        &self.projected
    }

    pub fn zone(&self) -> u32 {
        self.zone
    }

    pub fn is_north(&self) -> bool {
        self.north
    }

    /// Geographic center of the extent as (longitude, latitude)
    pub fn center(&self) -> (f64, f64) {
        self.center
    }

    /// Native → projected
    pub fn project(&self, polygon: &Polygon<f64>) -> Result<Polygon<f64>> {
        reproject_polygon(polygon, &self.to_projected)
    }

    /// Projected → native
    pub fn unproject(&self, polygon: &Polygon<f64>) -> Result<Polygon<f64>> {
        reproject_polygon(polygon, &self.to_projected.inverse())
    }

    /// Ground area in square metres: exterior minus holes, measured after
    /// projection
    pub fn area(&self, polygon: &Polygon<f64>) -> Result<f64> {
        Ok(self.project(polygon)?.unsigned_area())
    }

    /// Centroid computed in the native CRS, reported as WGS84
    /// (longitude, latitude)
    pub fn centroid_lon_lat(&self, polygon: &Polygon<f64>) -> Result<(f64, f64)> {
        let c = polygon
            .centroid()
            .ok_or_else(|| Error::Algorithm("centroid of an empty polygon".into()))?;
        self.to_geographic.transform(c.x(), c.y())
    }
}
