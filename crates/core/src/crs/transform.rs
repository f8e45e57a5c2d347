//! Projection resolution and point transforms between CRSs.
//!
//! Every transform goes through WGS84 geographic coordinates. WGS84
//! longitude/latitude, UTM and Web Mercator use built-in math with no datum
//! shift; any other EPSG code or PROJ definition is handed to proj4rs.

use proj4rs::proj::Proj;
use std::fmt;
use std::sync::Arc;

use super::utm;
use super::CRS;
use crate::error::{Error, Result};

/// Web Mercator sphere radius (m)
const WEB_MERCATOR_R: f64 = 6_378_137.0;

const WGS84_LONGLAT: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// A CRS outside the built-in systems, resolved through proj4rs
#[derive(Clone)]
pub struct ProjDefinition {
    definition: String,
    geographic: bool,
    proj: Arc<Proj>,
    wgs84: Arc<Proj>,
}

impl ProjDefinition {
    fn parse(definition: &str) -> Result<Self> {
        let build = |text: &str| {
            Proj::from_proj_string(text).map_err(|e| {
                Error::CrsResolution(format!("invalid PROJ definition '{}': {:?}", text, e))
            })
        };
        let kind = proj_params(definition).kind;
        Ok(Self {
            definition: definition.to_string(),
            geographic: matches!(kind, Some("longlat") | Some("latlong")),
            proj: Arc::new(build(definition)?),
            wgs84: Arc::new(build(WGS84_LONGLAT)?),
        })
    }

    /// The PROJ string this projection was built from
    pub fn definition(&self) -> &str {
        &self.definition
    }

    fn to_geographic(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let mut point = if self.geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        proj4rs::transform::transform(&self.proj, &self.wgs84, &mut point)
            .map_err(|e| self.failed(x, y, e))?;
        Ok((point.0.to_degrees(), point.1.to_degrees()))
    }

    fn from_geographic(&self, lon: f64, lat: f64) -> Result<(f64, f64)> {
        let mut point = (lon.to_radians(), lat.to_radians(), 0.0);
        proj4rs::transform::transform(&self.wgs84, &self.proj, &mut point)
            .map_err(|e| self.failed(lon, lat, e))?;
        if self.geographic {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok((point.0, point.1))
        }
    }

    fn failed(&self, x: f64, y: f64, err: impl fmt::Debug) -> Error {
        Error::CrsResolution(format!(
            "cannot transform ({}, {}) with '{}': {:?}",
            x, y, self.definition, err
        ))
    }
}

impl PartialEq for ProjDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.definition == other.definition
    }
}

impl fmt::Debug for ProjDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjDefinition")
            .field("definition", &self.definition)
            .field("geographic", &self.geographic)
            .finish_non_exhaustive()
    }
}

/// Coordinate math for a resolved CRS
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Longitude/latitude in degrees on WGS84 (EPSG:4326)
    Geographic,
    /// WGS84 / UTM zone, easting/northing in metres
    Utm { zone: u32, north: bool },
    /// Spherical (pseudo) Mercator in metres (EPSG:3857)
    WebMercator,
    /// Any other system proj4rs understands
    Proj4(ProjDefinition),
}

/// The parameters of a PROJ string the built-in systems care about
struct ProjParams<'a> {
    kind: Option<&'a str>,
    zone: Option<u32>,
    south: bool,
    wgs84: bool,
}

fn proj_params(proj: &str) -> ProjParams<'_> {
    let mut params = ProjParams {
        kind: None,
        zone: None,
        south: false,
        wgs84: true,
    };
    for token in proj.split_whitespace() {
        let token = token.trim_start_matches('+');
        match token.split_once('=') {
            Some(("proj", value)) => params.kind = Some(value),
            Some(("zone", value)) => params.zone = value.parse::<u32>().ok(),
            Some(("datum", value)) | Some(("ellps", value)) => {
                params.wgs84 &= value.eq_ignore_ascii_case("WGS84")
            }
            Some(("towgs84" | "nadgrids" | "a" | "b" | "R", _)) => params.wgs84 = false,
            None if token == "south" => params.south = true,
            _ => {}
        }
    }
    params
}

impl Projection {
    /// Resolve a CRS identifier into projection math.
    pub fn from_crs(crs: &CRS) -> Result<Self> {
        if let Some(code) = crs.epsg() {
            return Self::from_epsg(code);
        }
        if let Some(proj) = crs.proj() {
            return Self::from_proj_string(proj);
        }
        if let Some(code) = crs.wkt().and_then(wkt_authority_code) {
            return Self::from_epsg(code);
        }
        Err(Error::CrsResolution(format!("unsupported CRS {}", crs)))
    }

    fn from_epsg(code: u32) -> Result<Self> {
        match code {
            4326 => return Ok(Projection::Geographic),
            3857 | 3785 | 900913 => return Ok(Projection::WebMercator),
            _ => {}
        }
        if let Some((zone, north)) = utm::parse_utm_epsg(code) {
            return Ok(Projection::Utm { zone, north });
        }
        let definition = u16::try_from(code)
            .ok()
            .and_then(crs_definitions::from_code)
            .ok_or_else(|| Error::CrsResolution(format!("unknown EPSG:{}", code)))?;
        ProjDefinition::parse(definition.proj4).map(Projection::Proj4)
    }

    fn from_proj_string(proj: &str) -> Result<Self> {
        let params = proj_params(proj);
        if params.wgs84 {
            match (params.kind, params.zone) {
                (Some("longlat") | Some("latlong"), _) => return Ok(Projection::Geographic),
                (Some("webmerc"), _) => return Ok(Projection::WebMercator),
                (Some("utm"), Some(zone)) if (1..=60).contains(&zone) => {
                    return Ok(Projection::Utm {
                        zone,
                        north: !params.south,
                    })
                }
                _ => {}
            }
        }
        ProjDefinition::parse(proj).map(Projection::Proj4)
    }

    /// Whether coordinates are angular (degrees)
    pub fn is_geographic(&self) -> bool {
        match self {
            Projection::Geographic => true,
            Projection::Proj4(def) => def.geographic,
            _ => false,
        }
    }

    /// Native coordinates to (longitude, latitude) in degrees
    pub fn to_geographic(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        match self {
            Projection::Geographic => Ok((x, y)),
            Projection::Utm { zone, north } => Ok(utm::utm_to_wgs84(x, y, *zone, *north)),
            Projection::WebMercator => {
                let lon = (x / WEB_MERCATOR_R).to_degrees();
                let lat = (2.0 * (y / WEB_MERCATOR_R).exp().atan()
                    - std::f64::consts::FRAC_PI_2)
                    .to_degrees();
                Ok((lon, lat))
            }
            Projection::Proj4(def) => def.to_geographic(x, y),
        }
    }

    /// (longitude, latitude) in degrees to native coordinates
    pub fn from_geographic(&self, lon: f64, lat: f64) -> Result<(f64, f64)> {
        match self {
            Projection::Geographic => Ok((lon, lat)),
            Projection::Utm { zone, north } => Ok(utm::wgs84_to_utm(lon, lat, *zone, *north)),
            Projection::WebMercator => {
                let x = WEB_MERCATOR_R * lon.to_radians();
                let y = WEB_MERCATOR_R
                    * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
                Ok((x, y))
            }
            Projection::Proj4(def) => def.from_geographic(lon, lat),
        }
    }
}

/// Top-level `AUTHORITY["EPSG","code"]` (WKT1) or `ID["EPSG",code]` (WKT2).
///
/// The outermost authority is the last one in the string.
fn wkt_authority_code(wkt: &str) -> Option<u32> {
    let upper = wkt.to_ascii_uppercase();
    let start = upper
        .rfind("AUTHORITY[\"EPSG\"")
        .or_else(|| upper.rfind("ID[\"EPSG\""))?;
    let rest = &upper[start..];
    let after_comma = &rest[rest.find(',')? + 1..];
    let digits: String = after_comma
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Point transform between two resolved CRSs
#[derive(Debug, Clone)]
pub struct CoordTransform {
    source: Projection,
    target: Projection,
}

impl CoordTransform {
    /// Build a transform from `source` to `target`.
    pub fn new(source: &CRS, target: &CRS) -> Result<Self> {
        Ok(Self {
            source: source.projection()?,
            target: target.projection()?,
        })
    }

    /// Transform in the opposite direction
    pub fn inverse(&self) -> Self {
        Self {
            source: self.target.clone(),
            target: self.source.clone(),
        }
    }

    /// Transform one point. Non-finite results (e.g. Mercator at the poles)
    /// fail with `CrsResolution`.
    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if self.source == self.target {
            return Ok((x, y));
        }
        let (lon, lat) = self.source.to_geographic(x, y)?;
        let (tx, ty) = self.target.from_geographic(lon, lat)?;
        if tx.is_finite() && ty.is_finite() {
            Ok((tx, ty))
        } else {
            Err(Error::CrsResolution(format!(
                "point ({}, {}) has no finite image in {:?}",
                x, y, self.target
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_resolve_epsg() {
        assert_eq!(CRS::wgs84().projection().unwrap(), Projection::Geographic);
        assert_eq!(CRS::web_mercator().projection().unwrap(), Projection::WebMercator);
        assert_eq!(
            CRS::from_epsg(32647).projection().unwrap(),
            Projection::Utm { zone: 47, north: true }
        );
        assert!(matches!(
            CRS::from_epsg(2193).projection(),
            Ok(Projection::Proj4(_))
        ));
        assert!(matches!(
            CRS::from_epsg(99_999).projection(),
            Err(Error::CrsResolution(_))
        ));
    }

    #[test]
    fn test_resolve_proj_string() {
        let p = CRS::from_proj("+proj=utm +zone=55 +south +datum=WGS84").projection().unwrap();
        assert_eq!(p, Projection::Utm { zone: 55, north: false });
        let g = CRS::from_proj("+proj=longlat +datum=WGS84 +no_defs").projection().unwrap();
        assert_eq!(g, Projection::Geographic);
        // Other datums are not treated as WGS84
        let ed50 = CRS::from_proj("+proj=longlat +ellps=intl +towgs84=-87,-98,-121,0,0,0,0 +no_defs")
            .projection()
            .unwrap();
        assert!(matches!(ed50, Projection::Proj4(_)));
        assert!(ed50.is_geographic());
        assert!(matches!(
            CRS::from_proj("+proj=nosuchprojection +x_0=0").projection(),
            Err(Error::CrsResolution(_))
        ));
    }

    #[test]
    fn test_resolve_wkt_authority() {
        let wkt = r#"PROJCS["WGS 84 / UTM zone 47N",GEOGCS["WGS 84",AUTHORITY["EPSG","4326"]],AUTHORITY["EPSG","32647"]]"#;
        assert_eq!(
            CRS::from_wkt(wkt).projection().unwrap(),
            Projection::Utm { zone: 47, north: true }
        );
    }

    #[test]
    fn test_web_mercator_roundtrip() {
        let p = Projection::WebMercator;
        let (x, y) = p.from_geographic(100.5, 13.7).unwrap();
        let (lon, lat) = p.to_geographic(x, y).unwrap();
        assert_relative_eq!(lon, 100.5, epsilon = 1e-9);
        assert_relative_eq!(lat, 13.7, epsilon = 1e-9);
    }

    #[test]
    fn test_transform_utm_to_geographic_and_back() {
        let t = CoordTransform::new(&CRS::utm(30, true), &CRS::wgs84()).unwrap();
        let (lon, lat) = t.transform(440_298.94, 4_474_257.31).unwrap();
        assert_relative_eq!(lon, -3.7037, epsilon = 1e-4);
        assert_relative_eq!(lat, 40.4168, epsilon = 1e-4);

        let (x, y) = t.inverse().transform(lon, lat).unwrap();
        assert_relative_eq!(x, 440_298.94, epsilon = 1e-3);
        assert_relative_eq!(y, 4_474_257.31, epsilon = 1e-3);
    }

    #[test]
    fn test_identity_transform() {
        let t = CoordTransform::new(&CRS::utm(47, true), &CRS::from_epsg(32647)).unwrap();
        assert_eq!(t.transform(1.5, 2.5).unwrap(), (1.5, 2.5));
    }

    #[test]
    fn test_out_of_range_latitude_is_not_projectable() {
        let t = CoordTransform::new(&CRS::wgs84(), &CRS::web_mercator()).unwrap();
        assert!(t.transform(0.0, 95.0).is_err());
    }

    #[test]
    fn test_proj4_transverse_mercator_matches_utm() {
        // UTM zone 59N spelled as a generic transverse Mercator
        let tmerc = CRS::from_proj(
            "+proj=tmerc +lat_0=0 +lon_0=171 +k=0.9996 +x_0=500000 +y_0=0 +datum=WGS84 +units=m +no_defs",
        );
        let general = tmerc.projection().unwrap();
        assert!(matches!(general, Projection::Proj4(_)));
        assert!(!general.is_geographic());

        let utm = Projection::Utm { zone: 59, north: true };
        for (lon, lat) in [(171.0, 0.5), (172.3, 10.0), (169.5, 45.2)] {
            let (gx, gy) = general.from_geographic(lon, lat).unwrap();
            let (ux, uy) = utm.from_geographic(lon, lat).unwrap();
            assert_relative_eq!(gx, ux, epsilon = 0.01);
            assert_relative_eq!(gy, uy, epsilon = 0.01);

            let (back_lon, back_lat) = general.to_geographic(gx, gy).unwrap();
            assert_relative_eq!(back_lon, lon, epsilon = 1e-8);
            assert_relative_eq!(back_lat, lat, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_epsg_lookup_projects_nztm() {
        // NZGD2000 / New Zealand Transverse Mercator: central meridian 173E,
        // false easting 1 600 000 m
        let t = CoordTransform::new(&CRS::wgs84(), &CRS::from_epsg(2193)).unwrap();
        let (x, y) = t.transform(173.0, -41.0).unwrap();
        assert_relative_eq!(x, 1_600_000.0, epsilon = 0.01);
        assert!((5_000_000.0..6_000_000.0).contains(&y));

        let (lon, lat) = t.inverse().transform(x, y).unwrap();
        assert_relative_eq!(lon, 173.0, epsilon = 1e-8);
        assert_relative_eq!(lat, -41.0, epsilon = 1e-8);
    }
}
