//! Coordinate Reference System handling
//!
//! A [`CRS`] is an identifier (EPSG code, WKT or PROJ string). Coordinate
//! math lives in [`Projection`], resolved from a `CRS`: WGS84 geographic,
//! UTM north/south and Web Mercator use built-in formulas, and everything
//! else goes through proj4rs with EPSG definitions from `crs-definitions`.

mod transform;
pub mod utm;

pub use transform::{CoordTransform, ProjDefinition, Projection};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
    /// PROJ string if available
    proj: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            proj: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
            proj: None,
        }
    }

    /// Create a CRS from a PROJ string
    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            wkt: None,
            epsg: None,
            proj: Some(proj.into()),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Web Mercator (EPSG:3857)
    pub fn web_mercator() -> Self {
        Self::from_epsg(3857)
    }

    /// WGS84 / UTM zone CRS (EPSG:326xx north, 327xx south)
    pub fn utm(zone: u32, north: bool) -> Self {
        let base = if north { 32600 } else { 32700 };
        Self::from_epsg(base + zone)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Get PROJ string
    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// Resolve the projection math for this CRS.
    ///
    /// Fails with `CrsResolution` for unknown EPSG codes, unparsable PROJ
    /// strings, and WKT without an EPSG authority.
    pub fn projection(&self) -> crate::Result<Projection> {
        Projection::from_crs(self)
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        // Resolved projections compare structurally, so "EPSG:32633" and
        // "+proj=utm +zone=33" match.
        if let (Ok(a), Ok(b)) = (self.projection(), other.projection()) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.proj, &other.proj) {
            return a == b;
        }

        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            return format!("WKT:{}", &wkt[..wkt.len().min(50)]);
        }
        "Unknown".to_string()
    }

    /// OGC URN form used by the GeoJSON `crs` member
    pub fn urn(&self) -> Option<String> {
        self.epsg.map(|code| format!("urn:ogc:def:crs:EPSG::{}", code))
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(4326);
        assert_eq!(crs.epsg(), Some(4326));
        assert_eq!(crs.identifier(), "EPSG:4326");
    }

    #[test]
    fn test_crs_equivalence() {
        let a = CRS::from_epsg(4326);
        let b = CRS::wgs84();
        assert!(a.is_equivalent(&b));
    }

    #[test]
    fn test_utm_codes() {
        assert_eq!(CRS::utm(47, true).epsg(), Some(32647));
        assert_eq!(CRS::utm(21, false).epsg(), Some(32721));
    }

    #[test]
    fn test_proj_string_equivalent_to_epsg() {
        let a = CRS::from_proj("+proj=utm +zone=33 +datum=WGS84 +units=m +no_defs");
        let b = CRS::utm(33, true);
        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&CRS::utm(33, false)));
    }

    #[test]
    fn test_urn() {
        assert_eq!(
            CRS::utm(47, true).urn().as_deref(),
            Some("urn:ogc:def:crs:EPSG::32647")
        );
        assert_eq!(CRS::from_wkt("LOCAL_CS[]").urn(), None);
    }
}
