//! GeoJSON output for feature collections
//!
//! Features are converted into `geojson` crate types; the collection's CRS
//! is written as a named-CRS foreign member (OGC URN) when it has an EPSG
//! code.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection};
use geo_types::Geometry;
use serde_json::{json, Map, Value};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

fn named_crs(crs: &CRS) -> Option<Value> {
    crs.urn().map(|name| {
        json!({
            "type": "name",
            "properties": { "name": name },
        })
    })
}

fn geometry_value(geometry: &Geometry<f64>) -> Result<::geojson::Value> {
    match geometry {
        Geometry::Point(p) => Ok(::geojson::Value::from(p)),
        Geometry::Polygon(p) => Ok(::geojson::Value::from(p)),
        Geometry::MultiPolygon(mp) => Ok(::geojson::Value::from(mp)),
        _ => Err(Error::UnsupportedDataType(
            "GeoJSON output supports Point, Polygon and MultiPolygon".to_string(),
        )),
    }
}

fn attribute_json(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Null => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Int(i) => json!(i),
        // Non-finite floats have no JSON representation
        AttributeValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        AttributeValue::String(s) => Value::String(s.clone()),
    }
}

fn to_geojson_feature(feature: &Feature) -> Result<::geojson::Feature> {
    let geometry = feature
        .geometry
        .as_ref()
        .map(|g| geometry_value(g).map(::geojson::Geometry::new))
        .transpose()?;
    let properties: Map<String, Value> = feature
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), attribute_json(v)))
        .collect();

    Ok(::geojson::Feature {
        bbox: None,
        geometry,
        id: feature
            .id
            .map(|id| ::geojson::feature::Id::Number(serde_json::Number::from(id))),
        properties: Some(properties),
        foreign_members: None,
    })
}

fn to_geojson_collection(collection: &FeatureCollection) -> Result<::geojson::FeatureCollection> {
    let features = collection
        .iter()
        .map(to_geojson_feature)
        .collect::<Result<Vec<_>>>()?;
    let foreign_members = collection.crs.as_ref().and_then(named_crs).map(|crs| {
        let mut members = Map::new();
        members.insert("crs".to_string(), crs);
        members
    });

    Ok(::geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    })
}

/// Serialize a feature collection to a GeoJSON string
pub fn to_geojson_string(collection: &FeatureCollection) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_geojson_collection(collection)?)?)
}

/// Write a feature collection as a GeoJSON file
pub fn write_geojson<P: AsRef<Path>>(collection: &FeatureCollection, path: P) -> Result<()> {
    let doc = to_geojson_collection(collection)?;
    let writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(writer, &doc)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{polygon, Polygon};

    fn square_with_hole() -> Polygon<f64> {
        polygon!(
            exterior: [
                (x: 0.0, y: 0.0),
                (x: 4.0, y: 0.0),
                (x: 4.0, y: 4.0),
                (x: 0.0, y: 4.0),
                (x: 0.0, y: 0.0),
            ],
            interiors: [[
                (x: 1.0, y: 1.0),
                (x: 1.0, y: 2.0),
                (x: 2.0, y: 2.0),
                (x: 2.0, y: 1.0),
                (x: 1.0, y: 1.0),
            ]],
        )
    }

    #[test]
    fn test_polygon_with_hole_and_crs() {
        let mut fc = FeatureCollection::new(Some(CRS::utm(10, true)));
        let mut f = Feature::new(square_with_hole()).with_id(0);
        f.set_property("id", 0i64);
        f.set_property("area", 15.0);
        fc.push(f);

        let text = to_geojson_string(&fc).unwrap();
        let doc: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(doc["type"], "FeatureCollection");
        assert_eq!(doc["crs"]["properties"]["name"], "urn:ogc:def:crs:EPSG::32610");

        let feature = &doc["features"][0];
        assert_eq!(feature["geometry"]["type"], "Polygon");
        let rings = feature["geometry"]["coordinates"].as_array().unwrap();
        assert_eq!(rings.len(), 2);
        assert_eq!(rings[0].as_array().unwrap().len(), 5);
        assert_eq!(feature["properties"]["area"], 15.0);
        assert_eq!(feature["id"], 0);

        match text.parse::<::geojson::GeoJson>().unwrap() {
            ::geojson::GeoJson::FeatureCollection(parsed) => {
                assert_eq!(parsed.features.len(), 1);
                assert!(parsed.foreign_members.unwrap().contains_key("crs"));
            }
            other => panic!("expected a FeatureCollection, got {:?}", other),
        }
    }

    #[test]
    fn test_nan_attribute_becomes_null() {
        let mut fc = FeatureCollection::new(None);
        let mut f = Feature::new(square_with_hole());
        f.set_property("area", f64::NAN);
        fc.push(f);

        let doc: Value = serde_json::from_str(&to_geojson_string(&fc).unwrap()).unwrap();
        assert!(doc.get("crs").is_none());
        assert!(doc["features"][0]["properties"]["area"].is_null());
    }

    #[test]
    fn test_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scars.geojson");
        let fc = FeatureCollection::new(Some(CRS::wgs84()));
        write_geojson(&fc, &path).unwrap();

        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["features"].as_array().unwrap().len(), 0);
    }
}
