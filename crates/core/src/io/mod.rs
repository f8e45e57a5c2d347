//! I/O operations for reading and writing geospatial data

mod geojson;
mod geotiff;

pub use self::geojson::{to_geojson_string, write_geojson};
pub use self::geotiff::{
    read_geotiff, read_geotiff_from_buffer, read_multiband_geotiff, write_geotiff,
    write_geotiff_to_buffer, write_label_geotiff, GeoTiffReader,
};
