pub mod geojson;
pub mod kml;
pub mod telemetry;

pub use geojson::*;
pub use kml::*;
pub use telemetry::*;
