//! Typed telemetry features (pings and tracks) on top of the GeoJSON codec.

use chrono::{DateTime, Utc};
use foundation::ids::DeviceId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::geojson::{GeoJsonError, GeoPoint, VectorChunk, VectorFeature, VectorGeometry};

/// Conversion between a typed feature and its generic GeoJSON form.
pub trait TelemetryFeature: Sized {
    fn from_feature(feature: &VectorFeature) -> Result<Self, String>;
    fn to_feature(&self) -> VectorFeature;
}

/// Animal status as reported with each ping.
///
/// Only `Mortality` carries meaning for rendering; anything else is kept
/// verbatim so exports reproduce the backend value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum AnimalStatus {
    #[default]
    Unknown,
    Alive,
    Mortality,
    Other(String),
}

impl AnimalStatus {
    pub fn is_mortality(&self) -> bool {
        matches!(self, AnimalStatus::Mortality)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnimalStatus::Unknown => None,
            AnimalStatus::Alive => Some("Alive"),
            AnimalStatus::Mortality => Some("Mortality"),
            AnimalStatus::Other(s) => Some(s.as_str()),
        }
    }
}

impl From<Option<String>> for AnimalStatus {
    fn from(raw: Option<String>) -> Self {
        let Some(raw) = raw else {
            return AnimalStatus::Unknown;
        };
        match raw.as_str() {
            "" => AnimalStatus::Unknown,
            "Alive" => AnimalStatus::Alive,
            "Mortality" => AnimalStatus::Mortality,
            _ => AnimalStatus::Other(raw),
        }
    }
}

impl From<AnimalStatus> for Option<String> {
    fn from(status: AnimalStatus) -> Self {
        status.as_str().map(str::to_string)
    }
}

/// Properties attached to a ping by the REST API.
///
/// Fields the engine does not interpret are preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingProperties {
    pub device_id: DeviceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animal_id: Option<String>,
    #[serde(rename = "date_recorded")]
    pub recorded_at: DateTime<Utc>,
    #[serde(rename = "animal_status", default)]
    pub status: AnimalStatus,
    #[serde(
        rename = "radio_frequency",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub frequency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population_unit: Option<String>,
    #[serde(
        rename = "device_vendor",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub vendor: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PingProperties {
    pub fn new(device_id: DeviceId, recorded_at: DateTime<Utc>) -> Self {
        Self {
            device_id,
            species: None,
            animal_id: None,
            recorded_at,
            status: AnimalStatus::Unknown,
            frequency: None,
            population_unit: None,
            vendor: None,
            extra: Map::new(),
        }
    }
}

/// A single timestamped GPS fix.
#[derive(Debug, Clone, PartialEq)]
pub struct Ping {
    pub id: Option<String>,
    pub position: GeoPoint,
    pub properties: PingProperties,
}

impl Ping {
    pub fn new(position: GeoPoint, properties: PingProperties) -> Self {
        Self {
            id: None,
            position,
            properties,
        }
    }

    /// `(device, recorded_at)` uniquely identifies a ping.
    pub fn identity(&self) -> (DeviceId, DateTime<Utc>) {
        (self.properties.device_id, self.properties.recorded_at)
    }

    pub fn device_id(&self) -> DeviceId {
        self.properties.device_id
    }
}

impl TelemetryFeature for Ping {
    fn from_feature(feature: &VectorFeature) -> Result<Self, String> {
        let VectorGeometry::Point(position) = feature.geometry else {
            return Err(format!(
                "ping geometry must be a Point, got {}",
                feature.geometry.type_name()
            ));
        };
        let properties: PingProperties =
            serde_json::from_value(Value::Object(feature.properties.clone()))
                .map_err(|e| format!("ping properties: {e}"))?;
        Ok(Self {
            id: feature.id.clone(),
            position,
            properties,
        })
    }

    fn to_feature(&self) -> VectorFeature {
        VectorFeature {
            id: self.id.clone(),
            properties: to_object(&self.properties),
            geometry: VectorGeometry::Point(self.position),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackGeometry {
    Point(GeoPoint),
    Line(Vec<GeoPoint>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackProperties {
    pub device_id: DeviceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Historical path of one device over the queried window.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub geometry: TrackGeometry,
    pub properties: TrackProperties,
}

impl TelemetryFeature for Track {
    fn from_feature(feature: &VectorFeature) -> Result<Self, String> {
        let geometry = match &feature.geometry {
            VectorGeometry::Point(p) => TrackGeometry::Point(*p),
            VectorGeometry::LineString(line) => TrackGeometry::Line(line.clone()),
            other => {
                return Err(format!(
                    "track geometry must be a Point or LineString, got {}",
                    other.type_name()
                ));
            }
        };
        let properties: TrackProperties =
            serde_json::from_value(Value::Object(feature.properties.clone()))
                .map_err(|e| format!("track properties: {e}"))?;
        Ok(Self {
            geometry,
            properties,
        })
    }

    fn to_feature(&self) -> VectorFeature {
        let geometry = match &self.geometry {
            TrackGeometry::Point(p) => VectorGeometry::Point(*p),
            TrackGeometry::Line(line) => VectorGeometry::LineString(line.clone()),
        };
        VectorFeature::new(geometry, to_object(&self.properties))
    }
}

fn to_object<T: Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Ordered, possibly empty set of typed features from one fetch.
///
/// Collections are replaced wholesale on every fetch, never merged.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection<T> {
    features: Vec<T>,
}

impl<T> FeatureCollection<T> {
    pub fn new(features: Vec<T>) -> Self {
        Self { features }
    }

    pub fn empty() -> Self {
        Self {
            features: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.features.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.features
    }

    pub fn into_vec(self) -> Vec<T> {
        self.features
    }
}

impl<T: TelemetryFeature> FeatureCollection<T> {
    pub fn from_chunk(chunk: &VectorChunk) -> Result<Self, GeoJsonError> {
        let features = chunk
            .features
            .iter()
            .enumerate()
            .map(|(index, f)| {
                T::from_feature(f).map_err(|reason| GeoJsonError::InvalidFeature { index, reason })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { features })
    }

    pub fn from_geojson_str(payload: &str) -> Result<Self, GeoJsonError> {
        Self::from_chunk(&VectorChunk::from_geojson_str(payload)?)
    }

    pub fn from_geojson_value(value: &Value) -> Result<Self, GeoJsonError> {
        Self::from_chunk(&VectorChunk::from_geojson_value(value)?)
    }

    pub fn to_chunk(&self) -> VectorChunk {
        VectorChunk::new(self.features.iter().map(T::to_feature).collect())
    }
}

impl<T> Default for FeatureCollection<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> FromIterator<T> for FeatureCollection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a, T> IntoIterator for &'a FeatureCollection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::{AnimalStatus, FeatureCollection, Ping, Track, TrackGeometry};
    use foundation::ids::DeviceId;
    use pretty_assertions::assert_eq;

    const PINGS: &str = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","id":1,"geometry":{"type":"Point","coordinates":[-127.1,54.2]},
         "properties":{"device_id":10,"species":"Caribou","animal_id":"C-01",
           "date_recorded":"2023-01-05T10:00:00Z","animal_status":"Mortality",
           "radio_frequency":150.05,"population_unit":"Tweedsmuir","device_vendor":"Vectronic",
           "collar_id":"abc"}},
        {"type":"Feature","geometry":{"type":"Point","coordinates":[-127.3,54.4]},
         "properties":{"device_id":22,"date_recorded":"2023-01-06T11:30:00Z","animal_status":null}}
    ]}"#;

    #[test]
    fn parses_ping_properties_from_wire_names() {
        let pings = FeatureCollection::<Ping>::from_geojson_str(PINGS).expect("parse");
        assert_eq!(pings.len(), 2);

        let first = &pings.as_slice()[0];
        assert_eq!(first.device_id(), DeviceId(10));
        assert_eq!(first.properties.status, AnimalStatus::Mortality);
        assert_eq!(first.properties.frequency, Some(150.05));
        assert_eq!(first.properties.vendor.as_deref(), Some("Vectronic"));
        assert_eq!(first.properties.extra.get("collar_id").and_then(|v| v.as_str()), Some("abc"));

        let second = &pings.as_slice()[1];
        assert_eq!(second.properties.status, AnimalStatus::Unknown);
        assert_eq!(second.properties.species, None);
    }

    #[test]
    fn ping_round_trips_through_geojson() {
        let pings = FeatureCollection::<Ping>::from_geojson_str(PINGS).unwrap();
        let text = pings.to_chunk().to_geojson_string().unwrap();
        let back = FeatureCollection::<Ping>::from_geojson_str(&text).unwrap();
        assert_eq!(back, pings);
    }

    #[test]
    fn status_keeps_unrecognised_values() {
        assert_eq!(
            AnimalStatus::from(Some("Captured".to_string())),
            AnimalStatus::Other("Captured".to_string())
        );
        assert_eq!(AnimalStatus::from(Some(String::new())), AnimalStatus::Unknown);
        assert!(AnimalStatus::from(Some("Mortality".to_string())).is_mortality());
        assert!(!AnimalStatus::from(Some("mortality".to_string())).is_mortality());
    }

    #[test]
    fn rejects_ping_without_point_geometry() {
        let payload = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"LineString","coordinates":[[0,0],[1,1]]},
             "properties":{"device_id":1,"date_recorded":"2023-01-01T00:00:00Z"}}]}"#;
        assert!(FeatureCollection::<Ping>::from_geojson_str(payload).is_err());
    }

    #[test]
    fn parses_tracks() {
        let payload = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"LineString","coordinates":[[0,0],[1,1],[2,1]]},
             "properties":{"device_id":5,"animal_id":"M-9"}}]}"#;
        let tracks = FeatureCollection::<Track>::from_geojson_str(payload).unwrap();
        let track = &tracks.as_slice()[0];
        assert_eq!(track.properties.device_id, DeviceId(5));
        assert!(matches!(track.geometry, TrackGeometry::Line(ref l) if l.len() == 3));
    }
}
