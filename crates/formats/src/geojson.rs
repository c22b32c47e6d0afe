//! GeoJSON `FeatureCollection` codec.
//!
//! Geometry stays in lon/lat degrees. Only the subset the telemetry API and
//! the drawing tools produce is supported (no `GeometryCollection`).

use foundation::bounds::Aabb2;
use serde_json::{Map, Value, json};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VectorGeometry {
    Point(GeoPoint),
    MultiPoint(Vec<GeoPoint>),
    LineString(Vec<GeoPoint>),
    MultiLineString(Vec<Vec<GeoPoint>>),
    Polygon(Vec<Vec<GeoPoint>>),
    MultiPolygon(Vec<Vec<Vec<GeoPoint>>>),
}

impl VectorGeometry {
    pub fn type_name(&self) -> &'static str {
        match self {
            VectorGeometry::Point(_) => "Point",
            VectorGeometry::MultiPoint(_) => "MultiPoint",
            VectorGeometry::LineString(_) => "LineString",
            VectorGeometry::MultiLineString(_) => "MultiLineString",
            VectorGeometry::Polygon(_) => "Polygon",
            VectorGeometry::MultiPolygon(_) => "MultiPolygon",
        }
    }

    /// Every vertex of the geometry, in document order.
    pub fn points(&self) -> Vec<GeoPoint> {
        match self {
            VectorGeometry::Point(p) => vec![*p],
            VectorGeometry::MultiPoint(ps) | VectorGeometry::LineString(ps) => ps.clone(),
            VectorGeometry::MultiLineString(rings) | VectorGeometry::Polygon(rings) => {
                rings.iter().flatten().copied().collect()
            }
            VectorGeometry::MultiPolygon(polys) => {
                polys.iter().flatten().flatten().copied().collect()
            }
        }
    }

    pub fn bounds(&self) -> Option<Aabb2> {
        Aabb2::from_points(self.points().into_iter().map(|p| [p.lon, p.lat]))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorFeature {
    pub id: Option<String>,
    pub properties: Map<String, Value>,
    pub geometry: VectorGeometry,
}

impl VectorFeature {
    pub fn new(geometry: VectorGeometry, properties: Map<String, Value>) -> Self {
        Self {
            id: None,
            properties,
            geometry,
        }
    }
}

/// A parsed GeoJSON `FeatureCollection`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorChunk {
    pub features: Vec<VectorFeature>,
}

#[derive(Debug, thiserror::Error)]
pub enum GeoJsonError {
    #[error("expected GeoJSON FeatureCollection")]
    NotAFeatureCollection,
    #[error("invalid feature at index {index}: {reason}")]
    InvalidFeature { index: usize, reason: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VectorChunk {
    pub fn new(features: Vec<VectorFeature>) -> Self {
        Self { features }
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn from_geojson_str(payload: &str) -> Result<Self, GeoJsonError> {
        let value: Value = serde_json::from_str(payload)?;
        Self::from_geojson_value(&value)
    }

    pub fn from_geojson_value(value: &Value) -> Result<Self, GeoJsonError> {
        let obj = value
            .as_object()
            .ok_or(GeoJsonError::NotAFeatureCollection)?;
        if obj.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
            return Err(GeoJsonError::NotAFeatureCollection);
        }
        let raw = obj
            .get("features")
            .and_then(Value::as_array)
            .ok_or(GeoJsonError::NotAFeatureCollection)?;

        let features = raw
            .iter()
            .enumerate()
            .map(|(index, v)| {
                parse_feature(v).map_err(|reason| GeoJsonError::InvalidFeature { index, reason })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { features })
    }

    pub fn to_geojson_value(&self) -> Value {
        let features: Vec<Value> = self.features.iter().map(feature_to_value).collect();
        json!({
            "type": "FeatureCollection",
            "features": features,
        })
    }

    pub fn to_geojson_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_geojson_value())
    }

    pub fn to_geojson_string_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_geojson_value())
    }
}

fn parse_feature(value: &Value) -> Result<VectorFeature, String> {
    let obj = value
        .as_object()
        .ok_or_else(|| "feature must be an object".to_string())?;
    match obj.get("type").and_then(Value::as_str) {
        Some("Feature") => {}
        Some(other) => return Err(format!("unexpected feature type: {other}")),
        None => return Err("feature missing type".to_string()),
    }

    let id = match obj.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    let properties = obj
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let geometry = obj
        .get("geometry")
        .filter(|g| !g.is_null())
        .ok_or_else(|| "feature missing geometry".to_string())
        .and_then(parse_geometry)?;

    Ok(VectorFeature {
        id,
        properties,
        geometry,
    })
}

pub fn parse_geometry(value: &Value) -> Result<VectorGeometry, String> {
    let obj = value
        .as_object()
        .ok_or_else(|| "geometry must be an object".to_string())?;
    let ty = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| "geometry missing type".to_string())?;
    let coords = obj
        .get("coordinates")
        .ok_or_else(|| "geometry missing coordinates".to_string())?;

    match ty {
        "Point" => Ok(VectorGeometry::Point(parse_position(coords)?)),
        "MultiPoint" => Ok(VectorGeometry::MultiPoint(parse_positions(coords)?)),
        "LineString" => Ok(VectorGeometry::LineString(parse_positions(coords)?)),
        "MultiLineString" => Ok(VectorGeometry::MultiLineString(parse_array(
            coords,
            parse_positions,
        )?)),
        "Polygon" => Ok(VectorGeometry::Polygon(parse_array(coords, parse_positions)?)),
        "MultiPolygon" => Ok(VectorGeometry::MultiPolygon(parse_array(coords, |poly| {
            parse_array(poly, parse_positions)
        })?)),
        other => Err(format!("unsupported geometry type: {other}")),
    }
}

fn parse_position(coords: &Value) -> Result<GeoPoint, String> {
    let arr = coords
        .as_array()
        .ok_or_else(|| "position must be an array".to_string())?;
    let (Some(lon), Some(lat)) = (
        arr.first().and_then(Value::as_f64),
        arr.get(1).and_then(Value::as_f64),
    ) else {
        return Err("position must be [lon, lat] numbers".to_string());
    };
    Ok(GeoPoint::new(lon, lat))
}

fn parse_positions(coords: &Value) -> Result<Vec<GeoPoint>, String> {
    parse_array(coords, parse_position)
}

fn parse_array<T>(
    coords: &Value,
    item: impl Fn(&Value) -> Result<T, String>,
) -> Result<Vec<T>, String> {
    coords
        .as_array()
        .ok_or_else(|| "coordinates must be an array".to_string())?
        .iter()
        .map(item)
        .collect()
}

fn feature_to_value(feature: &VectorFeature) -> Value {
    let mut obj = Map::new();
    obj.insert("type".to_string(), Value::from("Feature"));
    if let Some(id) = &feature.id {
        obj.insert("id".to_string(), Value::from(id.as_str()));
    }
    obj.insert(
        "properties".to_string(),
        Value::Object(feature.properties.clone()),
    );
    obj.insert("geometry".to_string(), geometry_to_value(&feature.geometry));
    Value::Object(obj)
}

pub fn geometry_to_value(geom: &VectorGeometry) -> Value {
    let coordinates = match geom {
        VectorGeometry::Point(p) => position(p),
        VectorGeometry::MultiPoint(ps) | VectorGeometry::LineString(ps) => positions(ps),
        VectorGeometry::MultiLineString(lines) | VectorGeometry::Polygon(lines) => {
            Value::Array(lines.iter().map(|l| positions(l)).collect())
        }
        VectorGeometry::MultiPolygon(polys) => Value::Array(
            polys
                .iter()
                .map(|rings| Value::Array(rings.iter().map(|r| positions(r)).collect()))
                .collect(),
        ),
    };
    json!({
        "type": geom.type_name(),
        "coordinates": coordinates,
    })
}

fn position(p: &GeoPoint) -> Value {
    json!([p.lon, p.lat])
}

fn positions(ps: &[GeoPoint]) -> Value {
    Value::Array(ps.iter().map(position).collect())
}

#[cfg(test)]
mod tests {
    use super::{GeoJsonError, GeoPoint, VectorChunk, VectorGeometry};
    use pretty_assertions::assert_eq;

    const PINGS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "id": 7, "properties": {"device_id": 10},
             "geometry": {"type": "Point", "coordinates": [-127.5, 54.25]}},
            {"type": "Feature", "properties": {},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}}
        ]
    }"#;

    #[test]
    fn parses_points_and_polygons() {
        let chunk = VectorChunk::from_geojson_str(PINGS).expect("parse");
        assert_eq!(chunk.features.len(), 2);
        assert_eq!(chunk.features[0].id.as_deref(), Some("7"));
        assert_eq!(
            chunk.features[0].geometry,
            VectorGeometry::Point(GeoPoint::new(-127.5, 54.25))
        );
        assert!(matches!(
            chunk.features[1].geometry,
            VectorGeometry::Polygon(ref rings) if rings[0].len() == 4
        ));
    }

    #[test]
    fn rejects_non_collections() {
        let err = VectorChunk::from_geojson_str(r#"{"type":"Feature"}"#).unwrap_err();
        assert!(matches!(err, GeoJsonError::NotAFeatureCollection));

        let err = VectorChunk::from_geojson_str("not json").unwrap_err();
        assert!(matches!(err, GeoJsonError::Json(_)));
    }

    #[test]
    fn reports_index_of_bad_feature() {
        let payload = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{},"geometry":{"type":"Point","coordinates":[1,2]}},
            {"type":"Feature","properties":{},"geometry":{"type":"Circle","coordinates":[1,2]}}
        ]}"#;
        match VectorChunk::from_geojson_str(payload) {
            Err(GeoJsonError::InvalidFeature { index, reason }) => {
                assert_eq!(index, 1);
                assert!(reason.contains("Circle"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn empty_collection_encodes_and_parses_back_empty() {
        let text = VectorChunk::default().to_geojson_string().unwrap();
        assert!(text.contains(r#""type":"FeatureCollection""#));
        let back = VectorChunk::from_geojson_str(&text).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn bounds_cover_all_vertices() {
        let chunk = VectorChunk::from_geojson_str(PINGS).unwrap();
        let b = chunk.features[1].geometry.bounds().unwrap();
        assert_eq!(b.min, [0.0, 0.0]);
        assert_eq!(b.max, [1.0, 1.0]);
    }
}
