//! KML 2.2 encoder for vector chunks.
//!
//! Output is a single `Document` with one `Placemark` per feature. Properties
//! become `ExtendedData`; nested objects and arrays are written as JSON text.

use std::fmt::Write;

use serde_json::Value;

use crate::geojson::{GeoPoint, VectorChunk, VectorFeature, VectorGeometry};

pub const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmlOptions {
    /// Optional `<name>` of the document element.
    pub document_name: Option<String>,
    /// Property used as the placemark `<name>`.
    pub name_key: Option<String>,
    /// Property holding an ISO-8601 timestamp, written as `<TimeStamp>`.
    pub timestamp_key: Option<String>,
}

impl Default for KmlOptions {
    fn default() -> Self {
        Self {
            document_name: None,
            name_key: Some("name".to_string()),
            timestamp_key: None,
        }
    }
}

pub fn encode_kml(chunk: &VectorChunk, options: &KmlOptions) -> String {
    let mut out = String::with_capacity(256 + chunk.features.len() * 256);
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = write!(out, r#"<kml xmlns="{KML_NAMESPACE}"><Document>"#);
    if let Some(name) = &options.document_name {
        let _ = write!(out, "<name>{}</name>", escape_xml(name));
    }
    for feature in &chunk.features {
        write_placemark(&mut out, feature, options);
    }
    out.push_str("</Document></kml>");
    out
}

fn write_placemark(out: &mut String, feature: &VectorFeature, options: &KmlOptions) {
    out.push_str("<Placemark>");
    if let Some(key) = &options.name_key
        && let Some(name) = feature.properties.get(key).and_then(value_text)
    {
        let _ = write!(out, "<name>{}</name>", escape_xml(&name));
    }
    if !feature.properties.is_empty() {
        out.push_str("<ExtendedData>");
        for (key, value) in &feature.properties {
            let Some(text) = value_text(value) else {
                continue;
            };
            let _ = write!(
                out,
                r#"<Data name="{}"><value>{}</value></Data>"#,
                escape_xml(key),
                escape_xml(&text)
            );
        }
        out.push_str("</ExtendedData>");
    }
    if let Some(key) = &options.timestamp_key
        && let Some(when) = feature.properties.get(key).and_then(Value::as_str)
    {
        let _ = write!(out, "<TimeStamp><when>{}</when></TimeStamp>", escape_xml(when));
    }
    write_geometry(out, &feature.geometry);
    out.push_str("</Placemark>");
}

fn write_geometry(out: &mut String, geometry: &VectorGeometry) {
    match geometry {
        VectorGeometry::Point(p) => write_point(out, p),
        VectorGeometry::LineString(line) => write_line(out, line),
        VectorGeometry::Polygon(rings) => write_polygon(out, rings),
        VectorGeometry::MultiPoint(points) => {
            out.push_str("<MultiGeometry>");
            points.iter().for_each(|p| write_point(out, p));
            out.push_str("</MultiGeometry>");
        }
        VectorGeometry::MultiLineString(lines) => {
            out.push_str("<MultiGeometry>");
            lines.iter().for_each(|l| write_line(out, l));
            out.push_str("</MultiGeometry>");
        }
        VectorGeometry::MultiPolygon(polys) => {
            out.push_str("<MultiGeometry>");
            polys.iter().for_each(|rings| write_polygon(out, rings));
            out.push_str("</MultiGeometry>");
        }
    }
}

fn write_point(out: &mut String, p: &GeoPoint) {
    let _ = write!(out, "<Point><coordinates>{},{}</coordinates></Point>", p.lon, p.lat);
}

fn write_line(out: &mut String, line: &[GeoPoint]) {
    out.push_str("<LineString><coordinates>");
    write_coordinates(out, line);
    out.push_str("</coordinates></LineString>");
}

fn write_polygon(out: &mut String, rings: &[Vec<GeoPoint>]) {
    out.push_str("<Polygon>");
    for (i, ring) in rings.iter().enumerate() {
        let tag = if i == 0 {
            "outerBoundaryIs"
        } else {
            "innerBoundaryIs"
        };
        let _ = write!(out, "<{tag}><LinearRing><coordinates>");
        write_coordinates(out, ring);
        let _ = write!(out, "</coordinates></LinearRing></{tag}>");
    }
    out.push_str("</Polygon>");
}

fn write_coordinates(out: &mut String, points: &[GeoPoint]) {
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{},{}", p.lon, p.lat);
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Escapes the five XML special characters. Also safe for HTML text.
pub fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
