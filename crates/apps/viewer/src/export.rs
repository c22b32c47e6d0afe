use std::str::FromStr;

use formats::kml::{KmlOptions, encode_kml};
use formats::telemetry::{FeatureCollection, Ping};

pub const EXPORT_BASENAME: &str = "collars";

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Kml,
    GeoJson,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Kml => "kml",
            Self::GeoJson => "geojson",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Kml => "application/xml",
            Self::GeoJson => "application/geo+json",
        }
    }

    pub fn filename(self) -> String {
        format!("{EXPORT_BASENAME}.{}", self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kml" => Ok(Self::Kml),
            "geojson" | "json" => Ok(Self::GeoJson),
            other => Err(format!("unknown export format `{other}`")),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Which pings an export covers.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum ExportSource {
    /// Selected pings, or every loaded ping when nothing is selected.
    #[default]
    Selection,
    All,
}

/// A file ready to hand to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub filename: String,
    pub mime: &'static str,
    pub content: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("encoding GeoJSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("delivering download: {0}")]
    Io(#[from] std::io::Error),
}

/// Host hook that saves or offers a [`Download`].
pub trait DownloadSink {
    fn deliver(&mut self, download: Download) -> std::io::Result<()>;
}

/// Keeps delivered downloads in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub downloads: Vec<Download>,
}

impl DownloadSink for MemorySink {
    fn deliver(&mut self, download: Download) -> std::io::Result<()> {
        self.downloads.push(download);
        Ok(())
    }
}

/// Picks the pings to export. An empty selection falls back to `all`.
pub fn export_set<'a>(
    source: ExportSource,
    selected: &'a FeatureCollection<Ping>,
    all: &'a FeatureCollection<Ping>,
) -> &'a FeatureCollection<Ping> {
    match source {
        ExportSource::Selection if !selected.is_empty() => selected,
        _ => all,
    }
}

pub fn kml_options() -> KmlOptions {
    KmlOptions {
        document_name: Some(EXPORT_BASENAME.to_string()),
        name_key: Some("animal_id".to_string()),
        timestamp_key: Some("date_recorded".to_string()),
    }
}

/// Encodes `pings` as a download. An empty collection still yields a
/// well-formed document.
pub fn encode_download(
    pings: &FeatureCollection<Ping>,
    format: ExportFormat,
) -> Result<Download, ExportError> {
    let chunk = pings.to_chunk();
    let content = match format {
        ExportFormat::Kml => encode_kml(&chunk, &kml_options()),
        ExportFormat::GeoJson => chunk.to_geojson_string_pretty()?,
    };
    Ok(Download {
        filename: format.filename(),
        mime: format.mime(),
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::{ExportFormat, ExportSource, encode_download, export_set};
    use chrono::{TimeZone, Utc};
    use formats::geojson::{GeoPoint, VectorChunk};
    use formats::telemetry::{FeatureCollection, Ping, PingProperties};
    use foundation::ids::DeviceId;
    use pretty_assertions::assert_eq;

    fn pings(ids: &[u64]) -> FeatureCollection<Ping> {
        let at = Utc.with_ymd_and_hms(2023, 1, 5, 10, 0, 0).unwrap();
        ids.iter()
            .map(|id| {
                let mut props = PingProperties::new(DeviceId(*id), at);
                props.animal_id = Some(format!("A{id}"));
                Ping::new(GeoPoint::new(-127.0, 54.0), props)
            })
            .collect()
    }

    #[test]
    fn empty_selection_falls_back_to_all() {
        let all = pings(&[1, 2, 3]);
        let none = FeatureCollection::empty();
        let some = pings(&[2]);

        assert_eq!(export_set(ExportSource::Selection, &none, &all).len(), 3);
        assert_eq!(export_set(ExportSource::Selection, &some, &all).len(), 1);
        assert_eq!(export_set(ExportSource::All, &some, &all).len(), 3);
    }

    #[test]
    fn kml_download_names_placemarks_by_animal() {
        let download = encode_download(&pings(&[7]), ExportFormat::Kml).unwrap();
        assert_eq!(download.filename, "collars.kml");
        assert_eq!(download.mime, "application/xml");
        assert!(download.content.contains("<Document><name>collars</name>"));
        assert!(download.content.contains("<Placemark><name>A7</name>"));
        assert!(download.content.contains("<when>2023-01-05T10:00:00Z</when>"));
    }

    #[test]
    fn empty_export_is_still_a_document() {
        let empty = FeatureCollection::<Ping>::empty();
        let kml = encode_download(&empty, ExportFormat::Kml).unwrap();
        assert!(kml.content.ends_with("<Document><name>collars</name></Document></kml>"));

        let geojson = encode_download(&empty, ExportFormat::GeoJson).unwrap();
        assert_eq!(geojson.filename, "collars.geojson");
        let parsed = VectorChunk::from_geojson_str(&geojson.content).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn formats_parse_case_insensitively() {
        assert_eq!("KML".parse::<ExportFormat>(), Ok(ExportFormat::Kml));
        assert_eq!("geojson".parse::<ExportFormat>(), Ok(ExportFormat::GeoJson));
        assert!("shp".parse::<ExportFormat>().is_err());
    }
}
