use std::sync::Arc;

use chrono::FixedOffset;
use foundation::ids::DeviceId;
use formats::geojson::GeoPoint;
use formats::telemetry::{FeatureCollection, Ping, Track, TrackGeometry};

use crate::layer::{Layer, LayerId, LayerKind};
use crate::popup::{Popup, ping_popup};
use crate::symbology::{LineStyle, PointStyle, highlight_style, ping_style};

/// Overlay holding one fetched feature collection.
///
/// Contents are replaced wholesale; the collection is shared with the cache.
#[derive(Debug, Clone)]
pub struct FeatureLayer<T> {
    id: LayerId,
    name: String,
    visible: bool,
    features: Arc<FeatureCollection<T>>,
}

impl<T> FeatureLayer<T> {
    pub fn new(id: LayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            visible: true,
            features: Arc::new(FeatureCollection::empty()),
        }
    }

    pub fn replace(&mut self, features: Arc<FeatureCollection<T>>) {
        self.features = features;
    }

    pub fn clear(&mut self) {
        self.features = Arc::new(FeatureCollection::empty());
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn features(&self) -> &FeatureCollection<T> {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl<T> Layer for FeatureLayer<T> {
    fn id(&self) -> LayerId {
        self.id
    }

    fn kind(&self) -> LayerKind {
        LayerKind::Overlay
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointMarker {
    pub device_id: DeviceId,
    pub position: GeoPoint,
    pub style: PointStyle,
    pub popup: Option<Popup>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackLine {
    pub device_id: DeviceId,
    pub points: Vec<GeoPoint>,
    pub style: LineStyle,
}

impl FeatureLayer<Ping> {
    /// Styled markers with popups; empty when hidden.
    pub fn extract_markers(&self, offset: FixedOffset) -> Vec<PointMarker> {
        if !self.visible {
            return Vec::new();
        }
        self.features
            .iter()
            .map(|ping| PointMarker {
                device_id: ping.device_id(),
                position: ping.position,
                style: ping_style(ping),
                popup: Some(ping_popup(ping, offset)),
            })
            .collect()
    }

    /// Highlight markers for selected pings. No popups.
    pub fn extract_highlight(&self) -> Vec<PointMarker> {
        if !self.visible {
            return Vec::new();
        }
        let style = highlight_style();
        self.features
            .iter()
            .map(|ping| PointMarker {
                device_id: ping.device_id(),
                position: ping.position,
                style,
                popup: None,
            })
            .collect()
    }
}

impl FeatureLayer<Track> {
    /// Point tracks (a device with a single fix) are drawn as one-vertex lines.
    pub fn extract_lines(&self) -> Vec<TrackLine> {
        if !self.visible {
            return Vec::new();
        }
        let style = LineStyle::default();
        self.features
            .iter()
            .map(|track| TrackLine {
                device_id: track.properties.device_id,
                points: match &track.geometry {
                    TrackGeometry::Point(p) => vec![*p],
                    TrackGeometry::Line(line) => line.clone(),
                },
                style,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::FeatureLayer;
    use crate::layer::{Layer, LayerId, LayerKind};
    use crate::symbology::{HIGHLIGHT_COLOR, MORTALITY_COLOR};
    use chrono::{FixedOffset, TimeZone, Utc};
    use formats::geojson::GeoPoint;
    use formats::telemetry::{AnimalStatus, FeatureCollection, Ping, PingProperties};
    use foundation::ids::DeviceId;
    use std::sync::Arc;

    fn pings() -> Arc<FeatureCollection<Ping>> {
        let at = Utc.with_ymd_and_hms(2023, 1, 5, 10, 0, 0).unwrap();
        let mut dead = PingProperties::new(DeviceId(2), at);
        dead.status = AnimalStatus::Mortality;
        Arc::new(FeatureCollection::new(vec![
            Ping::new(GeoPoint::new(1.0, 1.0), PingProperties::new(DeviceId(1), at)),
            Ping::new(GeoPoint::new(2.0, 2.0), dead),
        ]))
    }

    #[test]
    fn replace_and_clear() {
        let mut layer = FeatureLayer::new(LayerId::PINGS, "Critter Locations");
        assert_eq!(layer.kind(), LayerKind::Overlay);
        layer.replace(pings());
        assert_eq!(layer.len(), 2);
        layer.clear();
        assert!(layer.is_empty());
    }

    #[test]
    fn markers_are_styled_per_ping() {
        let mut layer = FeatureLayer::new(LayerId::PINGS, "Critter Locations");
        layer.replace(pings());
        let markers = layer.extract_markers(FixedOffset::east_opt(0).unwrap());
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[1].style.fill_color, MORTALITY_COLOR);
        assert!(markers[0].popup.is_some());

        let highlight = layer.extract_highlight();
        assert!(highlight.iter().all(|m| m.style.fill_color == HIGHLIGHT_COLOR));
        assert!(highlight.iter().all(|m| m.popup.is_none()));
    }

    #[test]
    fn hidden_layers_extract_nothing() {
        let mut layer = FeatureLayer::new(LayerId::PINGS, "Critter Locations");
        layer.replace(pings());
        layer.set_visible(false);
        assert!(layer.extract_markers(FixedOffset::east_opt(0).unwrap()).is_empty());
        assert_eq!(layer.len(), 2);
    }
}
