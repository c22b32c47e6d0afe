use std::sync::Arc;

use chrono::{FixedOffset, Offset, Utc};
use formats::geojson::{GeoPoint, VectorGeometry};
use formats::telemetry::{FeatureCollection, Ping, Track};
use runtime::metrics::{Metrics, names};
use scene::selection::{Selection, compute_selection};
use scene::shapes::{DrawEvent, ShapeError, ShapeId, ShapeSet};

use crate::layer::{Layer, LayerId, LayerKind, OverlayKind};
use crate::raster::TileLayer;
use crate::vector::{FeatureLayer, PointMarker, TrackLine};

/// Draw tools offered on the map. Markers, lines and circles are never offered.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DrawControl {
    pub polygon: bool,
    pub rectangle: bool,
    /// Layer whose shapes the edit/delete tools act on.
    pub edit_layer: LayerId,
}

impl Default for DrawControl {
    fn default() -> Self {
        Self {
            polygon: true,
            rectangle: true,
            edit_layer: LayerId::DRAWN_SHAPES,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapOptions {
    pub center: GeoPoint,
    pub zoom: u8,
    /// The first layer starts active. Empty means [`TileLayer::defaults`].
    pub base_layers: Vec<TileLayer>,
    pub draw: DrawControl,
    /// Offset used for timestamps in popups.
    pub display_offset: FixedOffset,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            center: GeoPoint::new(-128.0, 55.0),
            zoom: 6,
            base_layers: TileLayer::defaults(),
            draw: DrawControl::default(),
            display_offset: Utc.fix(),
        }
    }
}

#[derive(Debug, Clone)]
struct MapSurface {
    center: GeoPoint,
    zoom: u8,
    base_layers: Vec<TileLayer>,
    active_base: LayerId,
    draw: DrawControl,
    display_offset: FixedOffset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerEntry {
    pub id: LayerId,
    pub name: String,
    pub kind: LayerKind,
    /// Active base layer, or visible overlay.
    pub enabled: bool,
}

/// Render-ready view of every layer.
#[derive(Debug, Clone, PartialEq)]
pub struct MapSnapshot {
    pub center: GeoPoint,
    pub zoom: u8,
    pub base_layer: TileLayer,
    pub picker: Vec<PickerEntry>,
    pub draw: DrawControl,
    pub points: Vec<PointMarker>,
    pub tracks: Vec<TrackLine>,
    pub shapes: Vec<(ShapeId, VectorGeometry)>,
    pub highlight: Vec<PointMarker>,
}

/// Owns the map surface and every layer on it.
///
/// Layer contents can change before [`MapLayerManager::initialize`]; only
/// the snapshot needs a surface.
#[derive(Debug)]
pub struct MapLayerManager {
    surface: Option<MapSurface>,
    tracks: FeatureLayer<Track>,
    pings: FeatureLayer<Ping>,
    highlight: FeatureLayer<Ping>,
    shapes: ShapeSet,
    selection: Selection,
    metrics: Metrics,
}

impl Default for MapLayerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MapLayerManager {
    pub fn new() -> Self {
        Self {
            surface: None,
            tracks: FeatureLayer::new(LayerId::TRACKS, "Critter Tracks"),
            pings: FeatureLayer::new(LayerId::PINGS, "Critter Locations"),
            highlight: FeatureLayer::new(LayerId::SELECTION_HIGHLIGHT, "Selected Pings"),
            shapes: ShapeSet::new(),
            selection: Selection::empty(),
            metrics: Metrics::new(),
        }
    }

    /// Builds the surface once. Returns `false` if it already exists.
    pub fn initialize(&mut self, options: MapOptions) -> bool {
        if self.surface.is_some() {
            tracing::debug!("map surface already initialized");
            return false;
        }
        let base_layers = if options.base_layers.is_empty() {
            TileLayer::defaults()
        } else {
            options.base_layers
        };
        let active_base = base_layers
            .first()
            .map(|l| l.id())
            .unwrap_or(LayerId::BASE_IMAGERY);
        tracing::info!(
            "map surface initialized at ({}, {}) zoom {} with {} base layers",
            options.center.lat,
            options.center.lon,
            options.zoom,
            base_layers.len()
        );
        self.surface = Some(MapSurface {
            center: options.center,
            zoom: options.zoom,
            base_layers,
            active_base,
            draw: options.draw,
            display_offset: options.display_offset,
        });
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.surface.is_some()
    }

    /// Activates one base layer and deactivates the rest.
    ///
    /// Returns `false` for an unknown layer or before initialization.
    pub fn set_base_layer(&mut self, id: LayerId) -> bool {
        let Some(surface) = self.surface.as_mut() else {
            return false;
        };
        if !surface.base_layers.iter().any(|l| l.id() == id) {
            tracing::warn!("unknown base layer {id:?}");
            return false;
        }
        surface.active_base = id;
        true
    }

    pub fn active_base_layer(&self) -> Option<&TileLayer> {
        let surface = self.surface.as_ref()?;
        surface
            .base_layers
            .iter()
            .find(|l| l.id() == surface.active_base)
    }

    pub fn set_overlay_visible(&mut self, overlay: OverlayKind, visible: bool) {
        match overlay {
            OverlayKind::Tracks => self.tracks.set_visible(visible),
            OverlayKind::Pings => self.pings.set_visible(visible),
        }
    }

    pub fn overlay_visible(&self, overlay: OverlayKind) -> bool {
        match overlay {
            OverlayKind::Tracks => self.tracks.is_visible(),
            OverlayKind::Pings => self.pings.is_visible(),
        }
    }

    /// Replaces the ping layer and recomputes the selection against it.
    pub fn ingest_pings(&mut self, pings: Arc<FeatureCollection<Ping>>) -> &Selection {
        self.metrics.record(names::FETCH_FEATURES, pings.len() as u64);
        self.pings.replace(pings);
        self.recompute_selection()
    }

    pub fn ingest_tracks(&mut self, tracks: Arc<FeatureCollection<Track>>) {
        self.metrics.record(names::FETCH_FEATURES, tracks.len() as u64);
        self.tracks.replace(tracks);
    }

    /// Empties the ping, track and highlight layers. Drawn shapes stay.
    pub fn clear_transient(&mut self) {
        self.pings.clear();
        self.tracks.clear();
        self.highlight.clear();
        self.selection = Selection::empty();
    }

    /// Applies a draw-control change, then recomputes the selection.
    ///
    /// An invalid change leaves shapes and selection untouched.
    pub fn handle_draw_event(&mut self, event: &DrawEvent) -> Result<&Selection, ShapeError> {
        self.shapes.apply(event)?;
        Ok(self.recompute_selection())
    }

    fn recompute_selection(&mut self) -> &Selection {
        let selection = compute_selection(self.pings.features(), &self.shapes);
        self.metrics.incr(names::SELECTION_RECOMPUTE);
        self.metrics
            .record(names::SELECTION_MATCHED, selection.len() as u64);
        self.highlight
            .replace(Arc::new(selection.matched.clone()));
        self.selection = selection;
        &self.selection
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn shapes(&self) -> &ShapeSet {
        &self.shapes
    }

    pub fn pings(&self) -> &FeatureLayer<Ping> {
        &self.pings
    }

    pub fn tracks(&self) -> &FeatureLayer<Track> {
        &self.tracks
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// `None` until the surface exists.
    pub fn snapshot(&self) -> Option<MapSnapshot> {
        let surface = self.surface.as_ref()?;
        let base_layer = self.active_base_layer()?.clone();

        let mut picker: Vec<PickerEntry> = surface
            .base_layers
            .iter()
            .map(|l| PickerEntry {
                id: l.id(),
                name: l.name().to_string(),
                kind: l.kind(),
                enabled: l.id() == surface.active_base,
            })
            .collect();
        picker.push(overlay_entry(&self.tracks));
        picker.push(overlay_entry(&self.pings));

        Some(MapSnapshot {
            center: surface.center,
            zoom: surface.zoom,
            base_layer,
            picker,
            draw: surface.draw,
            points: self.pings.extract_markers(surface.display_offset),
            tracks: self.tracks.extract_lines(),
            shapes: self
                .shapes
                .iter()
                .map(|s| (s.id, s.to_geometry()))
                .collect(),
            highlight: self.highlight.extract_highlight(),
        })
    }
}

fn overlay_entry<T>(layer: &FeatureLayer<T>) -> PickerEntry {
    PickerEntry {
        id: layer.id(),
        name: layer.name().to_string(),
        kind: layer.kind(),
        enabled: layer.is_visible(),
    }
}

#[cfg(test)]
mod tests {
    use super::{MapLayerManager, MapOptions};
    use crate::layer::{Layer, LayerId, LayerKind, OverlayKind};
    use crate::symbology::{HIGHLIGHT_COLOR, LIVE_COLOR, MORTALITY_COLOR};
    use chrono::{TimeZone, Utc};
    use formats::geojson::{GeoPoint, VectorGeometry};
    use formats::telemetry::{AnimalStatus, FeatureCollection, Ping, PingProperties};
    use foundation::ids::DeviceId;
    use pretty_assertions::assert_eq;
    use scene::shapes::{DrawEvent, ShapeError};
    use std::sync::Arc;

    fn ping(device: u64, lon: f64, lat: f64, status: AnimalStatus) -> Ping {
        let at = Utc.with_ymd_and_hms(2023, 1, 5, 10, 0, 0).unwrap();
        let mut props = PingProperties::new(DeviceId(device), at);
        props.status = status;
        Ping::new(GeoPoint::new(lon, lat), props)
    }

    fn pings() -> Arc<FeatureCollection<Ping>> {
        Arc::new(FeatureCollection::new(vec![
            ping(10, 1.0, 1.0, AnimalStatus::Alive),
            ping(22, 2.0, 3.0, AnimalStatus::Mortality),
            ping(30, 9.0, 9.0, AnimalStatus::Alive),
        ]))
    }

    fn triangle() -> DrawEvent {
        DrawEvent::ShapeCreated {
            geometry: VectorGeometry::Polygon(vec![vec![
                GeoPoint::new(0.0, 0.0),
                GeoPoint::new(10.0, 0.0),
                GeoPoint::new(0.0, 10.0),
                GeoPoint::new(0.0, 0.0),
            ]]),
        }
    }

    #[test]
    fn initialize_is_idempotent() {
        let mut manager = MapLayerManager::new();
        assert!(manager.snapshot().is_none());
        assert!(manager.initialize(MapOptions::default()));
        assert!(!manager.initialize(MapOptions {
            zoom: 12,
            ..MapOptions::default()
        }));

        let snap = manager.snapshot().unwrap();
        assert_eq!(snap.zoom, 6);
        assert_eq!(snap.base_layer.id(), LayerId::BASE_IMAGERY);
        assert!(snap.draw.polygon && snap.draw.rectangle);
    }

    #[test]
    fn exactly_one_base_layer_is_active() {
        let mut manager = MapLayerManager::new();
        assert!(!manager.set_base_layer(LayerId::BASE_ROADS));
        manager.initialize(MapOptions::default());

        assert!(manager.set_base_layer(LayerId::BASE_ROADS));
        assert!(!manager.set_base_layer(LayerId(99)));

        let snap = manager.snapshot().unwrap();
        let active: Vec<LayerId> = snap
            .picker
            .iter()
            .filter(|e| e.kind == LayerKind::Base && e.enabled)
            .map(|e| e.id)
            .collect();
        assert_eq!(active, vec![LayerId::BASE_ROADS]);
    }

    #[test]
    fn drawing_selects_pings_and_highlights_them() {
        let mut manager = MapLayerManager::new();
        manager.initialize(MapOptions::default());
        manager.ingest_pings(pings());

        let selection = manager.handle_draw_event(&triangle()).unwrap();
        assert_eq!(selection.device_ids, vec![DeviceId(10), DeviceId(22)]);

        let snap = manager.snapshot().unwrap();
        assert_eq!(snap.points.len(), 3);
        assert_eq!(snap.points[0].style.fill_color, LIVE_COLOR);
        assert_eq!(snap.points[1].style.fill_color, MORTALITY_COLOR);
        assert_eq!(snap.highlight.len(), 2);
        assert!(snap.highlight.iter().all(|m| m.style.fill_color == HIGHLIGHT_COLOR));
        assert_eq!(snap.shapes.len(), 1);
    }

    #[test]
    fn new_pings_recompute_against_existing_shapes() {
        let mut manager = MapLayerManager::new();
        manager.handle_draw_event(&triangle()).unwrap();
        assert!(manager.selection().is_empty());

        let selection = manager.ingest_pings(pings());
        assert_eq!(selection.device_ids, vec![DeviceId(10), DeviceId(22)]);
    }

    #[test]
    fn clearing_transient_layers_keeps_shapes() {
        let mut manager = MapLayerManager::new();
        manager.initialize(MapOptions::default());
        manager.ingest_pings(pings());
        manager.handle_draw_event(&triangle()).unwrap();

        manager.clear_transient();
        let snap = manager.snapshot().unwrap();
        assert!(snap.points.is_empty());
        assert!(snap.highlight.is_empty());
        assert_eq!(snap.shapes.len(), 1);
        assert!(manager.selection().is_empty());
    }

    #[test]
    fn invalid_draw_event_leaves_selection() {
        let mut manager = MapLayerManager::new();
        manager.ingest_pings(pings());
        manager.handle_draw_event(&triangle()).unwrap();

        let err = manager
            .handle_draw_event(&DrawEvent::ShapeCreated {
                geometry: VectorGeometry::Point(GeoPoint::new(0.0, 0.0)),
            })
            .unwrap_err();
        assert_eq!(err, ShapeError::UnsupportedGeometry("Point"));
        assert_eq!(manager.selection().len(), 2);
    }

    #[test]
    fn hidden_overlay_is_not_rendered() {
        let mut manager = MapLayerManager::new();
        manager.initialize(MapOptions::default());
        manager.ingest_pings(pings());
        manager.set_overlay_visible(OverlayKind::Pings, false);

        let snap = manager.snapshot().unwrap();
        assert!(snap.points.is_empty());
        assert!(!manager.overlay_visible(OverlayKind::Pings));
        assert!(manager.overlay_visible(OverlayKind::Tracks));
    }
}
