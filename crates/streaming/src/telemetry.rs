use std::sync::Arc;

use foundation::time::{TimeWindow, WindowKey};
use formats::telemetry::{FeatureCollection, Ping, Track};
use futures_util::future::{BoxFuture, LocalBoxFuture};
use runtime::metrics::Metrics;

use crate::cache::QueryCache;
use crate::source::{FetchError, PingExtent, TelemetrySource};

pub const PINGS_RESOURCE: &str = "pings";
pub const TRACKS_RESOURCE: &str = "tracks";

pub type PingResult = Result<Arc<FeatureCollection<Ping>>, FetchError>;
pub type TrackResult = Result<Arc<FeatureCollection<Track>>, FetchError>;

/// Ping and track caches over one shared source.
#[derive(Clone)]
pub struct TelemetryCache {
    source: Arc<dyn TelemetrySource>,
    pings: QueryCache<FeatureCollection<Ping>>,
    tracks: QueryCache<FeatureCollection<Track>>,
}

impl TelemetryCache {
    /// `windows` is the number of windows kept per resource.
    pub fn new(source: Arc<dyn TelemetrySource>, windows: usize) -> Self {
        Self {
            source,
            pings: QueryCache::new(windows),
            tracks: QueryCache::new(windows),
        }
    }

    pub fn ping_key(window: TimeWindow) -> WindowKey {
        window.key(PINGS_RESOURCE)
    }

    pub fn track_key(window: TimeWindow) -> WindowKey {
        window.key(TRACKS_RESOURCE)
    }

    pub fn fetch_pings(&self, window: TimeWindow) -> LocalBoxFuture<'static, PingResult> {
        let source = Arc::clone(&self.source);
        self.pings
            .get_or_fetch(Self::ping_key(window), move || source.fetch_pings(window))
    }

    pub fn fetch_tracks(&self, window: TimeWindow) -> LocalBoxFuture<'static, TrackResult> {
        let source = Arc::clone(&self.source);
        self.tracks
            .get_or_fetch(Self::track_key(window), move || source.fetch_tracks(window))
    }

    /// Not cached; the extent is only read on explicit request.
    pub fn fetch_ping_extent(&self) -> BoxFuture<'static, Result<PingExtent, FetchError>> {
        self.source.fetch_ping_extent()
    }

    pub fn pings(&self) -> &QueryCache<FeatureCollection<Ping>> {
        &self.pings
    }

    pub fn tracks(&self) -> &QueryCache<FeatureCollection<Track>> {
        &self.tracks
    }

    /// Ping and track cache metrics, summed.
    pub fn metrics(&self) -> Metrics {
        let mut merged = self.pings.metrics();
        merged.merge(&self.tracks.metrics());
        merged
    }
}
