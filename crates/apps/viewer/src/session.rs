use std::cell::RefCell;
use std::future::IntoFuture;
use std::rc::Rc;
use std::sync::Arc;

use chrono::NaiveDate;
use foundation::ids::DeviceId;
use foundation::time::TimeWindow;
use futures_util::future::{LocalBoxFuture, join};
use layers::manager::{MapLayerManager, MapOptions, MapSnapshot};
use runtime::event_bus::{EventBus, SubscriptionId};
use runtime::metrics::{Metrics, names};
use scene::shapes::{DrawEvent, ShapeError};
use streaming::source::{FetchError, TelemetrySource};
use streaming::telemetry::{PingResult, TelemetryCache, TrackResult};

use crate::config::ViewerConfig;
use crate::export::{
    Download, DownloadSink, ExportError, ExportFormat, ExportSource, encode_download, export_set,
};
use crate::sidebar::{SidebarContent, SidebarSlot};
use crate::window_store::TimeWindowStore;

/// Outbound notifications for the host page.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    WindowCommitted { window: TimeWindow },
    FetchStarted { window: TimeWindow },
    FetchFinished { window: TimeWindow, pings: usize, tracks: usize },
    FetchFailed { window: TimeWindow, error: FetchError },
    StaleResultDiscarded { window: TimeWindow },
    SelectionChanged { device_ids: Vec<DeviceId> },
    DownloadReady { filename: String, features: usize },
}

/// Settled ping and track fetches for one window.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub window: TimeWindow,
    pub pings: PingResult,
    pub tracks: TrackResult,
}

type Outstanding = Rc<RefCell<Vec<(u64, TimeWindow)>>>;

/// Keeps a window marked busy until the fetch settles or is dropped.
struct PendingFetch {
    id: u64,
    outstanding: Outstanding,
}

impl Drop for PendingFetch {
    fn drop(&mut self) {
        self.outstanding
            .borrow_mut()
            .retain(|(id, _)| *id != self.id);
    }
}

/// Pending fetch of both resources for the window active when it was issued.
///
/// Await it, then hand the outcome back to [`MapSession::apply`]. Dropping
/// the ticket (or its future) abandons the refresh.
pub struct RefreshTicket {
    window: TimeWindow,
    pending: PendingFetch,
    pings: LocalBoxFuture<'static, PingResult>,
    tracks: LocalBoxFuture<'static, TrackResult>,
}

impl RefreshTicket {
    pub fn window(&self) -> TimeWindow {
        self.window
    }
}

impl IntoFuture for RefreshTicket {
    type Output = RefreshOutcome;
    type IntoFuture = LocalBoxFuture<'static, RefreshOutcome>;

    fn into_future(self) -> Self::IntoFuture {
        let RefreshTicket {
            window,
            pending,
            pings,
            tracks,
        } = self;
        Box::pin(async move {
            let (pings, tracks) = join(pings, tracks).await;
            drop(pending);
            RefreshOutcome {
                window,
                pings,
                tracks,
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApplyResult {
    Applied { pings: usize, tracks: usize },
    /// The window moved on while the fetch was outstanding.
    Stale,
    /// Layers were left as they were.
    Failed(FetchError),
}

/// The map page engine: time window, telemetry cache, layers and exports.
pub struct MapSession {
    config: ViewerConfig,
    store: TimeWindowStore,
    cache: TelemetryCache,
    layers: MapLayerManager,
    events: EventBus<MapEvent>,
    outstanding: Outstanding,
    next_ticket: u64,
    last_error: Option<FetchError>,
    metrics: Metrics,
}

impl MapSession {
    /// Starts with a trailing window of `config.window_days` ending `today`.
    pub fn new(config: ViewerConfig, source: Arc<dyn TelemetrySource>, today: NaiveDate) -> Self {
        let window = TimeWindow::trailing_days(today, config.window_days);
        Self {
            store: TimeWindowStore::new(window),
            cache: TelemetryCache::new(source, config.cache_windows),
            layers: MapLayerManager::new(),
            events: EventBus::unlogged(),
            outstanding: Rc::new(RefCell::new(Vec::new())),
            next_ticket: 0,
            last_error: None,
            metrics: Metrics::new(),
            config,
        }
    }

    /// Builds the map surface and fills the sidebar. Later calls do nothing.
    pub fn initialize(&mut self, sidebar: &mut dyn SidebarSlot) -> bool {
        let options = MapOptions {
            display_offset: self.config.display_offset,
            ..MapOptions::default()
        };
        if !self.layers.initialize(options) {
            return false;
        }
        sidebar.set_content(SidebarContent::DateRange {
            start: self.store.start(),
            end: self.store.end(),
        });
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.layers.is_initialized()
    }

    pub fn set_start(&mut self, start: NaiveDate) -> bool {
        let changed = self.store.set_start(start);
        self.after_window_commit(changed)
    }

    pub fn set_end(&mut self, end: NaiveDate) -> bool {
        let changed = self.store.set_end(end);
        self.after_window_commit(changed)
    }

    pub fn set_window(&mut self, start: NaiveDate, end: NaiveDate) -> bool {
        let changed = self.store.set_window(start, end);
        self.after_window_commit(changed)
    }

    fn after_window_commit(&mut self, changed: bool) -> bool {
        if changed {
            let window = self.store.window();
            tracing::info!("window committed: {window}");
            let had_selection = !self.layers.selection().is_empty();
            self.layers.clear_transient();
            self.events.emit(MapEvent::WindowCommitted { window });
            if had_selection {
                self.events.emit(MapEvent::SelectionChanged {
                    device_ids: Vec::new(),
                });
            }
        }
        changed
    }

    /// Window-change notifications, for hosts that keep date pickers in sync.
    pub fn subscribe_window(
        &mut self,
        handler: impl FnMut(&TimeWindow) + 'static,
    ) -> SubscriptionId {
        self.store.subscribe(handler)
    }

    pub fn unsubscribe_window(&mut self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }

    /// Starts (or joins) the fetches for the active window.
    pub fn begin_refresh(&mut self) -> RefreshTicket {
        let window = self.store.window();
        self.next_ticket += 1;
        self.outstanding
            .borrow_mut()
            .push((self.next_ticket, window));
        self.events.emit(MapEvent::FetchStarted { window });
        RefreshTicket {
            window,
            pending: PendingFetch {
                id: self.next_ticket,
                outstanding: Rc::clone(&self.outstanding),
            },
            pings: self.cache.fetch_pings(window),
            tracks: self.cache.fetch_tracks(window),
        }
    }

    /// Ingests `outcome` if its window is still the active one.
    ///
    /// Results are applied all-or-nothing: if either resource failed the
    /// layers keep their current contents.
    pub fn apply(&mut self, outcome: RefreshOutcome) -> ApplyResult {
        let window = outcome.window;
        if window != self.store.window() {
            tracing::warn!(
                "discarding result for {window}; active window is {}",
                self.store.window()
            );
            self.metrics.incr(names::STALE_DISCARDED);
            self.events.emit(MapEvent::StaleResultDiscarded { window });
            return ApplyResult::Stale;
        }

        let (pings, tracks) = match (outcome.pings, outcome.tracks) {
            (Ok(pings), Ok(tracks)) => (pings, tracks),
            (Err(error), _) | (_, Err(error)) => {
                tracing::warn!("fetch for {window} failed: {error}");
                self.last_error = Some(error.clone());
                self.events.emit(MapEvent::FetchFailed {
                    window,
                    error: error.clone(),
                });
                return ApplyResult::Failed(error);
            }
        };

        let (ping_count, track_count) = (pings.len(), tracks.len());
        self.layers.ingest_tracks(tracks);
        let device_ids = self.layers.ingest_pings(pings).device_ids.clone();
        self.last_error = None;
        tracing::debug!("ingested {ping_count} pings and {track_count} tracks for {window}");
        self.events.emit(MapEvent::FetchFinished {
            window,
            pings: ping_count,
            tracks: track_count,
        });
        self.events.emit(MapEvent::SelectionChanged { device_ids });
        ApplyResult::Applied {
            pings: ping_count,
            tracks: track_count,
        }
    }

    pub async fn refresh(&mut self) -> ApplyResult {
        let outcome = self.begin_refresh().await;
        self.apply(outcome)
    }

    /// Moves the window to the full range of recorded pings.
    ///
    /// Returns whether the window changed. A failure is recorded like a
    /// fetch failure and leaves the window alone.
    pub async fn reset_window_to_extent(&mut self) -> Result<bool, FetchError> {
        match self.cache.fetch_ping_extent().await {
            Ok(extent) => {
                let window = extent.to_window();
                Ok(self.set_window(window.start(), window.end()))
            }
            Err(error) => {
                tracing::warn!("ping extent unavailable: {error}");
                self.last_error = Some(error.clone());
                self.events.emit(MapEvent::FetchFailed {
                    window: self.store.window(),
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    /// Applies a draw-control change and reports the new selection.
    pub fn dispatch_draw(&mut self, event: &DrawEvent) -> Result<Vec<DeviceId>, ShapeError> {
        let device_ids = self.layers.handle_draw_event(event)?.device_ids.clone();
        self.events.emit(MapEvent::SelectionChanged {
            device_ids: device_ids.clone(),
        });
        Ok(device_ids)
    }

    /// Encodes in the configured format.
    pub fn export(&self, source: ExportSource) -> Result<Download, ExportError> {
        self.export_as(source, self.config.export_format)
    }

    pub fn export_as(
        &self,
        source: ExportSource,
        format: ExportFormat,
    ) -> Result<Download, ExportError> {
        let pings = export_set(
            source,
            &self.layers.selection().matched,
            self.layers.pings().features(),
        );
        encode_download(pings, format)
    }

    /// Encodes and hands the file to `sink`.
    pub fn export_to(
        &mut self,
        sink: &mut dyn DownloadSink,
        source: ExportSource,
    ) -> Result<(), ExportError> {
        let features = export_set(
            source,
            &self.layers.selection().matched,
            self.layers.pings().features(),
        )
        .len();
        let download = self.export(source)?;
        let filename = download.filename.clone();
        sink.deliver(download)?;
        tracing::info!("exported {features} pings to {filename}");
        self.events.emit(MapEvent::DownloadReady { filename, features });
        Ok(())
    }

    /// `true` while a fetch for the active window is outstanding.
    pub fn is_busy(&self) -> bool {
        let window = self.store.window();
        self.outstanding.borrow().iter().any(|(_, w)| *w == window)
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    pub fn selected_device_ids(&self) -> &[DeviceId] {
        &self.layers.selection().device_ids
    }

    pub fn window(&self) -> TimeWindow {
        self.store.window()
    }

    /// Outbound event bus. Only subscribers see events unless the host
    /// turns the log on with [`EventBus::set_logging`] and drains it.
    pub fn events(&mut self) -> &mut EventBus<MapEvent> {
        &mut self.events
    }

    pub fn layers(&self) -> &MapLayerManager {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut MapLayerManager {
        &mut self.layers
    }

    pub fn cache(&self) -> &TelemetryCache {
        &self.cache
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Option<MapSnapshot> {
        self.layers.snapshot()
    }

    /// Session, cache and layer metrics, summed.
    pub fn metrics(&self) -> Metrics {
        let mut merged = self.metrics.clone();
        merged.merge(&self.cache.metrics());
        merged.merge(self.layers.metrics());
        merged
    }
}
