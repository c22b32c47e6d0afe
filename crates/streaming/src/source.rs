//! Telemetry data sources.
//!
//! The engine only reads from the backend: pings and tracks for a time
//! window, plus the overall date range of recorded pings. Sources return
//! `'static` boxed futures so results can outlive the caller's borrow.

use chrono::{DateTime, NaiveDate};
use foundation::time::TimeWindow;
use formats::telemetry::{FeatureCollection, Ping, Track};
use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("telemetry API returned HTTP {status}")]
    Http { status: u16 },
    #[error("telemetry request failed: {0}")]
    Transport(String),
    #[error("invalid telemetry response: {0}")]
    Decode(String),
}

/// Earliest and latest day with recorded pings.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PingExtent {
    pub min: NaiveDate,
    pub max: NaiveDate,
}

impl PingExtent {
    pub fn to_window(self) -> TimeWindow {
        TimeWindow::new(self.min, self.max)
    }

    pub fn from_value(value: &Value) -> Result<Self, FetchError> {
        #[derive(Deserialize)]
        struct Raw {
            min: String,
            max: String,
        }
        let raw: Raw =
            serde_json::from_value(value.clone()).map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(Self {
            min: parse_day(&raw.min)?,
            max: parse_day(&raw.max)?,
        })
    }
}

/// Accepts a bare `YYYY-MM-DD` or an RFC 3339 timestamp.
fn parse_day(raw: &str) -> Result<NaiveDate, FetchError> {
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(day);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.date_naive())
        .map_err(|e| FetchError::Decode(format!("bad extent date {raw:?}: {e}")))
}

/// Read-only view of the telemetry backend.
///
/// Implementations must be `Send + Sync`; methods return boxed futures for
/// dyn-compatibility.
pub trait TelemetrySource: Send + Sync {
    fn fetch_pings(
        &self,
        window: TimeWindow,
    ) -> BoxFuture<'static, Result<FeatureCollection<Ping>, FetchError>>;

    fn fetch_tracks(
        &self,
        window: TimeWindow,
    ) -> BoxFuture<'static, Result<FeatureCollection<Track>, FetchError>>;

    fn fetch_ping_extent(&self) -> BoxFuture<'static, Result<PingExtent, FetchError>>;
}

/// REST client for the telemetry API.
pub struct HttpSource {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            client: reqwest::Client::new(),
        }
    }

    /// Bearer token supplied by the host's auth layer.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_json(
        &self,
        endpoint: &str,
        window: Option<TimeWindow>,
    ) -> BoxFuture<'static, Result<Value, FetchError>> {
        let url = format!("{}/{endpoint}", self.base_url);
        let mut req = self.client.get(&url);
        if let Some(window) = window {
            req = req.query(&[
                ("start", window.start().format("%Y-%m-%d").to_string()),
                ("end", window.end().format("%Y-%m-%d").to_string()),
            ]);
        }
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        Box::pin(async move {
            tracing::debug!("GET {url}");
            let resp = req
                .send()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?;
            if !resp.status().is_success() {
                return Err(FetchError::Http {
                    status: resp.status().as_u16(),
                });
            }
            resp.json::<Value>()
                .await
                .map_err(|e| FetchError::Decode(e.to_string()))
        })
    }
}

impl TelemetrySource for HttpSource {
    fn fetch_pings(
        &self,
        window: TimeWindow,
    ) -> BoxFuture<'static, Result<FeatureCollection<Ping>, FetchError>> {
        let body = self.get_json("get-critters", Some(window));
        Box::pin(async move {
            FeatureCollection::from_geojson_value(&body.await?)
                .map_err(|e| FetchError::Decode(e.to_string()))
        })
    }

    fn fetch_tracks(
        &self,
        window: TimeWindow,
    ) -> BoxFuture<'static, Result<FeatureCollection<Track>, FetchError>> {
        let body = self.get_json("get-critter-tracks", Some(window));
        Box::pin(async move {
            FeatureCollection::from_geojson_value(&body.await?)
                .map_err(|e| FetchError::Decode(e.to_string()))
        })
    }

    fn fetch_ping_extent(&self) -> BoxFuture<'static, Result<PingExtent, FetchError>> {
        let body = self.get_json("get-ping-extent", None);
        Box::pin(async move { PingExtent::from_value(&body.await?) })
    }
}

#[cfg(test)]
mod tests {
    use super::{FetchError, HttpSource, PingExtent};
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn extent_accepts_dates_and_timestamps() {
        let extent =
            PingExtent::from_value(&json!({"min": "2021-03-04", "max": "2023-01-14T08:00:00Z"}))
                .unwrap();
        assert_eq!(extent.min, NaiveDate::from_ymd_opt(2021, 3, 4).unwrap());
        assert_eq!(extent.max, NaiveDate::from_ymd_opt(2023, 1, 14).unwrap());

        let window = extent.to_window();
        assert_eq!(window.start(), extent.min);
        assert_eq!(window.end(), extent.max);
    }

    #[test]
    fn extent_rejects_garbage() {
        let err = PingExtent::from_value(&json!({"min": "yesterday", "max": "2023-01-14"}));
        assert!(matches!(err, Err(FetchError::Decode(_))));
        let err = PingExtent::from_value(&json!({"min": "2023-01-01"}));
        assert!(matches!(err, Err(FetchError::Decode(_))));
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let source = HttpSource::new("https://telemetry.example/api/").with_token("t");
        assert_eq!(source.base_url(), "https://telemetry.example/api");
    }
}
