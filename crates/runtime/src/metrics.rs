use std::collections::BTreeMap;

/// Well-known metric names shared by the cache, layer manager and session.
pub mod names {
    pub const CACHE_HIT: &str = "cache.hit";
    pub const CACHE_MISS: &str = "cache.miss";
    pub const CACHE_DEDUP: &str = "cache.dedup";
    pub const CACHE_EVICT: &str = "cache.evict";
    pub const FETCH_ERROR: &str = "fetch.error";
    pub const FETCH_IN_FLIGHT: &str = "fetch.in_flight";
    pub const FETCH_FEATURES: &str = "fetch.features";
    pub const SELECTION_RECOMPUTE: &str = "selection.recompute";
    pub const SELECTION_MATCHED: &str = "selection.matched";
    pub const STALE_DISCARDED: &str = "session.stale_discarded";
}

/// In-memory counters, gauges and value summaries.
///
/// Names are kept in sorted maps so snapshots print in a stable order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Metrics {
    counters: BTreeMap<&'static str, u64>,
    gauges: BTreeMap<&'static str, i64>,
    summaries: BTreeMap<&'static str, Summary>,
}

/// Count/min/max/sum of recorded values.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Summary {
    pub count: u64,
    pub sum: u64,
    pub min: u64,
    pub max: u64,
}

impl Summary {
    pub fn record(&mut self, value: u64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum as f64 / self.count as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub counters: Vec<(&'static str, u64)>,
    pub gauges: Vec<(&'static str, i64)>,
    pub summaries: Vec<(&'static str, Summary)>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn incr(&mut self, name: &'static str) {
        self.add(name, 1);
    }

    pub fn add(&mut self, name: &'static str, by: u64) {
        *self.counters.entry(name).or_insert(0) += by;
    }

    pub fn gauge(&self, name: &str) -> i64 {
        self.gauges.get(name).copied().unwrap_or(0)
    }

    /// Adjusts a gauge by `delta`, e.g. +1 when a fetch starts, -1 when it ends.
    pub fn adjust_gauge(&mut self, name: &'static str, delta: i64) {
        *self.gauges.entry(name).or_insert(0) += delta;
    }

    pub fn record(&mut self, name: &'static str, value: u64) {
        self.summaries.entry(name).or_default().record(value);
    }

    pub fn summary(&self, name: &str) -> Option<Summary> {
        self.summaries.get(name).copied()
    }

    /// Adds every counter, gauge and summary of `other` into `self`.
    pub fn merge(&mut self, other: &Metrics) {
        for (name, value) in &other.counters {
            self.add(*name, *value);
        }
        for (name, value) in &other.gauges {
            self.adjust_gauge(*name, *value);
        }
        for (name, summary) in &other.summaries {
            let into = self.summaries.entry(*name).or_default();
            if into.count == 0 {
                *into = *summary;
            } else if summary.count > 0 {
                into.count += summary.count;
                into.sum += summary.sum;
                into.min = into.min.min(summary.min);
                into.max = into.max.max(summary.max);
            }
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self.counters.iter().map(|(k, v)| (*k, *v)).collect(),
            gauges: self.gauges.iter().map(|(k, v)| (*k, *v)).collect(),
            summaries: self.summaries.iter().map(|(k, v)| (*k, *v)).collect(),
        }
    }
}
