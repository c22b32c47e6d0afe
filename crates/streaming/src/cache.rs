use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use foundation::time::WindowKey;
use futures_util::future::{BoxFuture, FutureExt, LocalBoxFuture, Shared, ready};
use runtime::metrics::{Metrics, names};

use crate::request::Request;
use crate::residency::ResidencyState;
use crate::source::FetchError;

type SharedFetch<T> = Shared<LocalBoxFuture<'static, Result<Arc<T>, FetchError>>>;

enum Slot<T> {
    Fetching {
        request: Request,
        future: SharedFetch<T>,
    },
    Resident(Arc<T>),
    Failed(FetchError),
}

impl<T> Slot<T> {
    fn state(&self) -> ResidencyState {
        match self {
            Slot::Fetching { .. } => ResidencyState::Fetching,
            Slot::Resident(_) => ResidencyState::Resident,
            Slot::Failed(_) => ResidencyState::Failed,
        }
    }
}

struct CacheEntry<T> {
    slot: Slot<T>,
    last_used_tick: u64,
}

struct CacheInner<T> {
    capacity: usize,
    tick: u64,
    next_request: u64,
    entries: BTreeMap<WindowKey, CacheEntry<T>>,
    metrics: Metrics,
}

enum Lookup<T> {
    Hit(Arc<T>),
    Join(Request, SharedFetch<T>),
    Miss,
}

/// Window-keyed cache of query results with in-flight deduplication.
///
/// Notes:
/// - Single-threaded: state lives in an `Rc<RefCell<_>>` and is never
///   borrowed across an `.await`. Clones share the same entries.
/// - A key already being fetched hands out a clone of the shared future, so
///   concurrent requests for one window cost a single backend call.
/// - Failures are stored and reported to every waiter. Nothing is retried
///   until the next explicit request for that key.
/// - Eviction is LRU by `last_used_tick`, tie-broken by key order. Entries
///   still fetching are never evicted.
pub struct QueryCache<T> {
    inner: Rc<RefCell<CacheInner<T>>>,
}

impl<T> Clone for QueryCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> QueryCache<T> {
    /// `capacity` is the number of windows kept; at least one.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(CacheInner {
                capacity: capacity.max(1),
                tick: 0,
                next_request: 1,
                entries: BTreeMap::new(),
                metrics: Metrics::new(),
            })),
        }
    }

    /// Resolves `key` from the cache, an in-flight fetch, or by calling `fetch`.
    ///
    /// The lookup happens synchronously; the returned future only waits for
    /// the result and records it.
    pub fn get_or_fetch<F>(
        &self,
        key: WindowKey,
        fetch: F,
    ) -> LocalBoxFuture<'static, Result<Arc<T>, FetchError>>
    where
        F: FnOnce() -> BoxFuture<'static, Result<T, FetchError>>,
    {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        inner.tick += 1;

        let lookup = match inner.entries.get_mut(&key) {
            Some(entry) => {
                entry.last_used_tick = inner.tick;
                match &entry.slot {
                    Slot::Resident(value) => Lookup::Hit(Arc::clone(value)),
                    Slot::Fetching { request, future } => Lookup::Join(*request, future.clone()),
                    Slot::Failed(_) => Lookup::Miss,
                }
            }
            None => Lookup::Miss,
        };

        let (request, shared) = match lookup {
            Lookup::Hit(value) => {
                inner.metrics.incr(names::CACHE_HIT);
                tracing::debug!("cache hit: {key}");
                return ready(Ok(value)).boxed_local();
            }
            Lookup::Join(request, shared) => {
                inner.metrics.incr(names::CACHE_DEDUP);
                tracing::debug!("joining in-flight fetch: {key}");
                (request, shared)
            }
            Lookup::Miss => {
                inner.metrics.incr(names::CACHE_MISS);
                inner.metrics.adjust_gauge(names::FETCH_IN_FLIGHT, 1);
                tracing::debug!("cache miss: {key}");

                let request = Request(inner.next_request);
                inner.next_request += 1;
                let shared = fetch()
                    .map(|result| result.map(Arc::new))
                    .boxed_local()
                    .shared();
                inner.entries.insert(
                    key.clone(),
                    CacheEntry {
                        slot: Slot::Fetching {
                            request,
                            future: shared.clone(),
                        },
                        last_used_tick: inner.tick,
                    },
                );
                inner.evict_as_needed(Some(&key));
                (request, shared)
            }
        };
        drop(guard);

        let cache = Rc::clone(&self.inner);
        async move {
            let result = shared.await;
            cache.borrow_mut().settle(&key, request, &result);
            result
        }
        .boxed_local()
    }

    /// Resident value for `key`, without touching recency.
    pub fn peek(&self, key: &WindowKey) -> Option<Arc<T>> {
        match &self.inner.borrow().entries.get(key)?.slot {
            Slot::Resident(value) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    pub fn state(&self, key: &WindowKey) -> Option<ResidencyState> {
        self.inner.borrow().entries.get(key).map(|e| e.slot.state())
    }

    /// Stored failure for `key`, if its last fetch failed.
    pub fn error(&self, key: &WindowKey) -> Option<FetchError> {
        match &self.inner.borrow().entries.get(key)?.slot {
            Slot::Failed(err) => Some(err.clone()),
            _ => None,
        }
    }

    /// Drops the entry. An in-flight fetch still completes for its waiters
    /// but is no longer recorded.
    pub fn invalidate(&self, key: &WindowKey) -> bool {
        let mut inner = self.inner.borrow_mut();
        match inner.entries.remove(key) {
            Some(entry) => {
                if matches!(entry.slot, Slot::Fetching { .. }) {
                    inner.metrics.adjust_gauge(names::FETCH_IN_FLIGHT, -1);
                }
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let keys: Vec<WindowKey> = self.inner.borrow().entries.keys().cloned().collect();
        for key in keys {
            self.invalidate(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.borrow().capacity
    }

    pub fn metrics(&self) -> Metrics {
        self.inner.borrow().metrics.clone()
    }
}

impl<T> CacheInner<T> {
    fn settle(&mut self, key: &WindowKey, request: Request, result: &Result<Arc<T>, FetchError>) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        match &entry.slot {
            Slot::Fetching { request: pending, .. } if *pending == request => {}
            // Already settled by another waiter, or replaced after invalidation.
            _ => return,
        }

        self.metrics.adjust_gauge(names::FETCH_IN_FLIGHT, -1);
        entry.slot = match result {
            Ok(value) => Slot::Resident(Arc::clone(value)),
            Err(err) => {
                self.metrics.incr(names::FETCH_ERROR);
                tracing::warn!("fetch failed for {key}: {err}");
                Slot::Failed(err.clone())
            }
        };
        self.evict_as_needed(Some(key));
    }

    fn evict_as_needed(&mut self, protected: Option<&WindowKey>) -> Vec<WindowKey> {
        let mut evicted = Vec::new();
        while self.entries.len() > self.capacity {
            let candidate = self
                .entries
                .iter()
                .filter(|(k, e)| {
                    e.slot.state().is_settled() && protected.map(|p| p != *k).unwrap_or(true)
                })
                .min_by(|(ka, ea), (kb, eb)| {
                    ea.last_used_tick
                        .cmp(&eb.last_used_tick)
                        .then_with(|| ka.cmp(kb))
                })
                .map(|(k, _)| k.clone());

            // Everything else is in flight; allow the overflow until it settles.
            let Some(key) = candidate else {
                break;
            };
            self.entries.remove(&key);
            self.metrics.incr(names::CACHE_EVICT);
            tracing::debug!("evicted {key}");
            evicted.push(key);
        }
        evicted
    }
}
