use chrono::NaiveDate;
use foundation::time::TimeWindow;
use runtime::event_bus::{EventBus, SubscriptionId};

/// Holds the committed time window and notifies subscribers when it moves.
///
/// Setters never fail: out-of-order dates are clamped so `start <= end`
/// always holds. Subscribers only hear about actual changes.
pub struct TimeWindowStore {
    window: TimeWindow,
    bus: EventBus<TimeWindow>,
}

impl TimeWindowStore {
    pub fn new(window: TimeWindow) -> Self {
        Self {
            window,
            bus: EventBus::unlogged(),
        }
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    pub fn start(&self) -> NaiveDate {
        self.window.start()
    }

    pub fn end(&self) -> NaiveDate {
        self.window.end()
    }

    /// Returns `true` if the committed window changed.
    pub fn set_start(&mut self, start: NaiveDate) -> bool {
        if start > self.window.end() {
            tracing::debug!(
                "start {start} is after end {}; clamping",
                self.window.end()
            );
        }
        self.commit(self.window.with_start(start))
    }

    /// Returns `true` if the committed window changed.
    pub fn set_end(&mut self, end: NaiveDate) -> bool {
        if end < self.window.start() {
            tracing::debug!(
                "end {end} is before start {}; clamping",
                self.window.start()
            );
        }
        self.commit(self.window.with_end(end))
    }

    /// Replaces both ends at once; `start > end` commits `[end, end]`.
    pub fn set_window(&mut self, start: NaiveDate, end: NaiveDate) -> bool {
        if start > end {
            tracing::debug!("window {start}..{end} is inverted; clamping");
        }
        self.commit(TimeWindow::new(start, end))
    }

    pub fn subscribe(&mut self, handler: impl FnMut(&TimeWindow) + 'static) -> SubscriptionId {
        self.bus.subscribe(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    fn commit(&mut self, window: TimeWindow) -> bool {
        if window == self.window {
            return false;
        }
        self.window = window;
        self.bus.emit(window);
        true
    }
}

impl std::fmt::Debug for TimeWindowStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeWindowStore")
            .field("window", &self.window)
            .field("subscribers", &self.bus.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::TimeWindowStore;
    use chrono::NaiveDate;
    use foundation::time::TimeWindow;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, m, day).unwrap()
    }

    fn store() -> (TimeWindowStore, Rc<RefCell<Vec<TimeWindow>>>) {
        let mut store = TimeWindowStore::new(TimeWindow::new(d(1, 1), d(1, 14)));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        store.subscribe(move |w| sink.borrow_mut().push(*w));
        (store, seen)
    }

    #[test]
    fn start_after_end_is_clamped_to_end() {
        let (mut store, seen) = store();
        assert!(store.set_start(d(2, 1)));
        assert_eq!((store.start(), store.end()), (d(1, 14), d(1, 14)));
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn end_before_start_is_clamped_to_start() {
        let (mut store, _) = store();
        assert!(store.set_end(d(1, 1)));
        assert_eq!((store.start(), store.end()), (d(1, 1), d(1, 1)));

        // Moving the end further back changes nothing.
        assert!(!store.set_end(d(1, 1) - chrono::Duration::days(30)));
    }

    #[test]
    fn unchanged_values_do_not_notify() {
        let (mut store, seen) = store();
        assert!(!store.set_start(d(1, 1)));
        assert!(!store.set_window(d(1, 1), d(1, 14)));
        assert!(seen.borrow().is_empty());

        assert!(store.set_window(d(1, 3), d(1, 10)));
        assert_eq!(*seen.borrow(), vec![TimeWindow::new(d(1, 3), d(1, 10))]);
    }

    #[test]
    fn unsubscribed_handlers_are_not_called() {
        let mut store = TimeWindowStore::new(TimeWindow::new(d(1, 1), d(1, 14)));
        let count = Rc::new(RefCell::new(0));
        let c = Rc::clone(&count);
        let id = store.subscribe(move |_| *c.borrow_mut() += 1);

        store.set_end(d(1, 20));
        assert!(store.unsubscribe(id));
        store.set_end(d(1, 25));
        assert_eq!(*count.borrow(), 1);
    }
}
