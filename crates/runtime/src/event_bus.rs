/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

type Handler<E> = Box<dyn FnMut(&E)>;

/// Typed, single-threaded publish/subscribe bus.
///
/// Subscribers run synchronously inside [`EventBus::emit`], in subscription
/// order. By default every emitted event is also kept in a log until drained
/// so a host without subscribers can poll instead.
pub struct EventBus<E> {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Handler<E>)>,
    keep_log: bool,
    log: Vec<E>,
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            subscribers: Vec::new(),
            keep_log: true,
            log: Vec::new(),
        }
    }

    /// Bus that only notifies subscribers; `events()` stays empty.
    pub fn unlogged() -> Self {
        Self {
            keep_log: false,
            ..Self::new()
        }
    }

    /// Turns the log on or off. Turning it off drops anything not yet drained.
    pub fn set_logging(&mut self, keep_log: bool) {
        self.keep_log = keep_log;
        if !keep_log {
            self.log.clear();
        }
    }

    pub fn is_logging(&self) -> bool {
        self.keep_log
    }

    pub fn subscribe(&mut self, handler: impl FnMut(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(handler)));
        id
    }

    /// Returns `true` if the subscription existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        before != self.subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn emit(&mut self, event: E) {
        for (_, handler) in &mut self.subscribers {
            handler(&event);
        }
        if self.keep_log {
            self.log.push(event);
        }
    }

    pub fn events(&self) -> &[E] {
        &self.log
    }

    pub fn drain(&mut self) -> Vec<E> {
        std::mem::take(&mut self.log)
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: std::fmt::Debug> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .field("log", &self.log)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::EventBus;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Ev {
        A(u32),
        B,
    }

    #[test]
    fn subscribers_see_events_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        let sink = Rc::clone(&seen);
        bus.subscribe(move |e: &Ev| sink.borrow_mut().push(e.clone()));

        bus.emit(Ev::A(1));
        bus.emit(Ev::B);

        assert_eq!(*seen.borrow(), vec![Ev::A(1), Ev::B]);
        assert_eq!(bus.events().len(), 2);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let count = Rc::new(RefCell::new(0));
        let mut bus = EventBus::new();
        let c = Rc::clone(&count);
        let id = bus.subscribe(move |_: &Ev| *c.borrow_mut() += 1);

        bus.emit(Ev::B);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(Ev::B);

        assert_eq!(*count.borrow(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn unlogged_bus_only_notifies() {
        let count = Rc::new(RefCell::new(0));
        let mut bus = EventBus::unlogged();
        let c = Rc::clone(&count);
        bus.subscribe(move |_: &Ev| *c.borrow_mut() += 1);

        bus.emit(Ev::A(1));
        assert_eq!(*count.borrow(), 1);
        assert!(bus.events().is_empty());
    }

    #[test]
    fn logging_can_be_toggled() {
        let mut bus = EventBus::unlogged();
        bus.emit(Ev::B);
        assert!(bus.events().is_empty());

        bus.set_logging(true);
        bus.emit(Ev::A(2));
        assert_eq!(bus.events(), &[Ev::A(2)]);

        bus.set_logging(false);
        assert!(!bus.is_logging());
        assert!(bus.events().is_empty());
    }

    #[test]
    fn drain_clears_log() {
        let mut bus = EventBus::new();
        bus.emit(Ev::A(7));
        let drained = bus.drain();
        assert_eq!(drained, vec![Ev::A(7)]);
        assert!(bus.events().is_empty());
    }
}
