//! Session connect/disconnect notifications.
//!
//! Two ways to listen: callbacks registered with `on`/`once` (run inline at
//! emission, so they must return quickly) and a broadcast stream from
//! `subscribe`.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};

use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Connected(String),
    Disconnected,
}

impl SessionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SessionEvent::Connected(_) => EventKind::Connected,
            SessionEvent::Disconnected => EventKind::Disconnected,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Disconnected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

struct Registration {
    id: ListenerId,
    kind: EventKind,
    once: bool,
    listener: Listener,
}

pub(crate) struct EventBus {
    next_id: AtomicU64,
    listeners: Mutex<Vec<Registration>>,
    tx: broadcast::Sender<SessionEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
            tx,
        }
    }
}

impl EventBus {
    pub(crate) fn on(&self, kind: EventKind, listener: Listener, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut guard = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        guard.push(Registration {
            id,
            kind,
            once,
            listener,
        });
        id
    }

    /// Returns false if the listener was already gone.
    pub(crate) fn off(&self, id: ListenerId) -> bool {
        let mut guard = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        let before = guard.len();
        guard.retain(|reg| reg.id != id);
        guard.len() != before
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        let kind = event.kind();
        // Snapshot first: listeners may call on/off themselves.
        let matched: Vec<Listener> = {
            let mut guard = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
            let matched = guard
                .iter()
                .filter(|reg| reg.kind == kind)
                .map(|reg| Arc::clone(&reg.listener))
                .collect();
            guard.retain(|reg| !(reg.once && reg.kind == kind));
            matched
        };
        for listener in matched {
            listener(&event);
        }
        // No receivers is fine.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<SessionEvent>>>, Listener) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener: Listener = Arc::new(move |event: &SessionEvent| {
            sink.lock().unwrap().push(event.clone());
        });
        (seen, listener)
    }

    #[test]
    fn listeners_only_see_their_kind() {
        let bus = EventBus::default();
        let (connected, on_connected) = recorder();
        let (disconnected, on_disconnected) = recorder();
        bus.on(EventKind::Connected, on_connected, false);
        bus.on(EventKind::Disconnected, on_disconnected, false);

        bus.emit(SessionEvent::Connected("a".into()));
        bus.emit(SessionEvent::Disconnected);
        bus.emit(SessionEvent::Connected("b".into()));

        assert_eq!(
            *connected.lock().unwrap(),
            vec![
                SessionEvent::Connected("a".into()),
                SessionEvent::Connected("b".into())
            ]
        );
        assert_eq!(*disconnected.lock().unwrap(), vec![SessionEvent::Disconnected]);
    }

    #[test]
    fn once_fires_a_single_time() {
        let bus = EventBus::default();
        let (seen, listener) = recorder();
        bus.on(EventKind::Connected, listener, true);
        bus.emit(SessionEvent::Disconnected);
        assert_eq!(bus.listener_count(), 1);

        bus.emit(SessionEvent::Connected("a".into()));
        bus.emit(SessionEvent::Connected("b".into()));
        assert_eq!(*seen.lock().unwrap(), vec![SessionEvent::Connected("a".into())]);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn off_removes_listener() {
        let bus = EventBus::default();
        let (seen, listener) = recorder();
        let id = bus.on(EventKind::Disconnected, listener, false);
        assert!(bus.off(id));
        assert!(!bus.off(id));
        bus.emit(SessionEvent::Disconnected);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn listener_may_unregister_itself() {
        let bus = Arc::new(EventBus::default());
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicU64::new(0));

        let bus_ref = Arc::clone(&bus);
        let slot_ref = Arc::clone(&slot);
        let calls_ref = Arc::clone(&calls);
        let id = bus.on(
            EventKind::Disconnected,
            Arc::new(move |_: &SessionEvent| {
                calls_ref.fetch_add(1, Ordering::Relaxed);
                if let Some(id) = *slot_ref.lock().unwrap() {
                    bus_ref.off(id);
                }
            }),
            false,
        );
        *slot.lock().unwrap() = Some(id);

        bus.emit(SessionEvent::Disconnected);
        bus.emit(SessionEvent::Disconnected);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn subscribers_receive_in_emission_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.emit(SessionEvent::Connected("a".into()));
        bus.emit(SessionEvent::Disconnected);
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::Connected("a".into()));
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::Disconnected);
    }
}
