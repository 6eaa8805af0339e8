//! Single active device session: discovery, connect/disconnect, events.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    device::{Device, DeviceKind, DeviceListing},
    error::{Error, Result},
    events::{EventBus, EventKind, ListenerId, SessionEvent},
    health,
    options::ClientOptions,
    transport::{GrpcBackend, SniBackend},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected(String),
}

impl ConnectionState {
    pub fn uri(&self) -> Option<&str> {
        match self {
            ConnectionState::Connected(uri) => Some(uri),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Connected(uri) => write!(f, "connected to {uri}"),
        }
    }
}

#[derive(Default)]
struct SessionSlot {
    uri: Option<String>,
    /// Bumped on every adopt/teardown so a stale health loop cannot end a newer session.
    generation: u64,
    health: Option<JoinHandle<()>>,
}

pub(crate) struct Inner {
    pub(crate) backend: Arc<dyn SniBackend>,
    pub(crate) options: ClientOptions,
    session: Mutex<SessionSlot>,
    state_tx: watch::Sender<ConnectionState>,
    connect_lock: tokio::sync::Mutex<()>,
    connect_epoch: AtomicU64,
    events: EventBus,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let slot = self.session.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = slot.health.take() {
            handle.abort();
        }
    }
}

/// Client for one SNI server holding at most one connected device.
///
/// Cloning is cheap and every clone shares the same session. `state()` and
/// `connected_uri()` agree outside of a first connect, where the state is
/// `Connecting` and there is no URI yet.
#[derive(Clone)]
pub struct SniClient {
    pub(crate) inner: Arc<Inner>,
}

impl SniClient {
    /// Binds a lazily connected gRPC channel to `options.base_url`. Must run
    /// inside a tokio runtime.
    pub fn new(options: ClientOptions) -> Result<Self> {
        let backend = GrpcBackend::connect_lazy(&options.base_url)?;
        Ok(Self::with_backend(Arc::new(backend), options))
    }

    pub fn with_backend(backend: Arc<dyn SniBackend>, options: ClientOptions) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let auto_connect = options.auto_connect;
        let client = Self {
            inner: Arc::new(Inner {
                backend,
                options,
                session: Mutex::new(SessionSlot::default()),
                state_tx,
                connect_lock: tokio::sync::Mutex::new(()),
                connect_epoch: AtomicU64::new(0),
                events: EventBus::default(),
            }),
        };
        client.on(EventKind::Connected, |event| {
            if let SessionEvent::Connected(uri) = event {
                debug!("SNI client connected to: {uri}");
            }
        });
        if auto_connect {
            client.spawn_auto_connect();
        }
        client
    }

    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    fn spawn_auto_connect(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("auto_connect requested outside a tokio runtime; call connect() manually");
            return;
        };
        let client = self.clone();
        handle.spawn(async move {
            if let Err(err) = client.connect().await {
                warn!("auto connect failed: {err}");
            }
        });
    }

    fn slot(&self) -> MutexGuard<'_, SessionSlot> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    pub(crate) fn generation(&self) -> u64 {
        self.slot().generation
    }

    pub fn connected_uri(&self) -> Option<String> {
        self.slot().uri.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.slot().uri.is_some()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state_tx.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, Arc::new(listener), false)
    }

    pub fn once<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, Arc::new(listener), true)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.events.off(id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// URI of the active session, or `NoConnectedDevice`.
    pub(crate) fn require_session(&self) -> Result<String> {
        self.slot().uri.clone().ok_or(Error::NoConnectedDevice)
    }

    async fn discover(&self, kinds: Vec<String>) -> Result<Vec<Device>> {
        match self.inner.backend.list_devices(kinds).await {
            Ok(devices) => Ok(devices.into_iter().map(Device::from_proto).collect()),
            Err(status) => {
                debug!("SNI list devices error: {status}");
                Err(Error::NoConnection(status))
            }
        }
    }

    pub async fn list_devices(&self, kinds: &[DeviceKind]) -> Result<DeviceListing> {
        let kinds = kinds.iter().map(|kind| kind.as_str().to_string()).collect();
        let devices = self.discover(kinds).await?;
        Ok(DeviceListing { devices })
    }

    /// Adopts the first discovered device. `Ok(None)` when the server reports
    /// no devices.
    pub async fn connect(&self) -> Result<Option<String>> {
        let epoch = self.inner.connect_epoch.load(Ordering::Acquire);
        let _guard = self.inner.connect_lock.lock().await;

        // Someone else finished a connect while we waited; share its outcome.
        if self.inner.connect_epoch.load(Ordering::Acquire) != epoch {
            if let Some(uri) = self.connected_uri() {
                return Ok(Some(uri));
            }
        }

        // A live session stays `Connected` while it is re-checked.
        {
            let slot = self.slot();
            if slot.uri.is_none() {
                self.inner.state_tx.send_replace(ConnectionState::Connecting);
            }
        }
        let devices = match self.discover(Vec::new()).await {
            Ok(devices) => devices,
            Err(err) => {
                self.publish_slot_state();
                return Err(err);
            }
        };

        let Some(first) = devices.into_iter().next() else {
            debug!("no SNI devices available");
            self.inner.connect_epoch.fetch_add(1, Ordering::Release);
            if self.end_session(None, false) {
                info!("previously connected device is gone");
            } else {
                self.inner
                    .state_tx
                    .send_replace(ConnectionState::Disconnected);
            }
            return Ok(None);
        };

        let uri = first.uri;
        let generation = {
            let mut slot = self.slot();
            if let Some(handle) = slot.health.take() {
                handle.abort();
            }
            slot.generation += 1;
            slot.uri = Some(uri.clone());
            slot.generation
        };
        self.inner.connect_epoch.fetch_add(1, Ordering::Release);
        self.inner
            .state_tx
            .send_replace(ConnectionState::Connected(uri.clone()));
        info!("connected to {uri} ({})", first.display_name);
        self.inner.events.emit(SessionEvent::Connected(uri.clone()));
        self.start_health_loop(generation, uri.clone());
        Ok(Some(uri))
    }

    /// Publishes whatever the slot holds now; a disconnect may have landed
    /// while discovery was in flight.
    fn publish_slot_state(&self) {
        let slot = self.slot();
        let state = match &slot.uri {
            Some(uri) => ConnectionState::Connected(uri.clone()),
            None => ConnectionState::Disconnected,
        };
        self.inner.state_tx.send_replace(state);
    }

    fn start_health_loop(&self, generation: u64, uri: String) {
        let task = tokio::spawn(health::run(Arc::downgrade(&self.inner), generation, uri));
        let mut slot = self.slot();
        if slot.generation == generation {
            slot.health = Some(task);
        } else {
            task.abort();
        }
    }

    /// Clears the session and emits `Disconnected`. No-op when already disconnected.
    pub fn disconnect(&self) {
        self.end_session(None, false);
    }

    /// Ends the session if it is still `generation` (any session when `None`).
    /// Returns whether a connected session was actually torn down.
    pub(crate) fn end_session(&self, generation: Option<u64>, from_health_loop: bool) -> bool {
        let uri = {
            let mut slot = self.slot();
            if generation.is_some_and(|generation| generation != slot.generation) {
                return false;
            }
            if let Some(handle) = slot.health.take() {
                // The loop returns on its own after calling us.
                if !from_health_loop {
                    handle.abort();
                }
            }
            let Some(uri) = slot.uri.take() else {
                return false;
            };
            slot.generation += 1;
            uri
        };
        self.inner
            .state_tx
            .send_replace(ConnectionState::Disconnected);
        info!("disconnected from {uri}");
        self.inner.events.emit(SessionEvent::Disconnected);
        true
    }

    /// Re-reads the active device from discovery. A device that vanished ends
    /// the session.
    pub async fn connected_device(&self) -> Result<Device> {
        let (uri, generation) = {
            let slot = self.slot();
            let uri = slot.uri.clone().ok_or(Error::NoConnectedDevice)?;
            (uri, slot.generation)
        };
        let devices = self.discover(Vec::new()).await?;
        match devices.into_iter().find(|device| device.uri == uri) {
            Some(device) => Ok(device),
            None => {
                warn!("connected device {uri} is no longer listed");
                self.end_session(Some(generation), false);
                Err(Error::NoConnectedDevice)
            }
        }
    }
}
