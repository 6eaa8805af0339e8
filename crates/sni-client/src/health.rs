//! Periodic liveness probe for the connected device.

use std::sync::{Arc, Weak};

use sni_proto::sni::Field;
use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    options::HealthProbe,
    session::{Inner, SniClient},
    transport::SniBackend,
};

/// Runs until a probe fails, the session changes, or the client is dropped.
pub(crate) async fn run(inner: Weak<Inner>, generation: u64, uri: String) {
    loop {
        let Some(interval) = inner.upgrade().map(|inner| inner.options.health_interval) else {
            return;
        };
        tokio::time::sleep(interval).await;

        let Some(strong) = inner.upgrade() else {
            return;
        };
        let timeout = strong.options.health_timeout;
        let probe = strong.options.health_probe;
        let backend = Arc::clone(&strong.backend);
        // Don't keep the client alive across the probe.
        drop(strong);

        let outcome = match tokio::time::timeout(timeout, probe_once(&*backend, probe, &uri)).await
        {
            Ok(Ok(())) => {
                debug!("health probe ok for {uri}");
                continue;
            }
            Ok(Err(err)) => err,
            Err(_) => Error::HealthCheckTimeout,
        };

        warn!("health probe failed for {uri}: {outcome}");
        if let Some(inner) = inner.upgrade() {
            SniClient { inner }.end_session(Some(generation), true);
        }
        return;
    }
}

async fn probe_once(backend: &dyn SniBackend, probe: HealthProbe, uri: &str) -> Result<()> {
    match probe {
        HealthProbe::FetchVersion => {
            backend
                .fetch_fields(uri, vec![Field::DeviceVersion])
                .await
                .map_err(Error::rpc("FetchFields"))?;
            Ok(())
        }
        HealthProbe::DeviceListing => {
            let devices = backend
                .list_devices(Vec::new())
                .await
                .map_err(Error::NoConnection)?;
            if devices.iter().any(|device| device.uri == uri) {
                Ok(())
            } else {
                Err(Error::NoConnectedDevice)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Mutex,
        time::Duration,
    };

    use tonic::Status;

    use crate::{
        events::{EventKind, SessionEvent},
        options::ClientOptions,
        session::ConnectionState,
        testing::{client_with, client_with_options, MockBackend},
    };

    use super::*;

    fn disconnect_counter(client: &SniClient) -> Arc<Mutex<usize>> {
        let count = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&count);
        client.on(EventKind::Disconnected, move |event| {
            assert_eq!(*event, SessionEvent::Disconnected);
            *sink.lock().unwrap() += 1;
        });
        count
    }

    #[tokio::test(start_paused = true)]
    async fn healthy_device_stays_connected() {
        let backend = MockBackend::with_devices(&["a"]);
        let client = client_with(&backend);
        client.connect().await.unwrap();

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(client.state(), ConnectionState::Connected("a".into()));
        assert_eq!(backend.call_count("fetch_fields a DeviceVersion"), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_timeout_disconnects_once() {
        let backend = MockBackend::with_devices(&["a"]);
        backend.set_fetch_delay(Some(Duration::from_secs(60)));
        let client = client_with(&backend);
        let disconnects = disconnect_counter(&client);
        client.connect().await.unwrap();

        // First probe at 5s, its timeout fires at 10s.
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert!(client.is_connected());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(client.state(), ConnectionState::Disconnected);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(*disconnects.lock().unwrap(), 1);
        assert_eq!(backend.call_count("fetch_fields"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_error_disconnects() {
        let backend = MockBackend::with_devices(&["a"]);
        backend.set_field_values(Err(Status::unavailable("device gone")));
        let client = client_with(&backend);
        let disconnects = disconnect_counter(&client);
        client.connect().await.unwrap();

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!client.is_connected());
        assert_eq!(*disconnects.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn listing_probe_notices_missing_device() {
        let backend = MockBackend::with_devices(&["a"]);
        let client = client_with_options(
            &backend,
            ClientOptions {
                health_probe: HealthProbe::DeviceListing,
                health_interval: Duration::from_millis(500),
                ..ClientOptions::default()
            },
        );
        client.connect().await.unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(client.is_connected());

        backend.set_devices(&["b"]);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!client.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_stops_probing() {
        let backend = MockBackend::with_devices(&["a"]);
        let client = client_with(&backend);
        client.connect().await.unwrap();
        client.disconnect();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(backend.call_count("fetch_fields"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_loop_leaves_new_session_alone() {
        let backend = MockBackend::with_devices(&["a"]);
        backend.set_fetch_delay(Some(Duration::from_secs(60)));
        let client = client_with(&backend);
        client.connect().await.unwrap();
        let old_generation = client.generation();

        client.connect().await.unwrap();
        assert!(!client.end_session(Some(old_generation), true));
        assert!(client.is_connected());
    }
}
