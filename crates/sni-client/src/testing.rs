//! In-memory SNI server for unit tests.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use sni_proto::sni::{devices_response, AddressSpace, DirEntry, DirEntryType, Field};
use tonic::{Code, Status};

use crate::{
    options::ClientOptions,
    session::SniClient,
    transport::SniBackend,
};

#[derive(Default)]
struct MockState {
    devices: Vec<devices_response::Device>,
    listing_error: Option<(Code, String)>,
    entries: Vec<DirEntry>,
    field_values: Option<Result<Vec<String>, (Code, String)>>,
    fetch_delay: Option<Duration>,
    files: BTreeMap<String, Vec<u8>>,
    calls: Vec<String>,
}

#[derive(Default)]
pub(crate) struct MockBackend {
    state: Mutex<MockState>,
}

pub(crate) fn mock_device(uri: &str) -> devices_response::Device {
    devices_response::Device {
        uri: uri.to_string(),
        display_name: format!("Device {uri}"),
        kind: "fxpakpro".into(),
        capabilities: vec![4, 7, 8, 10, 11, 12, 13, 14, 15, 16],
        default_address_space: AddressSpace::FxPakPro as i32,
        system: true,
    }
}

pub(crate) fn client_with(backend: &Arc<MockBackend>) -> SniClient {
    client_with_options(backend, ClientOptions::default())
}

pub(crate) fn client_with_options(backend: &Arc<MockBackend>, options: ClientOptions) -> SniClient {
    SniClient::with_backend(Arc::clone(backend) as Arc<dyn SniBackend>, options)
}

pub(crate) async fn connected_client(backend: &Arc<MockBackend>) -> SniClient {
    let client = client_with(backend);
    client.connect().await.unwrap();
    backend.clear_calls();
    client
}

fn status((code, message): &(Code, String)) -> Status {
    Status::new(*code, message.clone())
}

impl MockBackend {
    pub(crate) fn with_devices(uris: &[&str]) -> Arc<Self> {
        let backend = Arc::new(Self::default());
        backend.set_devices(uris);
        backend
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn set_devices(&self, uris: &[&str]) {
        self.state().devices = uris.iter().map(|uri| mock_device(uri)).collect();
    }

    pub(crate) fn fail_listing(&self, status: Option<Status>) {
        self.state().listing_error = status.map(|s| (s.code(), s.message().to_string()));
    }

    pub(crate) fn set_entries(&self, entries: &[(&str, DirEntryType)]) {
        self.state().entries = entries
            .iter()
            .map(|(name, kind)| DirEntry {
                name: name.to_string(),
                r#type: *kind as i32,
            })
            .collect();
    }

    pub(crate) fn set_field_values(&self, values: Result<Vec<String>, Status>) {
        self.state().field_values =
            Some(values.map_err(|s| (s.code(), s.message().to_string())));
    }

    pub(crate) fn set_fetch_delay(&self, delay: Option<Duration>) {
        self.state().fetch_delay = delay;
    }

    pub(crate) fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state().files.get(path).cloned()
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub(crate) fn call_count(&self, prefix: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    pub(crate) fn clear_calls(&self) {
        self.state().calls.clear();
    }

    fn record(&self, call: String) {
        self.state().calls.push(call);
    }
}

#[tonic::async_trait]
impl SniBackend for MockBackend {
    async fn list_devices(
        &self,
        kinds: Vec<String>,
    ) -> Result<Vec<devices_response::Device>, Status> {
        self.record(format!("list_devices {}", kinds.join(",")));
        tokio::task::yield_now().await;
        let state = self.state();
        if let Some(err) = &state.listing_error {
            return Err(status(err));
        }
        Ok(state.devices.clone())
    }

    async fn read_directory(&self, uri: &str, path: &str) -> Result<Vec<DirEntry>, Status> {
        self.record(format!("read_directory {uri} {path}"));
        Ok(self.state().entries.clone())
    }

    async fn make_directory(&self, uri: &str, path: &str) -> Result<(), Status> {
        self.record(format!("make_directory {uri} {path}"));
        Ok(())
    }

    async fn remove_file(&self, uri: &str, path: &str) -> Result<(), Status> {
        self.record(format!("remove_file {uri} {path}"));
        match self.state().files.remove(path) {
            Some(_) => Ok(()),
            None => Err(Status::not_found(format!("{path} not found"))),
        }
    }

    async fn rename_file(&self, uri: &str, path: &str, new_filename: &str) -> Result<(), Status> {
        self.record(format!("rename_file {uri} {path} {new_filename}"));
        Ok(())
    }

    async fn put_file(&self, uri: &str, path: &str, data: Vec<u8>) -> Result<(), Status> {
        self.record(format!("put_file {uri} {path} {}", data.len()));
        self.state().files.insert(path.to_string(), data);
        Ok(())
    }

    async fn get_file(&self, uri: &str, path: &str) -> Result<Vec<u8>, Status> {
        self.record(format!("get_file {uri} {path}"));
        self.file(path)
            .ok_or_else(|| Status::not_found(format!("{path} not found")))
    }

    async fn boot_file(&self, uri: &str, path: &str) -> Result<(), Status> {
        self.record(format!("boot_file {uri} {path}"));
        Ok(())
    }

    async fn reset_system(&self, uri: &str) -> Result<(), Status> {
        self.record(format!("reset_system {uri}"));
        Ok(())
    }

    async fn reset_to_menu(&self, uri: &str) -> Result<(), Status> {
        self.record(format!("reset_to_menu {uri}"));
        Ok(())
    }

    async fn fetch_fields(&self, uri: &str, fields: Vec<Field>) -> Result<Vec<String>, Status> {
        let names: Vec<&str> = fields.iter().map(|field| field.as_str_name()).collect();
        self.record(format!("fetch_fields {uri} {}", names.join(",")));
        let delay = self.state().fetch_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let configured = self.state().field_values.clone();
        match configured {
            Some(Ok(values)) => Ok(values),
            Some(Err(err)) => Err(status(&err)),
            None => Ok(names.iter().map(|name| format!("{name}-value")).collect()),
        }
    }
}
