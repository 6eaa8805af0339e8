//! Remote call seam. `GrpcBackend` talks to a live SNI server; tests swap in
//! an in-memory backend.

use std::time::Duration;

use sni_proto::{
    sni::{
        devices_response, BootFileRequest, DevicesRequest, DirEntry, Field, FieldsRequest,
        GetFileRequest, MakeDirectoryRequest, PutFileRequest, ReadDirectoryRequest,
        RemoveFileRequest, RenameFileRequest, ResetSystemRequest, ResetToMenuRequest,
    },
    DeviceControlClient, DeviceFilesystemClient, DeviceInfoClient, DevicesClient,
};
use tonic::{transport::Channel, Status};
use tracing::debug;

use crate::error::{Error, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

#[tonic::async_trait]
pub trait SniBackend: Send + Sync + 'static {
    async fn list_devices(
        &self,
        kinds: Vec<String>,
    ) -> std::result::Result<Vec<devices_response::Device>, Status>;

    async fn read_directory(
        &self,
        uri: &str,
        path: &str,
    ) -> std::result::Result<Vec<DirEntry>, Status>;

    async fn make_directory(&self, uri: &str, path: &str) -> std::result::Result<(), Status>;

    async fn remove_file(&self, uri: &str, path: &str) -> std::result::Result<(), Status>;

    async fn rename_file(
        &self,
        uri: &str,
        path: &str,
        new_filename: &str,
    ) -> std::result::Result<(), Status>;

    async fn put_file(&self, uri: &str, path: &str, data: Vec<u8>)
        -> std::result::Result<(), Status>;

    async fn get_file(&self, uri: &str, path: &str) -> std::result::Result<Vec<u8>, Status>;

    async fn boot_file(&self, uri: &str, path: &str) -> std::result::Result<(), Status>;

    async fn reset_system(&self, uri: &str) -> std::result::Result<(), Status>;

    async fn reset_to_menu(&self, uri: &str) -> std::result::Result<(), Status>;

    async fn fetch_fields(
        &self,
        uri: &str,
        fields: Vec<Field>,
    ) -> std::result::Result<Vec<String>, Status>;
}

/// Stubs for the four SNI services sharing one lazily connected channel.
#[derive(Clone)]
pub struct GrpcBackend {
    devices: DevicesClient<Channel>,
    control: DeviceControlClient<Channel>,
    filesystem: DeviceFilesystemClient<Channel>,
    info: DeviceInfoClient<Channel>,
}

impl GrpcBackend {
    /// Does not touch the network; the first call surfaces an unreachable server.
    pub fn connect_lazy(base_url: &str) -> Result<Self> {
        let endpoint = Channel::from_shared(base_url.to_string()).map_err(|err| {
            Error::InvalidEndpoint {
                url: base_url.to_string(),
                reason: err.to_string(),
            }
        })?;
        let channel = endpoint.connect_timeout(CONNECT_TIMEOUT).connect_lazy();
        debug!("SNI channel bound to {base_url}");
        Ok(Self::from_channel(channel))
    }

    pub fn from_channel(channel: Channel) -> Self {
        Self {
            devices: DevicesClient::new(channel.clone()),
            control: DeviceControlClient::new(channel.clone()),
            filesystem: DeviceFilesystemClient::new(channel.clone()),
            info: DeviceInfoClient::new(channel),
        }
    }
}

#[tonic::async_trait]
impl SniBackend for GrpcBackend {
    async fn list_devices(
        &self,
        kinds: Vec<String>,
    ) -> std::result::Result<Vec<devices_response::Device>, Status> {
        let mut client = self.devices.clone();
        let resp = client
            .list_devices(DevicesRequest { kinds })
            .await?
            .into_inner();
        Ok(resp.devices)
    }

    async fn read_directory(
        &self,
        uri: &str,
        path: &str,
    ) -> std::result::Result<Vec<DirEntry>, Status> {
        let mut client = self.filesystem.clone();
        let resp = client
            .read_directory(ReadDirectoryRequest {
                uri: uri.to_string(),
                path: path.to_string(),
            })
            .await?
            .into_inner();
        Ok(resp.entries)
    }

    async fn make_directory(&self, uri: &str, path: &str) -> std::result::Result<(), Status> {
        let mut client = self.filesystem.clone();
        client
            .make_directory(MakeDirectoryRequest {
                uri: uri.to_string(),
                path: path.to_string(),
            })
            .await?;
        Ok(())
    }

    async fn remove_file(&self, uri: &str, path: &str) -> std::result::Result<(), Status> {
        let mut client = self.filesystem.clone();
        client
            .remove_file(RemoveFileRequest {
                uri: uri.to_string(),
                path: path.to_string(),
            })
            .await?;
        Ok(())
    }

    async fn rename_file(
        &self,
        uri: &str,
        path: &str,
        new_filename: &str,
    ) -> std::result::Result<(), Status> {
        let mut client = self.filesystem.clone();
        client
            .rename_file(RenameFileRequest {
                uri: uri.to_string(),
                path: path.to_string(),
                new_filename: new_filename.to_string(),
            })
            .await?;
        Ok(())
    }

    async fn put_file(
        &self,
        uri: &str,
        path: &str,
        data: Vec<u8>,
    ) -> std::result::Result<(), Status> {
        let mut client = self.filesystem.clone();
        let resp = client
            .put_file(PutFileRequest {
                uri: uri.to_string(),
                path: path.to_string(),
                data,
            })
            .await?
            .into_inner();
        debug!("put {} ({} bytes)", resp.path, resp.size);
        Ok(())
    }

    async fn get_file(&self, uri: &str, path: &str) -> std::result::Result<Vec<u8>, Status> {
        let mut client = self.filesystem.clone();
        let resp = client
            .get_file(GetFileRequest {
                uri: uri.to_string(),
                path: path.to_string(),
            })
            .await?
            .into_inner();
        Ok(resp.data)
    }

    async fn boot_file(&self, uri: &str, path: &str) -> std::result::Result<(), Status> {
        let mut client = self.filesystem.clone();
        client
            .boot_file(BootFileRequest {
                uri: uri.to_string(),
                path: path.to_string(),
            })
            .await?;
        Ok(())
    }

    async fn reset_system(&self, uri: &str) -> std::result::Result<(), Status> {
        let mut client = self.control.clone();
        client
            .reset_system(ResetSystemRequest {
                uri: uri.to_string(),
            })
            .await?;
        Ok(())
    }

    async fn reset_to_menu(&self, uri: &str) -> std::result::Result<(), Status> {
        let mut client = self.control.clone();
        client
            .reset_to_menu(ResetToMenuRequest {
                uri: uri.to_string(),
            })
            .await?;
        Ok(())
    }

    async fn fetch_fields(
        &self,
        uri: &str,
        fields: Vec<Field>,
    ) -> std::result::Result<Vec<String>, Status> {
        let mut client = self.info.clone();
        let resp = client
            .fetch_fields(FieldsRequest {
                uri: uri.to_string(),
                fields: fields.into_iter().map(|field| field as i32).collect(),
            })
            .await?
            .into_inner();
        Ok(resp.values)
    }
}
