//! Generated SNI protocol types and service clients.
//!
//! `sni.proto` declares no package, so prost emits everything into `_.rs`
//! and the services keep their bare names on the wire (`/Devices/ListDevices`).

pub mod sni {
    #![allow(clippy::all)]
    include!(concat!(env!("OUT_DIR"), "/_.rs"));
}

pub use sni::{
    device_control_client::DeviceControlClient, device_filesystem_client::DeviceFilesystemClient,
    device_info_client::DeviceInfoClient, devices_client::DevicesClient,
};
