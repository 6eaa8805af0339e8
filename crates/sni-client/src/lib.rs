//! Client for the SNI device server: one connected device at a time,
//! capability decoding, filesystem and reset operations.

pub mod capabilities;
mod control;
pub mod device;
pub mod error;
pub mod events;
pub mod fields;
pub mod fs;
mod health;
mod info;
pub mod options;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use capabilities::{decode_capabilities, encode_capabilities, Capability, DecodedCapability};
pub use device::{Device, DeviceKind, DeviceListing};
pub use error::{Error, Result};
pub use events::{EventKind, ListenerId, SessionEvent};
pub use fields::{encode_field_names, Screen};
pub use fs::{DirEntry, EntryKind};
pub use options::{ClientOptions, HealthProbe};
pub use session::{ConnectionState, SniClient};
pub use transport::{GrpcBackend, SniBackend};
