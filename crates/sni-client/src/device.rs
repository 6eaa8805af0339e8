use std::fmt;

use sni_proto::sni::{devices_response, AddressSpace};

use crate::capabilities::{decode_capabilities, Capability, DecodedCapability};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    FxPakPro,
    LuaBridge,
    RetroArch,
    Other(String),
}

impl DeviceKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fxpakpro" => DeviceKind::FxPakPro,
            "luabridge" => DeviceKind::LuaBridge,
            "retroarch" => DeviceKind::RetroArch,
            _ => DeviceKind::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DeviceKind::FxPakPro => "fxpakpro",
            DeviceKind::LuaBridge => "luabridge",
            DeviceKind::RetroArch => "retroarch",
            DeviceKind::Other(kind) => kind,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A device as reported by discovery, with its capability codes decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Device {
    pub uri: String,
    pub kind: DeviceKind,
    pub display_name: String,
    pub capabilities: Vec<DecodedCapability>,
    /// Codes exactly as the server sent them.
    pub raw_capabilities: Vec<i32>,
    pub system: bool,
    pub default_address_space: String,
}

impl Device {
    pub fn from_proto(device: devices_response::Device) -> Self {
        let default_address_space = AddressSpace::try_from(device.default_address_space)
            .map(|space| space.as_str_name().to_string())
            .unwrap_or_else(|_| device.default_address_space.to_string());
        Self {
            capabilities: decode_capabilities(&device.capabilities),
            kind: DeviceKind::parse(&device.kind),
            uri: device.uri,
            display_name: device.display_name,
            raw_capabilities: device.capabilities,
            system: device.system,
            default_address_space,
        }
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities
            .iter()
            .any(|cap| cap.known() == Some(capability))
    }

    pub fn known_capabilities(&self) -> impl Iterator<Item = Capability> + '_ {
        self.capabilities.iter().filter_map(|cap| cap.known())
    }
}

/// Result of a discovery call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceListing {
    pub devices: Vec<Device>,
}

impl DeviceListing {
    pub fn connected(&self) -> bool {
        !self.devices.is_empty()
    }

    /// The device `connect()` would adopt.
    pub fn current(&self) -> Option<&Device> {
        self.devices.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_device(uri: &str, kind: &str, caps: Vec<i32>) -> devices_response::Device {
        devices_response::Device {
            uri: uri.into(),
            display_name: format!("{kind} device"),
            kind: kind.into(),
            capabilities: caps,
            default_address_space: AddressSpace::FxPakPro as i32,
            system: false,
        }
    }

    #[test]
    fn from_proto_keeps_raw_codes_alongside_decoded() {
        let device = Device::from_proto(raw_device("ra://127.0.0.1:55355", "retroarch", vec![4, 42, 1]));
        assert_eq!(device.kind, DeviceKind::RetroArch);
        assert_eq!(device.raw_capabilities, vec![4, 42, 1]);
        assert_eq!(device.capabilities.len(), device.raw_capabilities.len());
        assert!(device.has_capability(Capability::ResetSystem));
        assert!(!device.has_capability(Capability::ResetToMenu));
        assert_eq!(
            device.known_capabilities().collect::<Vec<_>>(),
            vec![Capability::ResetSystem, Capability::ReadMemory]
        );
        assert_eq!(device.default_address_space, "FxPakPro");
    }

    #[test]
    fn unknown_kinds_are_kept_verbatim() {
        assert_eq!(DeviceKind::parse("FxPakPro"), DeviceKind::FxPakPro);
        assert_eq!(DeviceKind::parse("emunwa"), DeviceKind::Other("emunwa".into()));
        assert_eq!(DeviceKind::Other("emunwa".into()).to_string(), "emunwa");
    }

    #[test]
    fn listing_current_is_first_device() {
        let listing = DeviceListing {
            devices: vec![
                Device::from_proto(raw_device("a", "fxpakpro", vec![])),
                Device::from_proto(raw_device("b", "luabridge", vec![])),
            ],
        };
        assert!(listing.connected());
        assert_eq!(listing.current().map(|d| d.uri.as_str()), Some("a"));
        assert!(!DeviceListing::default().connected());
    }
}
