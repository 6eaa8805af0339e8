//! Device capability codes and their symbolic names.

use std::{fmt, str::FromStr};

use sni_proto::sni::DeviceCapability;

/// Operations a device can advertise support for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    None,
    ReadMemory,
    WriteMemory,
    ExecuteAsm,
    ResetSystem,
    PauseUnpauseEmulation,
    PauseToggleEmulation,
    ResetToMenu,
    FetchFields,
    ReadDirectory,
    MakeDirectory,
    RemoveFile,
    RenameFile,
    PutFile,
    GetFile,
    BootFile,
    NwaCommand,
}

impl Capability {
    pub const ALL: [Capability; 17] = [
        Capability::None,
        Capability::ReadMemory,
        Capability::WriteMemory,
        Capability::ExecuteAsm,
        Capability::ResetSystem,
        Capability::PauseUnpauseEmulation,
        Capability::PauseToggleEmulation,
        Capability::ResetToMenu,
        Capability::FetchFields,
        Capability::ReadDirectory,
        Capability::MakeDirectory,
        Capability::RemoveFile,
        Capability::RenameFile,
        Capability::PutFile,
        Capability::GetFile,
        Capability::BootFile,
        Capability::NwaCommand,
    ];

    /// `None` for codes the protocol leaves unassigned (9, 17-19) or never defined.
    pub fn from_code(code: i32) -> Option<Self> {
        DeviceCapability::try_from(code).ok().map(Capability::from)
    }

    pub fn code(self) -> i32 {
        DeviceCapability::from(self) as i32
    }

    /// Protocol spelling, e.g. `ExecuteASM`.
    pub fn name(self) -> &'static str {
        DeviceCapability::from(self).as_str_name()
    }
}

impl From<DeviceCapability> for Capability {
    fn from(cap: DeviceCapability) -> Self {
        match cap {
            DeviceCapability::None => Capability::None,
            DeviceCapability::ReadMemory => Capability::ReadMemory,
            DeviceCapability::WriteMemory => Capability::WriteMemory,
            DeviceCapability::ExecuteAsm => Capability::ExecuteAsm,
            DeviceCapability::ResetSystem => Capability::ResetSystem,
            DeviceCapability::PauseUnpauseEmulation => Capability::PauseUnpauseEmulation,
            DeviceCapability::PauseToggleEmulation => Capability::PauseToggleEmulation,
            DeviceCapability::ResetToMenu => Capability::ResetToMenu,
            DeviceCapability::FetchFields => Capability::FetchFields,
            DeviceCapability::ReadDirectory => Capability::ReadDirectory,
            DeviceCapability::MakeDirectory => Capability::MakeDirectory,
            DeviceCapability::RemoveFile => Capability::RemoveFile,
            DeviceCapability::RenameFile => Capability::RenameFile,
            DeviceCapability::PutFile => Capability::PutFile,
            DeviceCapability::GetFile => Capability::GetFile,
            DeviceCapability::BootFile => Capability::BootFile,
            DeviceCapability::NwaCommand => Capability::NwaCommand,
        }
    }
}

impl From<Capability> for DeviceCapability {
    fn from(cap: Capability) -> Self {
        match cap {
            Capability::None => DeviceCapability::None,
            Capability::ReadMemory => DeviceCapability::ReadMemory,
            Capability::WriteMemory => DeviceCapability::WriteMemory,
            Capability::ExecuteAsm => DeviceCapability::ExecuteAsm,
            Capability::ResetSystem => DeviceCapability::ResetSystem,
            Capability::PauseUnpauseEmulation => DeviceCapability::PauseUnpauseEmulation,
            Capability::PauseToggleEmulation => DeviceCapability::PauseToggleEmulation,
            Capability::ResetToMenu => DeviceCapability::ResetToMenu,
            Capability::FetchFields => DeviceCapability::FetchFields,
            Capability::ReadDirectory => DeviceCapability::ReadDirectory,
            Capability::MakeDirectory => DeviceCapability::MakeDirectory,
            Capability::RemoveFile => DeviceCapability::RemoveFile,
            Capability::RenameFile => DeviceCapability::RenameFile,
            Capability::PutFile => DeviceCapability::PutFile,
            Capability::GetFile => DeviceCapability::GetFile,
            Capability::BootFile => DeviceCapability::BootFile,
            Capability::NwaCommand => DeviceCapability::NwaCommand,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown capability: {0}")]
pub struct UnknownCapability(pub String);

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Capability::ALL
            .into_iter()
            .find(|cap| cap.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownCapability(trimmed.to_string()))
    }
}

/// One entry of a device's decoded capability list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DecodedCapability {
    Known(Capability),
    /// Code the client has no name for; kept so positions line up with the raw list.
    Unrecognized(i32),
}

impl DecodedCapability {
    pub fn known(self) -> Option<Capability> {
        match self {
            DecodedCapability::Known(cap) => Some(cap),
            DecodedCapability::Unrecognized(_) => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            DecodedCapability::Known(cap) => cap.code(),
            DecodedCapability::Unrecognized(code) => code,
        }
    }
}

impl fmt::Display for DecodedCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedCapability::Known(cap) => fmt::Display::fmt(cap, f),
            DecodedCapability::Unrecognized(code) => write!(f, "Unrecognized({code})"),
        }
    }
}

pub fn decode_capabilities(raw: &[i32]) -> Vec<DecodedCapability> {
    raw.iter()
        .map(|code| match Capability::from_code(*code) {
            Some(cap) => DecodedCapability::Known(cap),
            None => DecodedCapability::Unrecognized(*code),
        })
        .collect()
}

pub fn encode_capabilities(decoded: &[DecodedCapability]) -> Vec<i32> {
    decoded.iter().map(|cap| cap.code()).collect()
}
