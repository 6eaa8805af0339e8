use std::time::Duration;

use sni_util::DEFAULT_SNI_ADDR;

pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Volume metadata folders hidden from listings.
pub const DEFAULT_IGNORE_FOLDERS: &[&str] = &["System Volume Information"];

/// What the health loop asks the device to prove it is still there.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HealthProbe {
    /// Read the `DeviceVersion` field.
    #[default]
    FetchVersion,
    /// Re-run discovery and look for the session URI.
    DeviceListing,
}

#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub base_url: String,
    /// Spawn `connect()` as soon as the client is built.
    pub auto_connect: bool,
    pub health_interval: Duration,
    pub health_timeout: Duration,
    pub health_probe: HealthProbe,
    pub ignore_folders: Vec<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SNI_ADDR.to_string(),
            auto_connect: false,
            health_interval: DEFAULT_HEALTH_INTERVAL,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            health_probe: HealthProbe::default(),
            ignore_folders: DEFAULT_IGNORE_FOLDERS
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}
