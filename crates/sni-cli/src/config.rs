use std::{fs, io, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use sni_client::{ClientOptions, HealthProbe};
use sni_util::{normalize_base_url, state_file_path, write_json_atomic, SNI_ADDR_ENV};

const CLI_CONFIG_FILE: &str = "cli-config.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct CliConfig {
    pub(crate) addr: String,
    pub(crate) health_interval_ms: u64,
    pub(crate) health_timeout_ms: u64,
    /// `version` or `listing`
    pub(crate) health_probe: String,
    pub(crate) ignore_folders: Vec<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        let defaults = ClientOptions::default();
        Self {
            addr: sni_util::sni_addr(),
            health_interval_ms: defaults.health_interval.as_millis() as u64,
            health_timeout_ms: defaults.health_timeout.as_millis() as u64,
            health_probe: "version".into(),
            ignore_folders: defaults.ignore_folders,
        }
    }
}

impl CliConfig {
    pub(crate) fn load() -> Self {
        let path = cli_config_path();
        let env_addr = std::env::var(SNI_ADDR_ENV).ok();
        match fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str::<CliConfig>(&data) {
                Ok(file_cfg) => Self::merge(file_cfg, env_addr),
                Err(err) => {
                    eprintln!("Failed to parse {}: {err}", path.display());
                    CliConfig::default()
                }
            },
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    eprintln!("Failed to read {}: {err}", path.display());
                }
                CliConfig::default()
            }
        }
    }

    /// `SNI_ADDR` beats the file; empty file values fall back to defaults.
    pub(crate) fn merge(file_cfg: CliConfig, env_addr: Option<String>) -> Self {
        let mut cfg = CliConfig::default();
        match env_addr {
            Some(addr) if !addr.trim().is_empty() => cfg.addr = addr,
            _ => {
                if !file_cfg.addr.trim().is_empty() {
                    cfg.addr = file_cfg.addr;
                }
            }
        }
        if file_cfg.health_interval_ms > 0 {
            cfg.health_interval_ms = file_cfg.health_interval_ms;
        }
        if file_cfg.health_timeout_ms > 0 {
            cfg.health_timeout_ms = file_cfg.health_timeout_ms;
        }
        if !file_cfg.health_probe.trim().is_empty() {
            cfg.health_probe = file_cfg.health_probe;
        }
        cfg.ignore_folders = file_cfg.ignore_folders;
        cfg
    }

    pub(crate) fn save(&self) -> io::Result<()> {
        write_json_atomic(&cli_config_path(), self)
    }

    pub(crate) fn health_probe(&self) -> HealthProbe {
        match self.health_probe.trim().to_ascii_lowercase().as_str() {
            "listing" | "devices" => HealthProbe::DeviceListing,
            _ => HealthProbe::FetchVersion,
        }
    }

    pub(crate) fn to_options(&self) -> ClientOptions {
        ClientOptions {
            base_url: normalize_base_url(&self.addr),
            auto_connect: false,
            health_interval: Duration::from_millis(self.health_interval_ms),
            health_timeout: Duration::from_millis(self.health_timeout_ms),
            health_probe: self.health_probe(),
            ignore_folders: self.ignore_folders.clone(),
        }
    }
}

pub(crate) fn cli_config_path() -> PathBuf {
    state_file_path(CLI_CONFIG_FILE)
}
