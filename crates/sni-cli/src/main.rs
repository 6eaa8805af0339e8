mod config;

use std::{
    io::Write,
    path::Path,
    process::ExitCode,
    time::Duration,
};

use clap::{Parser, Subcommand};
use sni_client::{
    Capability, Device, DeviceKind, EntryKind, Error as SniError, Screen,
    SessionEvent, SniClient,
};
use sni_util::{expand_user, init_tracing};
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::config::{cli_config_path, CliConfig};

#[derive(Parser)]
#[command(name = "sni", version, about = "Control panel for SNI-connected consoles")]
struct Cli {
    /// SNI server address (host:port or URL); overrides SNI_ADDR and the config file
    #[arg(long, global = true)]
    addr: Option<String>,
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    health_interval_ms: Option<u64>,
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    health_timeout_ms: Option<u64>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List devices known to SNI
    Devices {
        /// Only list these kinds (fxpakpro, luabridge, retroarch, ...)
        #[arg(long = "kind")]
        kinds: Vec<String>,
    },
    /// Connect and describe the connected device
    Info,
    /// List a directory on the device
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Upload a local file; a remote path ending in '/' keeps the local name
    Put { local: String, remote: String },
    /// Download a file from the device
    Get { remote: String, local: String },
    /// Create a directory on the device
    Mkdir { path: String },
    /// Rename a file within its folder
    Mv { path: String, new_name: String },
    /// Boot a ROM
    Boot { path: String },
    /// Delete a file
    Rm { path: String },
    /// Reset the console
    Reset,
    /// Return to the cart menu
    Menu {
        /// Reset even if the menu is already showing
        #[arg(long)]
        force: bool,
    },
    /// Read device info fields (DeviceName, RomFileName, ...)
    Fields {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Report whether the device shows its menu or a game
    Screen,
    /// Stay connected and print session events
    Watch {
        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// Show or update the saved configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },
}

#[derive(Subcommand)]
enum ConfigCmd {
    /// Print the effective configuration
    Show,
    /// Save the SNI address for later runs
    SetAddr { addr: String },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("no devices connected to SNI")]
    NoDevices,
    #[error("device does not support {0}")]
    MissingCapability(Capability),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_tracing(cli.verbose) {
        eprintln!("failed to set up logging: {err}");
    }
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", describe_error(err.as_ref()));
            ExitCode::FAILURE
        }
    }
}

/// Separates an unreachable server from a device that said no.
fn describe_error(err: &(dyn std::error::Error + 'static)) -> String {
    if let Some(sni) = err.downcast_ref::<SniError>() {
        if sni.is_unreachable() {
            return format!("cannot reach SNI server: {sni}");
        }
        if let SniError::Rpc { .. } = sni {
            return format!("rejected by device: {sni}");
        }
        return sni.to_string();
    }
    if let Some(CliError::MissingCapability(cap)) = err.downcast_ref::<CliError>() {
        return format!("missing required capability: {cap}");
    }
    err.to_string()
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut cfg = CliConfig::load();
    if let Some(addr) = cli.addr {
        cfg.addr = addr;
    }
    if let Some(ms) = cli.health_interval_ms {
        cfg.health_interval_ms = ms;
    }
    if let Some(ms) = cli.health_timeout_ms {
        cfg.health_timeout_ms = ms;
    }

    if let Cmd::Config { cmd } = &cli.cmd {
        match cmd {
            ConfigCmd::Show => {
                println!("{}", serde_json::to_string_pretty(&cfg)?);
                println!("# {}", cli_config_path().display());
            }
            ConfigCmd::SetAddr { addr } => {
                cfg.addr = addr.clone();
                cfg.save()?;
                println!("saved addr={addr}");
            }
        }
        return Ok(());
    }

    debug!("using SNI at {}", cfg.addr);
    let client = SniClient::new(cfg.to_options())?;

    match cli.cmd {
        Cmd::Config { .. } => {}
        Cmd::Devices { kinds } => {
            let kinds: Vec<DeviceKind> = kinds.iter().map(|k| DeviceKind::parse(k)).collect();
            let listing = client.list_devices(&kinds).await?;
            if !listing.connected() {
                println!("no devices");
            }
            for device in &listing.devices {
                print_device(device);
            }
        }
        Cmd::Info => {
            open_session(&client).await?;
            let device = client.connected_device().await?;
            print_device(&device);
            if device.has_capability(Capability::FetchFields) {
                println!("screen\t{}", client.current_screen().await);
            }
        }
        Cmd::Ls { path } => {
            open_session(&client).await?;
            require_capability(&client, Capability::ReadDirectory).await?;
            for entry in client.read_directory(&path).await? {
                let marker = match entry.kind {
                    EntryKind::Folder => "d",
                    EntryKind::File => "-",
                };
                println!("{marker}\t{}", entry.path);
            }
        }
        Cmd::Put { local, remote } => {
            let local_path = expand_user(&local);
            let remote = remote_target(&local_path, &remote);
            let data = tokio::fs::read(&local_path).await?;
            open_session(&client).await?;
            require_capability(&client, Capability::PutFile).await?;
            let size = data.len();
            let path = client.put_file(&remote, data).await?;
            println!("put {path} ({size} bytes)");
        }
        Cmd::Get { remote, local } => {
            open_session(&client).await?;
            require_capability(&client, Capability::GetFile).await?;
            let data = client.get_file(&remote).await?;
            let local_path = expand_user(&local);
            tokio::fs::write(&local_path, &data).await?;
            println!("got {remote} -> {} ({} bytes)", local_path.display(), data.len());
        }
        Cmd::Mkdir { path } => {
            open_session(&client).await?;
            require_capability(&client, Capability::MakeDirectory).await?;
            println!("created {}", client.make_directory(&path).await?);
        }
        Cmd::Mv { path, new_name } => {
            open_session(&client).await?;
            require_capability(&client, Capability::RenameFile).await?;
            println!("renamed to {}", client.rename_file(&path, &new_name).await?);
        }
        Cmd::Boot { path } => {
            open_session(&client).await?;
            require_capability(&client, Capability::BootFile).await?;
            println!("booted {}", client.boot_file(&path).await?);
        }
        Cmd::Rm { path } => {
            open_session(&client).await?;
            require_capability(&client, Capability::RemoveFile).await?;
            println!("deleted {}", client.delete_file(&path).await?);
        }
        Cmd::Reset => {
            open_session(&client).await?;
            require_capability(&client, Capability::ResetSystem).await?;
            client.reset_system().await?;
            println!("reset");
        }
        Cmd::Menu { force } => {
            open_session(&client).await?;
            let device = require_capability(&client, Capability::ResetToMenu).await?;
            if !force
                && device.has_capability(Capability::FetchFields)
                && client.current_screen().await == Screen::Menu
            {
                println!("already in menu");
                return Ok(());
            }
            client.reset_to_menu().await?;
            println!("returned to menu");
        }
        Cmd::Fields { names } => {
            open_session(&client).await?;
            require_capability(&client, Capability::FetchFields).await?;
            let known: Vec<&String> = names
                .iter()
                .filter(|name| !sni_client::encode_field_names(&[name.as_str()]).is_empty())
                .collect();
            let values = client.get_fields(names.as_slice()).await?;
            for (name, value) in known.iter().zip(values.iter()) {
                println!("{name}\t{value}");
            }
        }
        Cmd::Screen => {
            open_session(&client).await?;
            println!("{}", client.current_screen().await);
        }
        Cmd::Watch { seconds } => {
            watch(&client, seconds.map(Duration::from_secs), &mut std::io::stdout()).await?
        }
    }

    Ok(())
}

async fn open_session(client: &SniClient) -> Result<String, Box<dyn std::error::Error>> {
    match client.connect().await? {
        Some(uri) => Ok(uri),
        None => Err(CliError::NoDevices.into()),
    }
}

/// Capability checks happen here; the client calls themselves don't re-check.
async fn require_capability(
    client: &SniClient,
    capability: Capability,
) -> Result<Device, Box<dyn std::error::Error>> {
    let device = client.connected_device().await?;
    if device.has_capability(capability) {
        Ok(device)
    } else {
        Err(CliError::MissingCapability(capability).into())
    }
}

fn remote_target(local: &Path, remote: &str) -> String {
    if !remote.ends_with('/') {
        return remote.to_string();
    }
    match local.file_name().and_then(|name| name.to_str()) {
        Some(name) => sni_client::fs::join_path(remote, name),
        None => remote.to_string(),
    }
}

fn print_device(device: &Device) {
    let caps: Vec<String> = device.capabilities.iter().map(|cap| cap.to_string()).collect();
    println!(
        "{}\t{}\t{}\t{}",
        device.uri,
        device.kind,
        device.display_name,
        caps.join(",")
    );
}

enum WatchStep {
    Event(Result<SessionEvent, RecvError>),
    Retry,
}

/// Prints session events until `limit` passes. While no device is held it
/// retries `connect()` every health interval.
async fn watch<W: Write>(
    client: &SniClient,
    limit: Option<Duration>,
    out: &mut W,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut events = client.subscribe();
    let retry = client.options().health_interval;
    let deadline = limit.map(|limit| tokio::time::Instant::now() + limit);
    let mut notice: Option<String> = None;
    try_connect(client, &mut notice, out).await?;

    loop {
        let step = async {
            if client.is_connected() {
                WatchStep::Event(events.recv().await)
            } else {
                tokio::select! {
                    event = events.recv() => WatchStep::Event(event),
                    _ = tokio::time::sleep(retry) => WatchStep::Retry,
                }
            }
        };
        let step = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, step).await {
                Ok(step) => step,
                Err(_) => return Ok(()),
            },
            None => step.await,
        };
        match step {
            WatchStep::Retry => try_connect(client, &mut notice, out).await?,
            WatchStep::Event(Ok(SessionEvent::Connected(uri))) => {
                notice = None;
                writeln!(out, "connected\t{uri}")?;
            }
            WatchStep::Event(Ok(SessionEvent::Disconnected)) => writeln!(out, "disconnected")?,
            WatchStep::Event(Err(RecvError::Lagged(skipped))) => {
                debug!("skipped {skipped} session events")
            }
            WatchStep::Event(Err(RecvError::Closed)) => return Ok(()),
        }
    }
}

/// One connect attempt. Repeated identical notices are printed once.
async fn try_connect<W: Write>(
    client: &SniClient,
    notice: &mut Option<String>,
    out: &mut W,
) -> std::io::Result<()> {
    let message = match client.connect().await {
        Ok(Some(_)) => return Ok(()),
        Ok(None) => "waiting for a device...".to_string(),
        Err(err) => describe_error(&err),
    };
    if notice.as_deref() != Some(message.as_str()) {
        writeln!(out, "{message}")?;
        *notice = Some(message);
    }
    Ok(())
}
