use std::collections::HashMap;
use std::sync::Mutex;

use crate::app::error::{AppError, CommandOutcome};
use crate::app::models::Device;
use crate::app::transport::runner::ProcessRunner;
use crate::app::transport::{adb, local, ssh};

pub const EARNAPP_CMD: &str = "earnapp";
pub const EARNAPP_PACKAGE: &str = "com.brd.earnrewards";
pub const EARNAPP_ACTIVITY: &str = "com.brd.earnrewards/.ConsentActivity";

/// Logical verbs of the managed application. These map 1:1 onto the external
/// CLI on local/ssh devices and onto intent/package primitives on adb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    Status,
    Start,
    Stop,
    ShowId,
    Register,
    Uninstall,
}

impl AppCommand {
    pub fn verb(self) -> &'static str {
        match self {
            AppCommand::Status => "status",
            AppCommand::Start => "start",
            AppCommand::Stop => "stop",
            AppCommand::ShowId => "showid",
            AppCommand::Register => "register",
            AppCommand::Uninstall => "uninstall",
        }
    }
}

/// Clone the device out of the registry so no lock is held while the
/// transport call blocks.
pub fn lookup(devices: &Mutex<HashMap<String, Device>>, name: &str) -> Option<Device> {
    devices
        .lock()
        .expect("device registry poisoned")
        .get(name)
        .cloned()
}

pub fn device_not_found(name: &str) -> String {
    format!("Device '{name}' not found")
}

/// Translate a logical verb into the transport-appropriate command string.
/// Err carries the user-facing reason when the verb has no equivalent.
pub fn managed_command(device: &Device, command: AppCommand) -> Result<String, String> {
    match device {
        Device::Adb { .. } => match command {
            AppCommand::Start => Ok(format!("am start -n {EARNAPP_ACTIVITY}")),
            AppCommand::Stop => Ok(format!("am force-stop {EARNAPP_PACKAGE}")),
            AppCommand::ShowId => Ok("settings get secure android_id".to_string()),
            AppCommand::Status => {
                Err("Status on adb devices is derived from the package state".to_string())
            }
            AppCommand::Register | AppCommand::Uninstall => Err(format!(
                "'{}' is not supported on adb devices",
                command.verb()
            )),
        },
        _ => Ok(format!("{EARNAPP_CMD} {}", command.verb())),
    }
}

/// Run an arbitrary command string on one device. Err means the transport
/// itself failed; a non-zero remote exit is an Ok outcome with success=false.
pub fn run_on_device(
    device: &Device,
    runner: &dyn ProcessRunner,
    command: &str,
    trace_id: &str,
) -> Result<CommandOutcome, AppError> {
    match device {
        Device::Local { path } => local::run_local(runner, path, command, trace_id),
        Device::Ssh {
            host,
            port,
            user,
            password,
        } => ssh::run_ssh(runner, host, *port, user, password, command, trace_id),
        Device::Adb { host, port } => adb::run_adb(runner, host, *port, command, trace_id),
    }
}

/// Raw-command entry point with the "always returns an outcome" contract:
/// unknown devices and transport failures come back as failed outcomes, never
/// as errors.
pub fn run_raw(
    devices: &Mutex<HashMap<String, Device>>,
    runner: &dyn ProcessRunner,
    name: &str,
    command: &str,
    trace_id: &str,
) -> CommandOutcome {
    let Some(device) = lookup(devices, name) else {
        return CommandOutcome::failed(device_not_found(name));
    };
    match run_on_device(&device, runner, command, trace_id) {
        Ok(outcome) => outcome,
        Err(err) => CommandOutcome::failed(err.error),
    }
}

/// Managed-verb entry point, same outcome contract as [`run_raw`].
pub fn dispatch(
    devices: &Mutex<HashMap<String, Device>>,
    runner: &dyn ProcessRunner,
    name: &str,
    command: AppCommand,
    trace_id: &str,
) -> CommandOutcome {
    let Some(device) = lookup(devices, name) else {
        return CommandOutcome::failed(device_not_found(name));
    };
    let concrete = match managed_command(&device, command) {
        Ok(concrete) => concrete,
        Err(reason) => return CommandOutcome::failed(reason),
    };
    match run_on_device(&device, runner, &concrete, trace_id) {
        Ok(outcome) => outcome,
        Err(err) => CommandOutcome::failed(err.error),
    }
}
