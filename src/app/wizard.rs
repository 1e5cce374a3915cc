use crate::app::models::{Device, ScheduledTask, TaskAction};
use crate::app::schedule::parse_time_of_day;

/// Conversational add-device / add-schedule flows as explicit state machines,
/// one per session. Input that does not fit the awaited field is rejected
/// with a retry prompt and the state does not move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardFlow {
    AddDevice(AddDeviceState),
    AddSchedule(AddScheduleState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteKind {
    Ssh,
    Adb,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddDeviceState {
    AwaitName,
    AwaitKind {
        name: String,
    },
    AwaitPath {
        name: String,
    },
    AwaitHost {
        name: String,
        kind: RemoteKind,
    },
    AwaitPort {
        name: String,
        kind: RemoteKind,
        host: String,
    },
    AwaitUser {
        name: String,
        host: String,
        port: u16,
    },
    AwaitPassword {
        name: String,
        host: String,
        port: u16,
        user: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddScheduleState {
    AwaitDevice,
    AwaitAction {
        device: String,
    },
    AwaitTime {
        device: String,
        action: TaskAction,
    },
    AwaitDays {
        device: String,
        action: TaskAction,
        time: String,
    },
}

/// What one input did to the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardStep {
    /// Advanced; show this prompt for the next field.
    Prompt(String),
    /// Rejected; same field, try again.
    Retry(String),
    DeviceReady {
        name: String,
        device: Device,
    },
    ScheduleReady(ScheduledTask),
}

impl WizardFlow {
    pub fn add_device() -> (Self, String) {
        (
            WizardFlow::AddDevice(AddDeviceState::AwaitName),
            "Name for the new device?".to_string(),
        )
    }

    pub fn add_schedule() -> (Self, String) {
        (
            WizardFlow::AddSchedule(AddScheduleState::AwaitDevice),
            "Which device is the task for?".to_string(),
        )
    }

    /// Consume one line of input. Returns the surviving flow (None once a
    /// value is ready) and what to tell the user.
    pub fn advance(self, input: &str) -> (Option<WizardFlow>, WizardStep) {
        match self {
            WizardFlow::AddDevice(state) => advance_device(state, input),
            WizardFlow::AddSchedule(state) => advance_schedule(state, input),
        }
    }
}

fn advance_device(state: AddDeviceState, input: &str) -> (Option<WizardFlow>, WizardStep) {
    let input = input.trim();
    match state {
        AddDeviceState::AwaitName => {
            if input.is_empty() {
                return retry_device(AddDeviceState::AwaitName, "A device name is required. Name?");
            }
            (
                Some(WizardFlow::AddDevice(AddDeviceState::AwaitKind {
                    name: input.to_string(),
                })),
                WizardStep::Prompt("Device type? (local, ssh, adb)".to_string()),
            )
        }
        AddDeviceState::AwaitKind { name } => match input.to_lowercase().as_str() {
            "local" => (
                Some(WizardFlow::AddDevice(AddDeviceState::AwaitPath { name })),
                WizardStep::Prompt("Working directory? (blank for /usr/bin)".to_string()),
            ),
            "ssh" => (
                Some(WizardFlow::AddDevice(AddDeviceState::AwaitHost {
                    name,
                    kind: RemoteKind::Ssh,
                })),
                WizardStep::Prompt("Host address?".to_string()),
            ),
            "adb" => (
                Some(WizardFlow::AddDevice(AddDeviceState::AwaitHost {
                    name,
                    kind: RemoteKind::Adb,
                })),
                WizardStep::Prompt("Host address?".to_string()),
            ),
            _ => retry_device(
                AddDeviceState::AwaitKind { name },
                "Unknown type. Device type? (local, ssh, adb)",
            ),
        },
        AddDeviceState::AwaitPath { name } => {
            let path = if input.is_empty() {
                "/usr/bin".to_string()
            } else {
                input.to_string()
            };
            (
                None,
                WizardStep::DeviceReady {
                    name,
                    device: Device::Local { path },
                },
            )
        }
        AddDeviceState::AwaitHost { name, kind } => {
            if input.is_empty() {
                return retry_device(
                    AddDeviceState::AwaitHost { name, kind },
                    "A host address is required. Host?",
                );
            }
            (
                Some(WizardFlow::AddDevice(AddDeviceState::AwaitPort {
                    name,
                    kind,
                    host: input.to_string(),
                })),
                WizardStep::Prompt(match kind {
                    RemoteKind::Ssh => "Port? (blank for 22)".to_string(),
                    RemoteKind::Adb => "Port? (blank for 5555)".to_string(),
                }),
            )
        }
        AddDeviceState::AwaitPort { name, kind, host } => {
            let default_port = match kind {
                RemoteKind::Ssh => 22,
                RemoteKind::Adb => 5555,
            };
            let port = if input.is_empty() {
                default_port
            } else {
                match input.parse::<u16>() {
                    Ok(port) => port,
                    Err(_) => {
                        return retry_device(
                            AddDeviceState::AwaitPort { name, kind, host },
                            "Ports are numbers between 1 and 65535. Port?",
                        )
                    }
                }
            };
            match kind {
                RemoteKind::Adb => (
                    None,
                    WizardStep::DeviceReady {
                        name,
                        device: Device::Adb { host, port },
                    },
                ),
                RemoteKind::Ssh => (
                    Some(WizardFlow::AddDevice(AddDeviceState::AwaitUser {
                        name,
                        host,
                        port,
                    })),
                    WizardStep::Prompt("Username?".to_string()),
                ),
            }
        }
        AddDeviceState::AwaitUser { name, host, port } => {
            if input.is_empty() {
                return retry_device(
                    AddDeviceState::AwaitUser { name, host, port },
                    "A username is required. Username?",
                );
            }
            (
                Some(WizardFlow::AddDevice(AddDeviceState::AwaitPassword {
                    name,
                    host,
                    port,
                    user: input.to_string(),
                })),
                WizardStep::Prompt("Password?".to_string()),
            )
        }
        AddDeviceState::AwaitPassword {
            name,
            host,
            port,
            user,
        } => (
            None,
            WizardStep::DeviceReady {
                name,
                device: Device::Ssh {
                    host,
                    port,
                    user,
                    password: input.to_string(),
                },
            },
        ),
    }
}

fn retry_device(state: AddDeviceState, prompt: &str) -> (Option<WizardFlow>, WizardStep) {
    (
        Some(WizardFlow::AddDevice(state)),
        WizardStep::Retry(prompt.to_string()),
    )
}

fn advance_schedule(state: AddScheduleState, input: &str) -> (Option<WizardFlow>, WizardStep) {
    let input = input.trim();
    match state {
        AddScheduleState::AwaitDevice => {
            if input.is_empty() {
                return retry_schedule(
                    AddScheduleState::AwaitDevice,
                    "A device name is required. Device?",
                );
            }
            (
                Some(WizardFlow::AddSchedule(AddScheduleState::AwaitAction {
                    device: input.to_string(),
                })),
                WizardStep::Prompt("Action? (start, stop, restart)".to_string()),
            )
        }
        AddScheduleState::AwaitAction { device } => match TaskAction::parse(input) {
            Some(action) => (
                Some(WizardFlow::AddSchedule(AddScheduleState::AwaitTime {
                    device,
                    action,
                })),
                WizardStep::Prompt("Time of day? (HH:MM, 24h)".to_string()),
            ),
            None => retry_schedule(
                AddScheduleState::AwaitAction { device },
                "Unknown action. Action? (start, stop, restart)",
            ),
        },
        AddScheduleState::AwaitTime { device, action } => match parse_time_of_day(input) {
            Ok(_) => (
                Some(WizardFlow::AddSchedule(AddScheduleState::AwaitDays {
                    device,
                    action,
                    time: input.to_string(),
                })),
                WizardStep::Prompt(
                    "Weekdays? (comma-separated, 0=Monday..6=Sunday)".to_string(),
                ),
            ),
            Err(message) => retry_schedule(
                AddScheduleState::AwaitTime { device, action },
                &format!("{message}. Time?"),
            ),
        },
        AddScheduleState::AwaitDays {
            device,
            action,
            time,
        } => match parse_days(input) {
            Ok(days) => (
                None,
                WizardStep::ScheduleReady(ScheduledTask {
                    device,
                    action,
                    time,
                    days,
                    enabled: true,
                    timezone: "UTC".to_string(),
                }),
            ),
            Err(message) => retry_schedule(
                AddScheduleState::AwaitDays {
                    device,
                    action,
                    time,
                },
                &format!("{message}. Weekdays?"),
            ),
        },
    }
}

fn retry_schedule(state: AddScheduleState, prompt: &str) -> (Option<WizardFlow>, WizardStep) {
    (
        Some(WizardFlow::AddSchedule(state)),
        WizardStep::Retry(prompt.to_string()),
    )
}

pub fn parse_days(input: &str) -> Result<Vec<u8>, String> {
    let mut days = Vec::new();
    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let day: u8 = part
            .parse()
            .map_err(|_| format!("'{part}' is not a weekday number"))?;
        if day > 6 {
            return Err("Weekdays are numbered 0 (Monday) through 6 (Sunday)".to_string());
        }
        if !days.contains(&day) {
            days.push(day);
        }
    }
    if days.is_empty() {
        return Err("At least one weekday is required".to_string());
    }
    days.sort_unstable();
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advance_ok(flow: WizardFlow, input: &str) -> (Option<WizardFlow>, WizardStep) {
        flow.advance(input)
    }

    #[test]
    fn add_ssh_device_walks_every_field() {
        let (flow, _) = WizardFlow::add_device();
        let (flow, step) = advance_ok(flow, "Pi1");
        assert!(matches!(step, WizardStep::Prompt(_)));
        let (flow, _) = advance_ok(flow.expect("flow"), "ssh");
        let (flow, _) = advance_ok(flow.expect("flow"), "10.0.0.5");
        let (flow, _) = advance_ok(flow.expect("flow"), "");
        let (flow, _) = advance_ok(flow.expect("flow"), "pi");
        let (flow, step) = advance_ok(flow.expect("flow"), "raspberry");

        assert!(flow.is_none());
        match step {
            WizardStep::DeviceReady { name, device } => {
                assert_eq!(name, "Pi1");
                assert_eq!(
                    device,
                    Device::Ssh {
                        host: "10.0.0.5".to_string(),
                        port: 22,
                        user: "pi".to_string(),
                        password: "raspberry".to_string(),
                    }
                );
            }
            other => panic!("expected device, got {other:?}"),
        }
    }

    #[test]
    fn add_adb_device_skips_credentials() {
        let (flow, _) = WizardFlow::add_device();
        let (flow, _) = advance_ok(flow, "Phone1");
        let (flow, _) = advance_ok(flow.expect("flow"), "adb");
        let (flow, _) = advance_ok(flow.expect("flow"), "10.0.0.9");
        let (flow, step) = advance_ok(flow.expect("flow"), "");
        assert!(flow.is_none());
        match step {
            WizardStep::DeviceReady { device, .. } => assert_eq!(
                device,
                Device::Adb {
                    host: "10.0.0.9".to_string(),
                    port: 5555,
                }
            ),
            other => panic!("expected device, got {other:?}"),
        }
    }

    #[test]
    fn bad_input_retries_without_moving() {
        let (flow, _) = WizardFlow::add_device();
        let (flow, _) = advance_ok(flow, "Pi1");
        let (flow, step) = advance_ok(flow.expect("flow"), "carrier-pigeon");
        assert!(matches!(step, WizardStep::Retry(_)));
        // Still awaiting the kind: a valid kind is accepted next.
        let (_, step) = advance_ok(flow.expect("flow"), "local");
        assert!(matches!(step, WizardStep::Prompt(_)));
    }

    #[test]
    fn bad_port_retries() {
        let (flow, _) = WizardFlow::add_device();
        let (flow, _) = advance_ok(flow, "Pi1");
        let (flow, _) = advance_ok(flow.expect("flow"), "ssh");
        let (flow, _) = advance_ok(flow.expect("flow"), "10.0.0.5");
        let (flow, step) = advance_ok(flow.expect("flow"), "not-a-port");
        assert!(matches!(step, WizardStep::Retry(_)));
        assert!(flow.is_some());
    }

    #[test]
    fn add_schedule_produces_a_task() {
        let (flow, _) = WizardFlow::add_schedule();
        let (flow, _) = advance_ok(flow, "Pi1");
        let (flow, _) = advance_ok(flow.expect("flow"), "restart");
        let (flow, _) = advance_ok(flow.expect("flow"), "08:00");
        let (flow, step) = advance_ok(flow.expect("flow"), "0,1,2,3,4");
        assert!(flow.is_none());
        match step {
            WizardStep::ScheduleReady(task) => {
                assert_eq!(task.task_id(), "Pi1_08:00_restart");
                assert_eq!(task.days, vec![0, 1, 2, 3, 4]);
                assert!(task.enabled);
            }
            other => panic!("expected schedule, got {other:?}"),
        }
    }

    #[test]
    fn schedule_rejects_bad_time_and_days() {
        let (flow, _) = WizardFlow::add_schedule();
        let (flow, _) = advance_ok(flow, "Pi1");
        let (flow, _) = advance_ok(flow.expect("flow"), "stop");
        let (flow, step) = advance_ok(flow.expect("flow"), "25:99");
        assert!(matches!(step, WizardStep::Retry(_)));
        let (flow, _) = advance_ok(flow.expect("flow"), "22:30");
        let (flow, step) = advance_ok(flow.expect("flow"), "7");
        assert!(matches!(step, WizardStep::Retry(_)));
        assert!(flow.is_some());
    }

    #[test]
    fn parse_days_dedupes_and_sorts() {
        assert_eq!(parse_days("4, 0, 4, 2"), Ok(vec![0, 2, 4]));
        assert!(parse_days("").is_err());
        assert!(parse_days("9").is_err());
        assert!(parse_days("mon").is_err());
    }
}
