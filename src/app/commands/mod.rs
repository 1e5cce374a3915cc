use std::thread;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::app::activity;
use crate::app::error::{AppError, CommandOutcome};
use crate::app::health;
use crate::app::models::{
    ActivityLogEntry, AlertSettings, AppStatus, AutoRestartConfig, Device, DeviceStatusRow,
    HealthStatus, LogType, ScheduledTask, TaskAction,
};
use crate::app::router::{self, AppCommand};
use crate::app::schedule::{parse_time_of_day, RESTART_DELAY};
use crate::app::state::FleetState;
use crate::app::status;
use crate::app::store::{self, MAX_INTERVAL_HOURS, MIN_INTERVAL_HOURS};
use crate::app::transport::runner::ProcessRunner;
use crate::app::wizard::{WizardFlow, WizardStep};


fn ensure_trace_id(trace_id: Option<String>) -> String {
    trace_id
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

// ------------------------------- devices --------------------------------- //

pub fn list_devices(state: &FleetState) -> Vec<(String, Device)> {
    let mut devices: Vec<(String, Device)> = state
        .devices
        .lock()
        .expect("device registry poisoned")
        .iter()
        .map(|(name, device)| (name.clone(), device.clone()))
        .collect();
    devices.sort_by(|a, b| a.0.cmp(&b.0));
    devices
}

pub fn add_device(state: &FleetState, name: &str, device: Device) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::config("Device name is required", ""));
    }
    let snapshot = {
        let mut devices = state.devices.lock().expect("device registry poisoned");
        devices.insert(name.to_string(), device);
        devices.clone()
    };
    store::save_devices(&state.paths.devices, &snapshot)?;
    Ok(format!("Device '{name}' added"))
}

/// Remove a device and purge any session selections pointing at it, so no
/// session can keep acting on a ghost entry.
pub fn remove_device(state: &FleetState, name: &str) -> Result<String, AppError> {
    let snapshot = {
        let mut devices = state.devices.lock().expect("device registry poisoned");
        if devices.remove(name).is_none() {
            return Err(AppError::not_found(router::device_not_found(name), ""));
        }
        devices.clone()
    };
    state
        .selections
        .lock()
        .expect("selections poisoned")
        .retain(|_, selected| selected != name);
    store::save_devices(&state.paths.devices, &snapshot)?;
    Ok(format!("Device '{name}' removed"))
}

// -------------------------------- status --------------------------------- //

pub fn device_status(
    state: &FleetState,
    runner: &dyn ProcessRunner,
    name: &str,
    trace_id: Option<String>,
) -> CommandOutcome {
    let trace_id = ensure_trace_id(trace_id);
    if router::lookup(&state.devices, name).is_none() {
        return CommandOutcome::failed(router::device_not_found(name));
    }
    let app_status = status::resolve_status(&state.devices, runner, name, &trace_id);
    let failed = matches!(app_status, AppStatus::Error(_));
    let outcome = format!("Status ({name}): {}", app_status.label());
    if failed {
        CommandOutcome::failed(outcome)
    } else {
        CommandOutcome::ok(outcome)
    }
}

/// The dashboard: health probe plus app status for every device.
pub fn fleet_status(
    state: &FleetState,
    runner: &dyn ProcessRunner,
    trace_id: Option<String>,
) -> Vec<DeviceStatusRow> {
    let trace_id = ensure_trace_id(trace_id);
    list_devices(state)
        .into_iter()
        .map(|(name, device)| {
            let online = health::probe(&state.devices, runner, &state.health, &name, &trace_id);
            let app_status = status::resolve_status(&state.devices, runner, &name, &trace_id);
            DeviceStatusRow {
                name,
                kind: device.kind().to_string(),
                health: if online {
                    HealthStatus::Online
                } else {
                    HealthStatus::Offline
                },
                app_status: app_status.label(),
            }
        })
        .collect()
}

// -------------------------------- actions -------------------------------- //

pub fn start_app(
    state: &FleetState,
    runner: &dyn ProcessRunner,
    name: &str,
    user: &str,
    trace_id: Option<String>,
) -> CommandOutcome {
    let trace_id = ensure_trace_id(trace_id);
    let outcome = router::dispatch(&state.devices, runner, name, AppCommand::Start, &trace_id);
    activity::append(state, name, "start", &outcome.output, LogType::Manual, user);
    outcome
}

pub fn stop_app(
    state: &FleetState,
    runner: &dyn ProcessRunner,
    name: &str,
    user: &str,
    trace_id: Option<String>,
) -> CommandOutcome {
    let trace_id = ensure_trace_id(trace_id);
    let outcome = router::dispatch(&state.devices, runner, name, AppCommand::Stop, &trace_id);
    activity::append(state, name, "stop", &outcome.output, LogType::Manual, user);
    outcome
}

pub fn restart_app(
    state: &FleetState,
    runner: &dyn ProcessRunner,
    name: &str,
    user: &str,
    trace_id: Option<String>,
) -> CommandOutcome {
    restart_app_inner(state, runner, name, user, trace_id, &|duration| {
        thread::sleep(duration)
    })
}

pub(crate) fn restart_app_inner(
    state: &FleetState,
    runner: &dyn ProcessRunner,
    name: &str,
    user: &str,
    trace_id: Option<String>,
    sleep: &dyn Fn(Duration),
) -> CommandOutcome {
    let trace_id = ensure_trace_id(trace_id);
    let stop = router::dispatch(&state.devices, runner, name, AppCommand::Stop, &trace_id);
    sleep(RESTART_DELAY);
    let start = router::dispatch(&state.devices, runner, name, AppCommand::Start, &trace_id);
    let outcome = CommandOutcome {
        success: stop.success && start.success,
        output: format!("Stop: {}\n\nStart: {}", stop.output, start.output),
    };
    activity::append(state, name, "restart", &outcome.output, LogType::Manual, user);
    outcome
}

pub fn start_all(
    state: &FleetState,
    runner: &dyn ProcessRunner,
    user: &str,
    trace_id: Option<String>,
) -> Vec<(String, CommandOutcome)> {
    let trace_id = ensure_trace_id(trace_id);
    list_devices(state)
        .into_iter()
        .map(|(name, _)| {
            let outcome = start_app(state, runner, &name, user, Some(trace_id.clone()));
            (name, outcome)
        })
        .collect()
}

pub fn stop_all(
    state: &FleetState,
    runner: &dyn ProcessRunner,
    user: &str,
    trace_id: Option<String>,
) -> Vec<(String, CommandOutcome)> {
    let trace_id = ensure_trace_id(trace_id);
    list_devices(state)
        .into_iter()
        .map(|(name, _)| {
            let outcome = stop_app(state, runner, &name, user, Some(trace_id.clone()));
            (name, outcome)
        })
        .collect()
}

pub fn restart_all(
    state: &FleetState,
    runner: &dyn ProcessRunner,
    user: &str,
    trace_id: Option<String>,
) -> Vec<(String, CommandOutcome)> {
    let trace_id = ensure_trace_id(trace_id);
    list_devices(state)
        .into_iter()
        .map(|(name, _)| {
            let outcome = restart_app(state, runner, &name, user, Some(trace_id.clone()));
            (name, outcome)
        })
        .collect()
}

pub fn device_id(
    state: &FleetState,
    runner: &dyn ProcessRunner,
    name: &str,
    trace_id: Option<String>,
) -> CommandOutcome {
    let trace_id = ensure_trace_id(trace_id);
    router::dispatch(&state.devices, runner, name, AppCommand::ShowId, &trace_id)
}

pub fn register_device(
    state: &FleetState,
    runner: &dyn ProcessRunner,
    name: &str,
    trace_id: Option<String>,
) -> CommandOutcome {
    let trace_id = ensure_trace_id(trace_id);
    router::dispatch(&state.devices, runner, name, AppCommand::Register, &trace_id)
}

pub fn uninstall_app(
    state: &FleetState,
    runner: &dyn ProcessRunner,
    name: &str,
    trace_id: Option<String>,
) -> CommandOutcome {
    let trace_id = ensure_trace_id(trace_id);
    router::dispatch(&state.devices, runner, name, AppCommand::Uninstall, &trace_id)
}

// ------------------------------ schedules -------------------------------- //

pub fn list_schedules(state: &FleetState) -> Vec<(String, ScheduledTask)> {
    let mut schedules: Vec<(String, ScheduledTask)> = state
        .schedules
        .lock()
        .expect("schedules poisoned")
        .iter()
        .map(|(id, task)| (id.clone(), task.clone()))
        .collect();
    schedules.sort_by(|a, b| a.0.cmp(&b.0));
    schedules
}

pub fn add_schedule(
    state: &FleetState,
    device: &str,
    action: TaskAction,
    time: &str,
    days: Vec<u8>,
) -> Result<String, AppError> {
    parse_time_of_day(time).map_err(|message| AppError::config(message, ""))?;
    if days.is_empty() {
        return Err(AppError::config("At least one weekday is required", ""));
    }
    if days.iter().any(|day| *day > 6) {
        return Err(AppError::config(
            "Weekdays are numbered 0 (Monday) through 6 (Sunday)",
            "",
        ));
    }
    let mut days = days;
    days.sort_unstable();
    days.dedup();

    let task = ScheduledTask {
        device: device.to_string(),
        action,
        time: time.trim().to_string(),
        days,
        enabled: true,
        timezone: "UTC".to_string(),
    };
    let task_id = task.task_id();
    let snapshot = {
        let mut schedules = state.schedules.lock().expect("schedules poisoned");
        schedules.insert(task_id.clone(), task);
        schedules.clone()
    };
    store::save_schedules(&state.paths.schedules, &snapshot)?;
    Ok(task_id)
}

pub fn delete_schedule(state: &FleetState, task_id: &str) -> Result<String, AppError> {
    let snapshot = {
        let mut schedules = state.schedules.lock().expect("schedules poisoned");
        if schedules.remove(task_id).is_none() {
            return Err(AppError::not_found(
                format!("Schedule '{task_id}' not found"),
                "",
            ));
        }
        schedules.clone()
    };
    store::save_schedules(&state.paths.schedules, &snapshot)?;
    Ok(format!("Schedule '{task_id}' removed"))
}

// ----------------------------- auto-restart ------------------------------ //

pub fn list_auto_restart(state: &FleetState) -> Vec<(String, AutoRestartConfig)> {
    let mut configs: Vec<(String, AutoRestartConfig)> = state
        .auto_restart
        .lock()
        .expect("auto-restart config poisoned")
        .iter()
        .map(|(name, config)| (name.clone(), config.clone()))
        .collect();
    configs.sort_by(|a, b| a.0.cmp(&b.0));
    configs
}

pub fn set_auto_restart(
    state: &FleetState,
    name: &str,
    interval_hours: f64,
) -> Result<String, AppError> {
    set_auto_restart_at(state, name, interval_hours, Utc::now().timestamp())
}

pub fn set_auto_restart_at(
    state: &FleetState,
    name: &str,
    interval_hours: f64,
    now: i64,
) -> Result<String, AppError> {
    if !(MIN_INTERVAL_HOURS..=MAX_INTERVAL_HOURS).contains(&interval_hours) {
        return Err(AppError::config(
            format!(
                "Interval must be between {MIN_INTERVAL_HOURS} and {MAX_INTERVAL_HOURS} hours"
            ),
            "",
        ));
    }
    let snapshot = {
        let mut configs = state
            .auto_restart
            .lock()
            .expect("auto-restart config poisoned");
        configs.insert(
            name.to_string(),
            AutoRestartConfig {
                enabled: true,
                interval_hours,
                delay_seconds: 5,
                last_run: now,
            },
        );
        configs.clone()
    };
    store::save_auto_restart(&state.paths.auto_restart, &snapshot)?;
    Ok(format!(
        "Auto-restart every {interval_hours}h configured for '{name}'"
    ))
}

/// Disabling keeps the record (with its interval) so re-enabling is cheap.
pub fn disable_auto_restart(state: &FleetState, name: &str) -> Result<String, AppError> {
    let snapshot = {
        let mut configs = state
            .auto_restart
            .lock()
            .expect("auto-restart config poisoned");
        match configs.get_mut(name) {
            Some(config) => config.enabled = false,
            None => {
                return Err(AppError::not_found(
                    format!("No auto-restart configured for '{name}'"),
                    "",
                ))
            }
        }
        configs.clone()
    };
    store::save_auto_restart(&state.paths.auto_restart, &snapshot)?;
    Ok(format!("Auto-restart disabled for '{name}'"))
}

// ------------------------------- activity -------------------------------- //

pub fn query_activity(
    state: &FleetState,
    device: Option<&str>,
    from: Option<i64>,
    to: Option<i64>,
    limit: usize,
) -> Vec<ActivityLogEntry> {
    activity::query(state, device, from, to, limit)
}

// -------------------------------- health --------------------------------- //

pub fn health_check_all(
    state: &FleetState,
    runner: &dyn ProcessRunner,
    trace_id: Option<String>,
) -> Vec<(String, HealthStatus)> {
    let trace_id = ensure_trace_id(trace_id);
    list_devices(state)
        .into_iter()
        .map(|(name, _)| {
            let online = health::probe(&state.devices, runner, &state.health, &name, &trace_id);
            (
                name,
                if online {
                    HealthStatus::Online
                } else {
                    HealthStatus::Offline
                },
            )
        })
        .collect()
}

pub fn alert_settings(state: &FleetState) -> AlertSettings {
    *state.alerts.lock().expect("alert settings poisoned")
}

pub fn update_alert_settings(state: &FleetState, settings: AlertSettings) -> String {
    *state.alerts.lock().expect("alert settings poisoned") = settings;
    "Alert settings updated".to_string()
}

// ------------------------------- sessions -------------------------------- //

pub fn select_device(state: &FleetState, session: i64, name: &str) -> Result<String, AppError> {
    if router::lookup(&state.devices, name).is_none() {
        return Err(AppError::not_found(router::device_not_found(name), ""));
    }
    state
        .selections
        .lock()
        .expect("selections poisoned")
        .insert(session, name.to_string());
    Ok(format!("Device '{name}' selected"))
}

pub fn selected_device(state: &FleetState, session: i64) -> Option<String> {
    state
        .selections
        .lock()
        .expect("selections poisoned")
        .get(&session)
        .cloned()
}

/// Status for whatever the session has selected; a purged or never-made
/// selection is a failed outcome, not a stale answer.
pub fn session_status(
    state: &FleetState,
    runner: &dyn ProcessRunner,
    session: i64,
    trace_id: Option<String>,
) -> CommandOutcome {
    match selected_device(state, session) {
        Some(name) => device_status(state, runner, &name, trace_id),
        None => CommandOutcome::failed("No device selected for this session"),
    }
}

// -------------------------------- wizards -------------------------------- //

pub fn wizard_start_add_device(state: &FleetState, session: i64) -> String {
    let (flow, prompt) = WizardFlow::add_device();
    state
        .wizards
        .lock()
        .expect("wizards poisoned")
        .insert(session, flow);
    prompt
}

pub fn wizard_start_add_schedule(state: &FleetState, session: i64) -> String {
    let (flow, prompt) = WizardFlow::add_schedule();
    state
        .wizards
        .lock()
        .expect("wizards poisoned")
        .insert(session, flow);
    prompt
}

pub fn wizard_cancel(state: &FleetState, session: i64) -> String {
    match state
        .wizards
        .lock()
        .expect("wizards poisoned")
        .remove(&session)
    {
        Some(_) => "Wizard cancelled".to_string(),
        None => "No wizard in progress".to_string(),
    }
}

/// Feed one line of user input into the session's wizard. Completed flows
/// apply their result through the regular add operations.
pub fn wizard_input(state: &FleetState, session: i64, input: &str) -> String {
    let flow = state
        .wizards
        .lock()
        .expect("wizards poisoned")
        .remove(&session);
    let Some(flow) = flow else {
        return "No wizard in progress".to_string();
    };

    let (next, step) = flow.advance(input);
    if let Some(next) = next {
        state
            .wizards
            .lock()
            .expect("wizards poisoned")
            .insert(session, next);
    }

    match step {
        WizardStep::Prompt(prompt) | WizardStep::Retry(prompt) => prompt,
        WizardStep::DeviceReady { name, device } => match add_device(state, &name, device) {
            Ok(message) => message,
            Err(err) => err.error,
        },
        WizardStep::ScheduleReady(task) => {
            match add_schedule(state, &task.device, task.action, &task.time, task.days.clone()) {
                Ok(task_id) => format!("Schedule '{task_id}' added"),
                Err(err) => err.error,
            }
        }
    }
}
