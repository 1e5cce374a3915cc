use std::collections::HashMap;
use std::sync::Mutex;

use regex::Regex;

use crate::app::models::{AppStatus, Device};
use crate::app::router::{self, EARNAPP_CMD, EARNAPP_PACKAGE};
use crate::app::transport::runner::ProcessRunner;

const ERROR_SNIPPET_MAX: usize = 50;
const NO_OUTPUT: &str = "(no output)";

struct StatusRule {
    pattern: Regex,
    outcome: AppStatus,
}

/// Prioritized pattern rules over the managed CLI's status text, kept as data
/// so they can be tested and swapped without touching transport code.
pub struct StatusMatcher {
    rules: Vec<StatusRule>,
    re_error: Regex,
    re_pid: Regex,
}

impl StatusMatcher {
    pub fn new() -> Self {
        Self {
            rules: vec![
                StatusRule {
                    pattern: Regex::new(r"(?i)\b(enabled|running)\b").unwrap(),
                    outcome: AppStatus::Running,
                },
                StatusRule {
                    pattern: Regex::new(r"(?i)\b(disabled|stopped)\b").unwrap(),
                    outcome: AppStatus::Stopped,
                },
            ],
            re_error: Regex::new(r"(?i)error").unwrap(),
            re_pid: Regex::new(r"^\d+$").unwrap(),
        }
    }

    /// First matching rule wins; None when the text is inconclusive or
    /// carries an error marker (the CLI sometimes answers "checking...").
    pub fn classify(&self, text: &str) -> Option<AppStatus> {
        if self.has_error_marker(text) {
            return None;
        }
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(text))
            .map(|rule| rule.outcome.clone())
    }

    pub fn has_error_marker(&self, text: &str) -> bool {
        self.re_error.is_match(text)
    }

    pub fn is_single_pid(&self, text: &str) -> bool {
        self.re_pid.is_match(text.trim())
    }
}

impl Default for StatusMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the managed application's run state on one device. Total: every
/// path lands in one of the five variants, and transport failures collapse
/// into `Error` instead of propagating.
pub fn resolve_status(
    devices: &Mutex<HashMap<String, Device>>,
    runner: &dyn ProcessRunner,
    name: &str,
    trace_id: &str,
) -> AppStatus {
    let Some(device) = router::lookup(devices, name) else {
        return AppStatus::Error(truncate(&router::device_not_found(name)));
    };
    match device {
        Device::Adb { .. } => resolve_package_state(&device, runner, trace_id),
        _ => resolve_cli_state(&device, runner, trace_id),
    }
}

/// local/ssh: native status text first, then the process table, then the
/// binary on the search path. Each later probe only runs when the previous
/// one was inconclusive.
fn resolve_cli_state(device: &Device, runner: &dyn ProcessRunner, trace_id: &str) -> AppStatus {
    let matcher = StatusMatcher::new();

    let status_text =
        match router::run_on_device(device, runner, &format!("{EARNAPP_CMD} status"), trace_id) {
            Ok(outcome) => outcome.output,
            Err(err) => return AppStatus::Error(truncate(&err.error)),
        };
    if let Some(status) = matcher.classify(&status_text) {
        return status;
    }

    let probe = match router::run_on_device(
        device,
        runner,
        "pgrep -f earnapp || ps aux | grep -i earnapp | grep -v grep",
        trace_id,
    ) {
        Ok(outcome) => outcome,
        Err(err) => return AppStatus::Error(truncate(&err.error)),
    };
    let process_alive = probe.success
        && probe.output != NO_OUTPUT
        && !matcher.has_error_marker(&probe.output);
    if process_alive {
        // A live process can still mean "disabled"; ask the CLI again with
        // stderr folded in before trusting the process table.
        let requery = match router::run_on_device(
            device,
            runner,
            &format!("{EARNAPP_CMD} status 2>&1"),
            trace_id,
        ) {
            Ok(outcome) => outcome.output,
            Err(err) => return AppStatus::Error(truncate(&err.error)),
        };
        if let Some(status) = matcher.classify(&requery) {
            return status;
        }
    }

    let check = match router::run_on_device(
        device,
        runner,
        &format!("which {EARNAPP_CMD} || command -v {EARNAPP_CMD}"),
        trace_id,
    ) {
        Ok(outcome) => outcome,
        Err(err) => return AppStatus::Error(truncate(&err.error)),
    };
    if check.success && check.output.contains(EARNAPP_CMD) {
        if matcher.has_error_marker(&check.output) {
            return AppStatus::Unknown;
        }
        return AppStatus::Stopped;
    }
    AppStatus::NotInstalled
}

/// adb has no status CLI; a live pid means running, an installed package
/// without one means stopped.
fn resolve_package_state(device: &Device, runner: &dyn ProcessRunner, trace_id: &str) -> AppStatus {
    let matcher = StatusMatcher::new();

    match router::run_on_device(device, runner, &format!("pidof {EARNAPP_PACKAGE}"), trace_id) {
        Ok(outcome) => {
            if outcome.success && matcher.is_single_pid(&outcome.output) {
                return AppStatus::Running;
            }
        }
        Err(err) => return AppStatus::Error(truncate(&err.error)),
    }

    match router::run_on_device(
        device,
        runner,
        &format!("pm list packages | grep {EARNAPP_PACKAGE}"),
        trace_id,
    ) {
        Ok(outcome) if outcome.output.contains(EARNAPP_PACKAGE) => AppStatus::Stopped,
        Ok(_) => AppStatus::NotInstalled,
        Err(err) => AppStatus::Error(truncate(&err.error)),
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(ERROR_SNIPPET_MAX).collect()
}
