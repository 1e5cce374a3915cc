use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use crate::app::models::{Device, HealthRecord, HealthStatus};
use crate::app::router;
use crate::app::transport::runner::ProcessRunner;

const NO_OUTPUT: &str = "(no output)";

/// Cheap per-transport liveness command; this checks the device, not the
/// managed application.
fn liveness_command(device: &Device) -> &'static str {
    match device {
        Device::Adb { .. } => "getprop ro.build.version.release",
        _ => "echo health_check",
    }
}

/// Probe one device and overwrite its HealthRecord. Returns true when the
/// device answered.
pub fn probe(
    devices: &Mutex<HashMap<String, Device>>,
    runner: &dyn ProcessRunner,
    health: &Mutex<HashMap<String, HealthRecord>>,
    name: &str,
    trace_id: &str,
) -> bool {
    let result = match router::lookup(devices, name) {
        Some(device) => router::run_on_device(&device, runner, liveness_command(&device), trace_id),
        None => {
            record(health, name, HealthStatus::Offline, Some(router::device_not_found(name)));
            return false;
        }
    };

    match result {
        Ok(outcome) => {
            let answered = outcome.success
                && outcome.output != NO_OUTPUT
                && !outcome.output.to_lowercase().contains("error");
            if answered {
                record(health, name, HealthStatus::Online, None);
            } else {
                record(health, name, HealthStatus::Offline, Some("Command failed".to_string()));
            }
            answered
        }
        Err(err) => {
            record(health, name, HealthStatus::Offline, Some(err.error));
            false
        }
    }
}

fn record(
    health: &Mutex<HashMap<String, HealthRecord>>,
    name: &str,
    status: HealthStatus,
    error: Option<String>,
) {
    let now = Utc::now().timestamp();
    let mut guard = health.lock().expect("health map poisoned");
    // last_check never moves backwards, even if the wall clock does.
    let last_check = guard
        .get(name)
        .map(|previous| previous.last_check.max(now))
        .unwrap_or(now);
    guard.insert(
        name.to_string(),
        HealthRecord {
            status,
            last_check,
            error,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testkit::FakeRunner;

    fn fleet() -> Mutex<HashMap<String, Device>> {
        let mut devices = HashMap::new();
        devices.insert(
            "Pi1".to_string(),
            Device::Ssh {
                host: "10.0.0.5".to_string(),
                port: 22,
                user: "pi".to_string(),
                password: "x".to_string(),
            },
        );
        devices.insert(
            "Phone1".to_string(),
            Device::Adb {
                host: "10.0.0.9".to_string(),
                port: 5555,
            },
        );
        Mutex::new(devices)
    }

    #[test]
    fn answering_device_is_online() {
        let devices = fleet();
        let health = Mutex::new(HashMap::new());
        let runner = FakeRunner::new().responding("echo health_check", "health_check");
        assert!(probe(&devices, &runner, &health, "Pi1", "t"));
        let guard = health.lock().expect("health");
        let record = guard.get("Pi1").expect("record");
        assert_eq!(record.status, HealthStatus::Online);
        assert!(record.error.is_none());
        assert!(record.last_check > 0);
    }

    #[test]
    fn adb_probe_reads_a_system_property() {
        let devices = fleet();
        let health = Mutex::new(HashMap::new());
        let runner = FakeRunner::new().responding("getprop ro.build.version.release", "13");
        assert!(probe(&devices, &runner, &health, "Phone1", "t"));
        assert!(runner
            .calls()
            .iter()
            .any(|line| line.contains("getprop ro.build.version.release")));
    }

    #[test]
    fn transport_failure_records_offline_with_reason() {
        let devices = fleet();
        let health = Mutex::new(HashMap::new());
        let runner = FakeRunner::new().erroring("sshpass", "connection refused");
        assert!(!probe(&devices, &runner, &health, "Pi1", "t"));
        let guard = health.lock().expect("health");
        let record = guard.get("Pi1").expect("record");
        assert_eq!(record.status, HealthStatus::Offline);
        assert!(record
            .error
            .as_deref()
            .is_some_and(|error| error.contains("connection refused")));
    }

    #[test]
    fn empty_answer_is_offline() {
        let devices = fleet();
        let health = Mutex::new(HashMap::new());
        let runner = FakeRunner::new().failing("echo health_check", "", 1);
        assert!(!probe(&devices, &runner, &health, "Pi1", "t"));
        let guard = health.lock().expect("health");
        assert_eq!(
            guard.get("Pi1").expect("record").status,
            HealthStatus::Offline
        );
    }
}
