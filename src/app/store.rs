use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::app::error::AppError;
use crate::app::models::{ActivityLogEntry, AutoRestartConfig, Device, ScheduledTask};

pub const ACTIVITY_LOG_CAP: usize = 1000;
pub const MIN_INTERVAL_HOURS: f64 = 0.5;
pub const MAX_INTERVAL_HOURS: f64 = 168.0;

/// One JSON document per concern; each is loaded independently at startup and
/// fully rewritten on every mutation.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub devices: PathBuf,
    pub schedules: PathBuf,
    pub auto_restart: PathBuf,
    pub activity_log: PathBuf,
}

impl StorePaths {
    pub fn resolve() -> Self {
        Self::in_dir(&data_dir())
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self {
            devices: dir.join("devices.json"),
            schedules: dir.join("schedules.json"),
            auto_restart: dir.join("auto_restart.json"),
            activity_log: dir.join("activity_log.json"),
        }
    }
}

fn data_dir() -> PathBuf {
    if let Ok(path) = std::env::var("EARNFLEET_DATA_DIR") {
        return PathBuf::from(path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".earnfleet")
}

fn load_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, AppError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|err| {
        AppError::system(format!("Failed to read {}: {err}", path.display()), "")
    })?;
    let value = serde_json::from_str(&raw).map_err(|err| {
        AppError::system(format!("Failed to parse {}: {err}", path.display()), "")
    })?;
    Ok(Some(value))
}

fn save_document<T: Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let payload = serde_json::to_string_pretty(value).map_err(|err| {
        AppError::system(format!("Failed to serialize {}: {err}", path.display()), "")
    })?;
    fs::write(path, payload).map_err(|err| {
        AppError::system(format!("Failed to write {}: {err}", path.display()), "")
    })?;
    Ok(())
}

pub fn load_devices(path: &Path) -> Result<HashMap<String, Device>, AppError> {
    match load_document(path)? {
        Some(devices) => Ok(devices),
        None => {
            // First run: seed the host itself so the fleet is never empty.
            let mut devices = HashMap::new();
            devices.insert(
                "Local".to_string(),
                Device::Local {
                    path: "/usr/bin".to_string(),
                },
            );
            Ok(devices)
        }
    }
}

pub fn save_devices(path: &Path, devices: &HashMap<String, Device>) -> Result<(), AppError> {
    save_document(path, devices)
}

pub fn load_schedules(path: &Path) -> Result<HashMap<String, ScheduledTask>, AppError> {
    Ok(load_document(path)?.unwrap_or_default())
}

pub fn save_schedules(
    path: &Path,
    schedules: &HashMap<String, ScheduledTask>,
) -> Result<(), AppError> {
    save_document(path, schedules)
}

pub fn load_auto_restart(path: &Path) -> Result<HashMap<String, AutoRestartConfig>, AppError> {
    let configs: HashMap<String, AutoRestartConfig> = load_document(path)?.unwrap_or_default();
    Ok(configs
        .into_iter()
        .map(|(name, config)| (name, clamp_auto_restart(config)))
        .collect())
}

pub fn save_auto_restart(
    path: &Path,
    configs: &HashMap<String, AutoRestartConfig>,
) -> Result<(), AppError> {
    save_document(path, configs)
}

fn clamp_auto_restart(mut config: AutoRestartConfig) -> AutoRestartConfig {
    if !config.interval_hours.is_finite() {
        config.interval_hours = MIN_INTERVAL_HOURS;
    }
    config.interval_hours = config
        .interval_hours
        .clamp(MIN_INTERVAL_HOURS, MAX_INTERVAL_HOURS);
    if config.delay_seconds == 0 {
        config.delay_seconds = 5;
    }
    config
}

pub fn load_activity_log(path: &Path) -> Result<Vec<ActivityLogEntry>, AppError> {
    let mut entries: Vec<ActivityLogEntry> = load_document(path)?.unwrap_or_default();
    if entries.len() > ACTIVITY_LOG_CAP {
        entries.drain(..entries.len() - ACTIVITY_LOG_CAP);
    }
    Ok(entries)
}

pub fn save_activity_log(path: &Path, entries: &[ActivityLogEntry]) -> Result<(), AppError> {
    save_document(path, &entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::LogType;

    #[test]
    fn missing_device_file_seeds_local_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StorePaths::in_dir(dir.path());
        let devices = load_devices(&paths.devices).expect("load");
        assert_eq!(devices.len(), 1);
        assert!(matches!(devices.get("Local"), Some(Device::Local { .. })));
    }

    #[test]
    fn devices_round_trip_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StorePaths::in_dir(dir.path());
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
        save_devices(&paths.devices, &devices).expect("save");
        let loaded = load_devices(&paths.devices).expect("load");
        assert_eq!(loaded, devices);
    }

    #[test]
    fn auto_restart_intervals_are_clamped_on_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StorePaths::in_dir(dir.path());
        let mut configs = HashMap::new();
        configs.insert(
            "Pi1".to_string(),
            AutoRestartConfig {
                enabled: true,
                interval_hours: 0.01,
                delay_seconds: 0,
                last_run: 0,
            },
        );
        save_auto_restart(&paths.auto_restart, &configs).expect("save");
        let loaded = load_auto_restart(&paths.auto_restart).expect("load");
        let config = loaded.get("Pi1").expect("config");
        assert_eq!(config.interval_hours, MIN_INTERVAL_HOURS);
        assert_eq!(config.delay_seconds, 5);
    }

    #[test]
    fn oversized_activity_log_is_truncated_on_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StorePaths::in_dir(dir.path());
        let entries: Vec<ActivityLogEntry> = (0..ACTIVITY_LOG_CAP + 10)
            .map(|index| ActivityLogEntry {
                timestamp: index as i64,
                device: "Pi1".to_string(),
                action: "start".to_string(),
                result: String::new(),
                log_type: LogType::Manual,
                user: "tester".to_string(),
            })
            .collect();
        save_activity_log(&paths.activity_log, &entries).expect("save");
        let loaded = load_activity_log(&paths.activity_log).expect("load");
        assert_eq!(loaded.len(), ACTIVITY_LOG_CAP);
        assert_eq!(loaded.first().expect("first").timestamp, 10);
    }

    #[test]
    fn corrupt_document_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StorePaths::in_dir(dir.path());
        fs::write(&paths.schedules, "{not json").expect("write");
        assert!(load_schedules(&paths.schedules).is_err());
    }
}
