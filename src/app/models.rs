use serde::{Deserialize, Serialize};

fn default_local_path() -> String {
    "/usr/bin".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_adb_port() -> u16 {
    5555
}

/// One controllable target. The serde tag doubles as the registry's `type`
/// field, so a device can only deserialize with the parameters its transport
/// requires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Device {
    Local {
        #[serde(default = "default_local_path")]
        path: String,
    },
    Ssh {
        host: String,
        #[serde(default = "default_ssh_port")]
        port: u16,
        user: String,
        password: String,
    },
    Adb {
        host: String,
        #[serde(default = "default_adb_port")]
        port: u16,
    },
}

impl Device {
    pub fn kind(&self) -> &'static str {
        match self {
            Device::Local { .. } => "local",
            Device::Ssh { .. } => "ssh",
            Device::Adb { .. } => "adb",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthRecord {
    pub status: HealthStatus,
    pub last_check: i64,
    pub error: Option<String>,
}

/// Run state of the managed application on one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppStatus {
    Running,
    Stopped,
    NotInstalled,
    Unknown,
    Error(String),
}

impl AppStatus {
    pub fn label(&self) -> String {
        match self {
            AppStatus::Running => "Running".to_string(),
            AppStatus::Stopped => "Stopped".to_string(),
            AppStatus::NotInstalled => "Not installed".to_string(),
            AppStatus::Unknown => "Unknown".to_string(),
            AppStatus::Error(message) => format!("Error: {message}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskAction {
    Start,
    Stop,
    Restart,
}

impl TaskAction {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskAction::Start => "start",
            TaskAction::Stop => "stop",
            TaskAction::Restart => "restart",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "start" => Some(TaskAction::Start),
            "stop" => Some(TaskAction::Stop),
            "restart" => Some(TaskAction::Restart),
            _ => None,
        }
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// Calendar task: fire `action` on `device` at `time` (HH:MM local wall
/// clock) on each weekday in `days` (0=Monday..6=Sunday). The timezone field
/// is informational only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledTask {
    pub device: String,
    pub action: TaskAction,
    pub time: String,
    pub days: Vec<u8>,
    pub enabled: bool,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl ScheduledTask {
    pub fn task_id(&self) -> String {
        format!("{}_{}_{}", self.device, self.time, self.action.as_str())
    }
}

fn default_restart_delay() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoRestartConfig {
    pub enabled: bool,
    pub interval_hours: f64,
    #[serde(default = "default_restart_delay")]
    pub delay_seconds: u64,
    #[serde(default)]
    pub last_run: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    Manual,
    Auto,
    Scheduled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityLogEntry {
    pub timestamp: i64,
    pub device: String,
    pub action: String,
    pub result: String,
    #[serde(rename = "type")]
    pub log_type: LogType,
    pub user: String,
}

/// Process-wide alerting knobs. Held in memory only; restarts reset them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertSettings {
    pub enabled: bool,
    pub offline_threshold: u64,
    pub check_interval: u64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            offline_threshold: 300,
            check_interval: 60,
        }
    }
}

/// One dashboard row: device reachability plus the managed app's run state.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeviceStatusRow {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub health: HealthStatus,
    pub app_status: String,
}
