use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tracing::warn;

use crate::app::models::{
    ActivityLogEntry, AlertSettings, AutoRestartConfig, Device, HealthRecord, ScheduledTask,
};
use crate::app::store::{self, StorePaths};
use crate::app::wizard::WizardFlow;

/// All shared mutable state, one mutex per concern. The foreground operations
/// and the three background loops all go through this struct; nothing is
/// module-global.
pub struct FleetState {
    pub paths: StorePaths,
    pub devices: Mutex<HashMap<String, Device>>,
    pub health: Mutex<HashMap<String, HealthRecord>>,
    pub auto_restart: Mutex<HashMap<String, AutoRestartConfig>>,
    pub schedules: Mutex<HashMap<String, ScheduledTask>>,
    pub activity: Mutex<VecDeque<ActivityLogEntry>>,
    pub selections: Mutex<HashMap<i64, String>>,
    pub wizards: Mutex<HashMap<i64, WizardFlow>>,
    pub alerts: Mutex<AlertSettings>,
}

impl FleetState {
    /// Load every persisted document, falling back to defaults (with a
    /// warning) on unreadable files so the daemon still comes up.
    pub fn load(paths: StorePaths) -> Self {
        let devices = store::load_devices(&paths.devices).unwrap_or_else(|err| {
            warn!(error = %err, "failed to load device registry, starting empty");
            HashMap::new()
        });
        let schedules = store::load_schedules(&paths.schedules).unwrap_or_else(|err| {
            warn!(error = %err, "failed to load schedules, starting empty");
            HashMap::new()
        });
        let auto_restart = store::load_auto_restart(&paths.auto_restart).unwrap_or_else(|err| {
            warn!(error = %err, "failed to load auto-restart settings, starting empty");
            HashMap::new()
        });
        let activity = store::load_activity_log(&paths.activity_log).unwrap_or_else(|err| {
            warn!(error = %err, "failed to load activity log, starting empty");
            Vec::new()
        });

        Self {
            paths,
            devices: Mutex::new(devices),
            health: Mutex::new(HashMap::new()),
            auto_restart: Mutex::new(auto_restart),
            schedules: Mutex::new(schedules),
            activity: Mutex::new(activity.into()),
            selections: Mutex::new(HashMap::new()),
            wizards: Mutex::new(HashMap::new()),
            alerts: Mutex::new(AlertSettings::default()),
        }
    }

    /// Fresh state with nothing persisted yet; used by tests.
    pub fn empty(paths: StorePaths) -> Self {
        Self {
            paths,
            devices: Mutex::new(HashMap::new()),
            health: Mutex::new(HashMap::new()),
            auto_restart: Mutex::new(HashMap::new()),
            schedules: Mutex::new(HashMap::new()),
            activity: Mutex::new(VecDeque::new()),
            selections: Mutex::new(HashMap::new()),
            wizards: Mutex::new(HashMap::new()),
            alerts: Mutex::new(AlertSettings::default()),
        }
    }
}
