use std::collections::HashMap;

use crate::app::models::{AlertSettings, HealthRecord, HealthStatus};
use crate::app::notify::Notifier;

/// One alert sweep. Emits a notification for every device that has been
/// offline past the threshold; while the condition persists the operator gets
/// a repeat alert each cycle (no suppression window).
pub fn check_alerts(
    health: &HashMap<String, HealthRecord>,
    settings: &AlertSettings,
    notifier: &dyn Notifier,
    now: i64,
) {
    if !settings.enabled {
        return;
    }
    for (name, record) in health {
        if record.status != HealthStatus::Offline {
            continue;
        }
        let elapsed = now - record.last_check;
        if elapsed > settings.offline_threshold as i64 {
            notifier.notify(&format!(
                "Device '{}' offline for {} minutes",
                name,
                elapsed / 60
            ));
        }
    }
}
