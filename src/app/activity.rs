use chrono::Utc;
use tracing::warn;

use crate::app::models::{ActivityLogEntry, LogType};
use crate::app::state::FleetState;
use crate::app::store::{self, ACTIVITY_LOG_CAP};

const RESULT_MAX_LEN: usize = 500;

/// Append a start/stop/restart record. The oldest entries are evicted past
/// the cap and the whole log is rewritten to disk on every append; at this
/// event rate durability wins over throughput.
pub fn append(
    state: &FleetState,
    device: &str,
    action: &str,
    result: &str,
    log_type: LogType,
    user: &str,
) {
    append_at(
        state,
        Utc::now().timestamp(),
        device,
        action,
        result,
        log_type,
        user,
    );
}

pub fn append_at(
    state: &FleetState,
    timestamp: i64,
    device: &str,
    action: &str,
    result: &str,
    log_type: LogType,
    user: &str,
) {
    let entry = ActivityLogEntry {
        timestamp,
        device: device.to_string(),
        action: action.to_string(),
        result: result.chars().take(RESULT_MAX_LEN).collect(),
        log_type,
        user: user.to_string(),
    };

    let snapshot: Vec<ActivityLogEntry> = {
        let mut log = state.activity.lock().expect("activity log poisoned");
        log.push_back(entry);
        while log.len() > ACTIVITY_LOG_CAP {
            log.pop_front();
        }
        log.iter().cloned().collect()
    };

    if let Err(err) = store::save_activity_log(&state.paths.activity_log, &snapshot) {
        warn!(error = %err, "failed to persist activity log");
    }
}

/// Newest-first slice of the log, optionally filtered by device and
/// timestamp range.
pub fn query(
    state: &FleetState,
    device: Option<&str>,
    from: Option<i64>,
    to: Option<i64>,
    limit: usize,
) -> Vec<ActivityLogEntry> {
    let log = state.activity.lock().expect("activity log poisoned");
    log.iter()
        .rev()
        .filter(|entry| device.is_none_or(|name| entry.device == name))
        .filter(|entry| from.is_none_or(|start| entry.timestamp >= start))
        .filter(|entry| to.is_none_or(|end| entry.timestamp <= end))
        .take(limit)
        .cloned()
        .collect()
}
