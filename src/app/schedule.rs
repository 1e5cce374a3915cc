use std::collections::HashMap;
use std::time::Duration;

use chrono::{Datelike, NaiveDateTime, Timelike};
use tracing::info;
use uuid::Uuid;

use crate::app::activity;
use crate::app::models::{LogType, ScheduledTask, TaskAction};
use crate::app::notify::Notifier;
use crate::app::router::{self, AppCommand};
use crate::app::state::FleetState;
use crate::app::transport::runner::ProcessRunner;

pub const TICK_INTERVAL: Duration = Duration::from_secs(30);
pub const RESTART_DELAY: Duration = Duration::from_secs(5);

// The loop wakes twice a minute, so the same wall-clock minute is seen more
// than once; firings within this window are suppressed. The map lives only in
// memory, which means a process restart on the exact target minute can
// double-fire — accepted.
const REFIRE_SUPPRESS_SECS: i64 = 60;

pub fn parse_time_of_day(value: &str) -> Result<(u32, u32), String> {
    let invalid = || format!("Invalid time '{value}', expected HH:MM (24h)");
    let (hour, minute) = value.trim().split_once(':').ok_or_else(invalid)?;
    let hour: u32 = hour.parse().map_err(|_| invalid())?;
    let minute: u32 = minute.parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok((hour, minute))
}

fn matches_minute(task: &ScheduledTask, now: NaiveDateTime) -> bool {
    let Ok((hour, minute)) = parse_time_of_day(&task.time) else {
        return false;
    };
    now.hour() == hour
        && now.minute() == minute
        && task
            .days
            .contains(&(now.weekday().num_days_from_monday() as u8))
}

/// One calendar pass against the local wall clock. A task fires on an exact
/// hour:minute match on an enabled weekday; missed minutes are skipped, never
/// replayed.
pub fn tick(
    state: &FleetState,
    runner: &dyn ProcessRunner,
    notifier: &dyn Notifier,
    fired: &mut HashMap<String, i64>,
    now: NaiveDateTime,
    sleep: &dyn Fn(Duration),
) {
    let now_epoch = now.and_utc().timestamp();
    let due: Vec<(String, ScheduledTask)> = {
        let schedules = state.schedules.lock().expect("schedules poisoned");
        schedules
            .iter()
            .filter(|(_, task)| task.enabled && matches_minute(task, now))
            .filter(|(id, _)| {
                fired
                    .get(*id)
                    .map_or(true, |last| now_epoch - last >= REFIRE_SUPPRESS_SECS)
            })
            .map(|(id, task)| (id.clone(), task.clone()))
            .collect()
    };

    for (id, task) in due {
        fired.insert(id.clone(), now_epoch);
        let trace_id = Uuid::new_v4().to_string();
        info!(
            task = %id,
            device = %task.device,
            action = %task.action.as_str(),
            trace_id = %trace_id,
            "scheduled task firing"
        );

        let result = match task.action {
            TaskAction::Start => {
                router::dispatch(&state.devices, runner, &task.device, AppCommand::Start, &trace_id)
                    .output
            }
            TaskAction::Stop => {
                router::dispatch(&state.devices, runner, &task.device, AppCommand::Stop, &trace_id)
                    .output
            }
            TaskAction::Restart => {
                let stop = router::dispatch(
                    &state.devices,
                    runner,
                    &task.device,
                    AppCommand::Stop,
                    &trace_id,
                );
                sleep(RESTART_DELAY);
                let start = router::dispatch(
                    &state.devices,
                    runner,
                    &task.device,
                    AppCommand::Start,
                    &trace_id,
                );
                format!("Stop: {}\n\nStart: {}", stop.output, start.output)
            }
        };

        activity::append_at(
            state,
            now_epoch,
            &task.device,
            task.action.as_str(),
            &result,
            LogType::Scheduled,
            "scheduler",
        );
        notifier.notify(&format!(
            "Scheduled {} executed for '{}'",
            task.action.as_str(),
            task.device
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::Device;
    use crate::app::store::StorePaths;
    use crate::app::testkit::{CollectingNotifier, FakeRunner};
    use chrono::NaiveDate;

    fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .expect("date")
            .and_hms_opt(hour, minute, second)
            .expect("time")
    }

    fn weekday_task(action: TaskAction) -> ScheduledTask {
        ScheduledTask {
            device: "Pi1".to_string(),
            action,
            time: "08:00".to_string(),
            days: vec![0, 1, 2, 3, 4],
            enabled: true,
            timezone: "UTC".to_string(),
        }
    }

    fn state_with_task(task: ScheduledTask) -> (tempfile::TempDir, FleetState) {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = FleetState::empty(StorePaths::in_dir(dir.path()));
        state.devices.lock().expect("devices").insert(
            "Pi1".to_string(),
            Device::Local {
                path: "/usr/bin".to_string(),
            },
        );
        state
            .schedules
            .lock()
            .expect("schedules")
            .insert(task.task_id(), task);
        (dir, state)
    }

    #[test]
    fn parses_and_rejects_times() {
        assert_eq!(parse_time_of_day("08:00"), Ok((8, 0)));
        assert_eq!(parse_time_of_day("23:59"), Ok((23, 59)));
        assert!(parse_time_of_day("24:00").is_err());
        assert!(parse_time_of_day("08:60").is_err());
        assert!(parse_time_of_day("0800").is_err());
        assert!(parse_time_of_day("eight").is_err());
    }

    #[test]
    fn fires_once_on_a_matching_monday_minute() {
        let (_dir, state) = state_with_task(weekday_task(TaskAction::Start));
        let runner = FakeRunner::new();
        let notifier = CollectingNotifier::new();
        let mut fired = HashMap::new();

        // 2024-01-01 is a Monday. Two loop passes land in the same minute.
        tick(&state, &runner, &notifier, &mut fired, at(2024, 1, 1, 8, 0, 0), &|_| {});
        tick(&state, &runner, &notifier, &mut fired, at(2024, 1, 1, 8, 0, 30), &|_| {});

        assert_eq!(state.activity.lock().expect("log").len(), 1);
        assert_eq!(notifier.messages().len(), 1);

        // The next minute no longer matches.
        tick(&state, &runner, &notifier, &mut fired, at(2024, 1, 1, 8, 1, 0), &|_| {});
        assert_eq!(state.activity.lock().expect("log").len(), 1);
    }

    #[test]
    fn refires_on_the_next_enabled_day() {
        let (_dir, state) = state_with_task(weekday_task(TaskAction::Start));
        let runner = FakeRunner::new();
        let notifier = CollectingNotifier::new();
        let mut fired = HashMap::new();

        tick(&state, &runner, &notifier, &mut fired, at(2024, 1, 1, 8, 0, 0), &|_| {});
        tick(&state, &runner, &notifier, &mut fired, at(2024, 1, 2, 8, 0, 0), &|_| {});
        assert_eq!(state.activity.lock().expect("log").len(), 2);
    }

    #[test]
    fn skips_weekends() {
        let (_dir, state) = state_with_task(weekday_task(TaskAction::Start));
        let runner = FakeRunner::new();
        let notifier = CollectingNotifier::new();
        let mut fired = HashMap::new();

        // 2024-01-06 Saturday, 2024-01-07 Sunday.
        tick(&state, &runner, &notifier, &mut fired, at(2024, 1, 6, 8, 0, 0), &|_| {});
        tick(&state, &runner, &notifier, &mut fired, at(2024, 1, 7, 8, 0, 0), &|_| {});
        assert!(state.activity.lock().expect("log").is_empty());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn disabled_task_never_fires() {
        let mut task = weekday_task(TaskAction::Start);
        task.enabled = false;
        let (_dir, state) = state_with_task(task);
        let runner = FakeRunner::new();
        let notifier = CollectingNotifier::new();
        let mut fired = HashMap::new();
        tick(&state, &runner, &notifier, &mut fired, at(2024, 1, 1, 8, 0, 0), &|_| {});
        assert!(state.activity.lock().expect("log").is_empty());
    }

    #[test]
    fn restart_expands_to_stop_wait_start() {
        let (_dir, state) = state_with_task(weekday_task(TaskAction::Restart));
        let runner = FakeRunner::new();
        let notifier = CollectingNotifier::new();
        let mut fired = HashMap::new();
        let sleeps: std::sync::Mutex<Vec<Duration>> = std::sync::Mutex::new(Vec::new());
        let sleep = |duration: Duration| sleeps.lock().expect("sleeps").push(duration);

        tick(&state, &runner, &notifier, &mut fired, at(2024, 1, 1, 8, 0, 0), &sleep);

        assert_eq!(*sleeps.lock().expect("sleeps"), vec![RESTART_DELAY]);
        let calls = runner.calls();
        let stop_index = calls
            .iter()
            .position(|line| line.contains("earnapp stop"))
            .expect("stop issued");
        let start_index = calls
            .iter()
            .position(|line| line.contains("earnapp start"))
            .expect("start issued");
        assert!(stop_index < start_index);

        let log = state.activity.lock().expect("log");
        let entry = log.front().expect("entry");
        assert_eq!(entry.action, "restart");
        assert_eq!(entry.log_type, LogType::Scheduled);
    }

    #[test]
    fn empty_day_set_never_matches() {
        let mut task = weekday_task(TaskAction::Start);
        task.days = Vec::new();
        let (_dir, state) = state_with_task(task);
        let runner = FakeRunner::new();
        let notifier = CollectingNotifier::new();
        let mut fired = HashMap::new();
        for day in 1..=7 {
            tick(&state, &runner, &notifier, &mut fired, at(2024, 1, day, 8, 0, 0), &|_| {});
        }
        assert!(state.activity.lock().expect("log").is_empty());
    }
}
