use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{Local, Utc};
use uuid::Uuid;

use crate::app::notify::Notifier;
use crate::app::state::FleetState;
use crate::app::transport::runner::ProcessRunner;
use crate::app::{alerts, autorestart, health, schedule};

/// Stoppable background loop. Dropping the handle detaches the thread; the
/// daemon keeps the handles alive for its whole life.
pub struct LoopHandle {
    stop_flag: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl LoopHandle {
    pub fn stop(self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        let _ = self.join.join();
    }
}

fn spawn_loop<I, B>(interval: I, mut body: B) -> LoopHandle
where
    I: Fn() -> Duration + Send + 'static,
    B: FnMut() + Send + 'static,
{
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_thread = Arc::clone(&stop_flag);
    let join = thread::spawn(move || loop {
        if stop_thread.load(Ordering::Relaxed) {
            return;
        }
        body();
        sleep_with_stop(&stop_thread, interval());
    });
    LoopHandle { stop_flag, join }
}

// Sleep in short slices so stop() is honored promptly.
fn sleep_with_stop(stop_flag: &AtomicBool, total: Duration) {
    let mut remaining = total;
    while remaining > Duration::ZERO {
        if stop_flag.load(Ordering::Relaxed) {
            return;
        }
        let step = remaining.min(Duration::from_millis(200));
        thread::sleep(step);
        remaining -= step;
    }
}

/// Probe every registered device, then run the alert sweep. The cadence
/// re-reads the runtime-mutable alert settings each cycle.
pub fn spawn_health_loop(
    state: Arc<FleetState>,
    runner: Arc<dyn ProcessRunner>,
    notifier: Arc<dyn Notifier>,
) -> LoopHandle {
    let interval_state = Arc::clone(&state);
    spawn_loop(
        move || {
            let settings = *interval_state.alerts.lock().expect("alert settings poisoned");
            Duration::from_secs(settings.check_interval.max(1))
        },
        move || {
            let names: Vec<String> = state
                .devices
                .lock()
                .expect("device registry poisoned")
                .keys()
                .cloned()
                .collect();
            for name in names {
                let trace_id = Uuid::new_v4().to_string();
                health::probe(&state.devices, runner.as_ref(), &state.health, &name, &trace_id);
            }
            let settings = *state.alerts.lock().expect("alert settings poisoned");
            let snapshot = state.health.lock().expect("health map poisoned").clone();
            alerts::check_alerts(
                &snapshot,
                &settings,
                notifier.as_ref(),
                Utc::now().timestamp(),
            );
        },
    )
}

pub fn spawn_auto_restart_loop(
    state: Arc<FleetState>,
    runner: Arc<dyn ProcessRunner>,
    notifier: Arc<dyn Notifier>,
) -> LoopHandle {
    spawn_loop(
        || autorestart::TICK_INTERVAL,
        move || {
            autorestart::tick(
                state.as_ref(),
                runner.as_ref(),
                notifier.as_ref(),
                Utc::now().timestamp(),
                &|duration| thread::sleep(duration),
            );
        },
    )
}

pub fn spawn_calendar_loop(
    state: Arc<FleetState>,
    runner: Arc<dyn ProcessRunner>,
    notifier: Arc<dyn Notifier>,
) -> LoopHandle {
    // Fired-task memory lives only for the life of the loop.
    let mut fired: HashMap<String, i64> = HashMap::new();
    spawn_loop(
        || schedule::TICK_INTERVAL,
        move || {
            schedule::tick(
                state.as_ref(),
                runner.as_ref(),
                notifier.as_ref(),
                &mut fired,
                Local::now().naive_local(),
                &|duration| thread::sleep(duration),
            );
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::Device;
    use crate::app::store::StorePaths;
    use crate::app::testkit::{CollectingNotifier, FakeRunner};

    #[test]
    fn health_loop_probes_registered_devices_and_stops() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = Arc::new(FleetState::empty(StorePaths::in_dir(dir.path())));
        state.devices.lock().expect("devices").insert(
            "Box1".to_string(),
            Device::Local {
                path: "/usr/bin".to_string(),
            },
        );
        let runner = Arc::new(FakeRunner::new().responding("echo health_check", "health_check"));
        let notifier = Arc::new(CollectingNotifier::new());

        let handle = spawn_health_loop(
            Arc::clone(&state),
            Arc::clone(&runner) as Arc<dyn ProcessRunner>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
        );
        // First pass runs before the first sleep.
        thread::sleep(Duration::from_millis(200));
        handle.stop();

        assert!(!runner.calls().is_empty());
        let guard = state.health.lock().expect("health");
        assert!(guard.contains_key("Box1"));
    }

    #[test]
    fn stop_joins_promptly() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = Arc::new(FleetState::empty(StorePaths::in_dir(dir.path())));
        let runner = Arc::new(FakeRunner::new());
        let notifier = Arc::new(CollectingNotifier::new());
        let handle = spawn_auto_restart_loop(
            state,
            runner as Arc<dyn ProcessRunner>,
            notifier as Arc<dyn Notifier>,
        );
        let started = std::time::Instant::now();
        handle.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
