use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::app::activity;
use crate::app::error::CommandOutcome;
use crate::app::models::LogType;
use crate::app::notify::Notifier;
use crate::app::router::{self, AppCommand};
use crate::app::state::FleetState;
use crate::app::store;
use crate::app::transport::runner::ProcessRunner;

pub const TICK_INTERVAL: Duration = Duration::from_secs(60);

/// One scheduler pass. Every enabled device whose interval has elapsed gets
/// an unconditional stop → wait → start cycle; the restart does not care what
/// state the app was observed in. `now` and `sleep` are injected so tests can
/// drive simulated clocks.
pub fn tick(
    state: &FleetState,
    runner: &dyn ProcessRunner,
    notifier: &dyn Notifier,
    now: i64,
    sleep: &dyn Fn(Duration),
) {
    let due: Vec<(String, u64)> = {
        let configs = state
            .auto_restart
            .lock()
            .expect("auto-restart config poisoned");
        configs
            .iter()
            .filter(|(_, config)| config.enabled && config.interval_hours > 0.0)
            .filter(|(_, config)| {
                now - config.last_run >= (config.interval_hours * 3600.0) as i64
            })
            .map(|(name, config)| (name.clone(), config.delay_seconds))
            .collect()
    };

    for (name, delay_seconds) in due {
        let trace_id = Uuid::new_v4().to_string();
        info!(device = %name, trace_id = %trace_id, "auto-restart cycle starting");

        let stop = router::dispatch(&state.devices, runner, &name, AppCommand::Stop, &trace_id);
        sleep(Duration::from_secs(delay_seconds));
        let start = router::dispatch(&state.devices, runner, &name, AppCommand::Start, &trace_id);

        // The attempt advances last_run even when stop or start failed; a
        // broken device must wait out its interval, not retry every tick.
        let snapshot = {
            let mut configs = state
                .auto_restart
                .lock()
                .expect("auto-restart config poisoned");
            if let Some(config) = configs.get_mut(&name) {
                config.last_run = now;
            }
            configs.clone()
        };
        if let Err(err) = store::save_auto_restart(&state.paths.auto_restart, &snapshot) {
            warn!(device = %name, error = %err, "failed to persist auto-restart settings");
        }

        let result = format!("Stop: {}\n\nStart: {}", stop.output, start.output);
        activity::append_at(
            state,
            now,
            &name,
            "restart",
            &result,
            LogType::Auto,
            "scheduler",
        );
        notifier.notify(&format!(
            "Auto-restart completed for '{name}' (stop {}, start {})",
            outcome_word(&stop),
            outcome_word(&start)
        ));
    }
}

fn outcome_word(outcome: &CommandOutcome) -> &'static str {
    if outcome.success {
        "ok"
    } else {
        "failed"
    }
}
