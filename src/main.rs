use std::sync::Arc;
use std::thread;

use tracing::info;

use earnfleet::app::logging::init_logging;
use earnfleet::app::notify::{LogNotifier, Notifier};
use earnfleet::app::state::FleetState;
use earnfleet::app::store::StorePaths;
use earnfleet::app::transport::runner::{ProcessRunner, SystemRunner};
use earnfleet::app::workers;

fn main() {
    init_logging();

    let paths = StorePaths::resolve();
    let state = Arc::new(FleetState::load(paths));
    let device_count = state
        .devices
        .lock()
        .expect("device registry poisoned")
        .len();
    info!(devices = device_count, "earnfleet starting");

    let runner: Arc<dyn ProcessRunner> = Arc::new(SystemRunner);
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

    let _health = workers::spawn_health_loop(
        Arc::clone(&state),
        Arc::clone(&runner),
        Arc::clone(&notifier),
    );
    let _auto_restart = workers::spawn_auto_restart_loop(
        Arc::clone(&state),
        Arc::clone(&runner),
        Arc::clone(&notifier),
    );
    let _calendar = workers::spawn_calendar_loop(
        Arc::clone(&state),
        Arc::clone(&runner),
        Arc::clone(&notifier),
    );

    info!("background loops running");
    // The daemon-supervisor model owns the lifecycle: termination aborts the
    // loops, state is reloaded from disk on the next start.
    loop {
        thread::park();
    }
}
