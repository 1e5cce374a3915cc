use std::time::Duration;

use crate::app::error::{AppError, CommandOutcome};
use crate::app::transport::outcome_from;
use crate::app::transport::runner::ProcessRunner;

pub const ADB_TIMEOUT: Duration = Duration::from_secs(20);

/// Run a command on a wireless-debugging device. `adb connect` is issued
/// before every command (idempotent when already connected); commands are
/// wrapped in `shell` unless the caller already supplied the prefix.
pub fn run_adb(
    runner: &dyn ProcessRunner,
    host: &str,
    port: u16,
    command: &str,
    trace_id: &str,
) -> Result<CommandOutcome, AppError> {
    let serial = format!("{host}:{port}");
    // Connection errors surface on the command itself, so this result is
    // intentionally ignored.
    let _ = runner.run(
        "adb",
        &["connect".to_string(), serial.clone()],
        ADB_TIMEOUT,
        trace_id,
    );

    let args = adb_args(&serial, command);
    let output = runner
        .run("adb", &args, ADB_TIMEOUT, trace_id)
        .map_err(|err| {
            AppError::new(err.code, format!("ADB error: {}", err.error), trace_id)
        })?;
    Ok(outcome_from(output))
}

fn adb_args(serial: &str, command: &str) -> Vec<String> {
    let mut args = vec!["-s".to_string(), serial.to_string()];
    match command.strip_prefix("shell ") {
        Some(rest) => {
            args.push("shell".to_string());
            args.push(rest.to_string());
        }
        None => {
            args.push("shell".to_string());
            args.push(command.to_string());
        }
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_plain_commands_in_shell() {
        let args = adb_args("10.0.0.9:5555", "pidof com.brd.earnrewards");
        assert_eq!(
            args,
            vec![
                "-s".to_string(),
                "10.0.0.9:5555".to_string(),
                "shell".to_string(),
                "pidof com.brd.earnrewards".to_string(),
            ]
        );
    }

    #[test]
    fn keeps_caller_supplied_shell_prefix() {
        let args = adb_args("10.0.0.9:5555", "shell getprop ro.build.version.release");
        assert_eq!(args[2], "shell");
        assert_eq!(args[3], "getprop ro.build.version.release");
    }
}
