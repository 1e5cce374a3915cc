use std::time::Duration;

use crate::app::error::{AppError, CommandOutcome};
use crate::app::transport::outcome_from;
use crate::app::transport::runner::ProcessRunner;

// Generous ceiling: a hung subprocess must not wedge the foreground path
// forever.
pub const LOCAL_TIMEOUT: Duration = Duration::from_secs(120);

/// Run `command` through the local shell with the device's working directory
/// prefixed, mirroring how an operator would invoke the managed CLI by hand.
pub fn run_local(
    runner: &dyn ProcessRunner,
    working_dir: &str,
    command: &str,
    trace_id: &str,
) -> Result<CommandOutcome, AppError> {
    let script = format!("cd {working_dir} && {command}");
    let output = runner
        .run(
            "sh",
            &["-c".to_string(), script],
            LOCAL_TIMEOUT,
            trace_id,
        )
        .map_err(|err| {
            AppError::new(err.code, format!("Local error: {}", err.error), trace_id)
        })?;
    Ok(outcome_from(output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::transport::runner::SystemRunner;

    #[test]
    fn runs_in_the_working_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outcome = run_local(
            &SystemRunner,
            dir.path().to_str().expect("utf8 path"),
            "pwd",
            "trace-local-1",
        )
        .expect("run");
        assert!(outcome.success);
        assert!(outcome.output.contains(dir.path().file_name().unwrap().to_str().unwrap()));
    }

    #[test]
    fn silent_command_reports_placeholder() {
        let outcome = run_local(&SystemRunner, "/", "true", "trace-local-2").expect("run");
        assert!(outcome.success);
        assert_eq!(outcome.output, "(no output)");
    }

    #[test]
    fn failing_command_keeps_its_output() {
        let outcome = run_local(
            &SystemRunner,
            "/",
            "echo broken >&2; exit 1",
            "trace-local-3",
        )
        .expect("run");
        assert!(!outcome.success);
        assert_eq!(outcome.output, "broken");
    }
}
