use std::time::Duration;

use crate::app::error::{AppError, CommandOutcome};
use crate::app::transport::outcome_from;
use crate::app::transport::runner::ProcessRunner;

pub const SSH_TIMEOUT: Duration = Duration::from_secs(20);

/// One connection per invocation, no pooling. Host keys are auto-trusted and
/// the registry's password travels via sshpass; existing fleets depend on
/// both behaviors.
pub fn run_ssh(
    runner: &dyn ProcessRunner,
    host: &str,
    port: u16,
    user: &str,
    password: &str,
    command: &str,
    trace_id: &str,
) -> Result<CommandOutcome, AppError> {
    let args = ssh_args(host, port, user, password, command);
    let output = runner
        .run("sshpass", &args, SSH_TIMEOUT, trace_id)
        .map_err(|err| {
            AppError::new(err.code, format!("SSH error: {}", err.error), trace_id)
        })?;
    Ok(outcome_from(output))
}

fn ssh_args(host: &str, port: u16, user: &str, password: &str, command: &str) -> Vec<String> {
    vec![
        "-p".to_string(),
        password.to_string(),
        "ssh".to_string(),
        "-p".to_string(),
        port.to_string(),
        "-o".to_string(),
        "StrictHostKeyChecking=no".to_string(),
        "-o".to_string(),
        "UserKnownHostsFile=/dev/null".to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={}", SSH_TIMEOUT.as_secs()),
        format!("{user}@{host}"),
        command.to_string(),
    ]
}
