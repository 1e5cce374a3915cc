pub mod adb;
pub mod local;
pub mod runner;
pub mod ssh;

use crate::app::error::CommandOutcome;
use runner::CommandOutput;

/// Collapse raw process output into the outcome contract shared by every
/// transport: combined text, "(no output)" when silent, success from the
/// exit code.
pub(crate) fn outcome_from(output: CommandOutput) -> CommandOutcome {
    let text = output.combined();
    CommandOutcome {
        success: output.succeeded(),
        output: if text.is_empty() {
            "(no output)".to_string()
        } else {
            text
        },
    }
}
