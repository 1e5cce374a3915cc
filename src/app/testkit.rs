use std::sync::Mutex;
use std::time::Duration;

use crate::app::error::AppError;
use crate::app::notify::Notifier;
use crate::app::transport::runner::{CommandOutput, ProcessRunner};

enum Scripted {
    Output { stdout: String, exit_code: i32 },
    Error(String),
}

struct Rule {
    needle: String,
    response: Scripted,
}

/// Scripted process runner: rules match on a substring of the rendered
/// command line, first match wins, anything unmatched succeeds silently.
pub struct FakeRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn responding(self, needle: &str, stdout: &str) -> Self {
        self.push(needle, Scripted::Output {
            stdout: stdout.to_string(),
            exit_code: 0,
        });
        self
    }

    pub fn failing(self, needle: &str, stdout: &str, exit_code: i32) -> Self {
        self.push(needle, Scripted::Output {
            stdout: stdout.to_string(),
            exit_code,
        });
        self
    }

    pub fn erroring(self, needle: &str, message: &str) -> Self {
        self.push(needle, Scripted::Error(message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls poisoned").clone()
    }

    fn push(&self, needle: &str, response: Scripted) {
        self.rules.lock().expect("rules poisoned").push(Rule {
            needle: needle.to_string(),
            response,
        });
    }
}

impl ProcessRunner for FakeRunner {
    fn run(
        &self,
        program: &str,
        args: &[String],
        _timeout: Duration,
        trace_id: &str,
    ) -> Result<CommandOutput, AppError> {
        let line = if args.is_empty() {
            program.to_string()
        } else {
            format!("{program} {}", args.join(" "))
        };
        self.calls.lock().expect("calls poisoned").push(line.clone());

        let rules = self.rules.lock().expect("rules poisoned");
        for rule in rules.iter() {
            if line.contains(&rule.needle) {
                return match &rule.response {
                    Scripted::Output { stdout, exit_code } => Ok(CommandOutput {
                        stdout: stdout.clone(),
                        stderr: String::new(),
                        exit_code: Some(*exit_code),
                    }),
                    Scripted::Error(message) => {
                        Err(AppError::transport(message.clone(), trace_id))
                    }
                };
            }
        }
        Ok(CommandOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: Some(0),
        })
    }
}

/// Notifier that records every message for assertions.
pub struct CollectingNotifier {
    messages: Mutex<Vec<String>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("messages poisoned").clone()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, message: &str) {
        self.messages
            .lock()
            .expect("messages poisoned")
            .push(message.to_string());
    }
}
