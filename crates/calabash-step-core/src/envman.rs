//! Result export to the CI system through `envman`.

use std::fmt;

use tracing::warn;

use crate::command::{CommandError, CommandRunner, CommandSpec};

/// Environment key later steps read to learn how the test run went.
pub const TEST_RESULT_KEY: &str = "BITRISE_XAMARIN_TEST_RESULT";

/// Overall outcome of the step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestResult {
    Succeeded,
    Failed,
}

impl TestResult {
    pub fn as_str(self) -> &'static str {
        match self {
            TestResult::Succeeded => "succeeded",
            TestResult::Failed => "failed",
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `envman add --key <key>` with the value on stdin.
pub fn export_command(key: &str, value: &str) -> CommandSpec {
    CommandSpec::new("envman")
        .args(&["add", "--key", key])
        .stdin(value)
}

pub fn export_env(runner: &dyn CommandRunner, key: &str, value: &str) -> Result<(), CommandError> {
    runner.output(&export_command(key, value)).map(|_| ())
}

/// Exports the test result. Failing to export is logged, never fatal.
pub fn export_test_result(runner: &dyn CommandRunner, result: TestResult) {
    if let Err(e) = export_env(runner, TEST_RESULT_KEY, result.as_str()) {
        warn!("Failed to export environment: {}, error: {}", TEST_RESULT_KEY, e);
    }
}
