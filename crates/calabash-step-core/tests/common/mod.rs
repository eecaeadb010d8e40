//! Shared test helpers for calabash-step-core integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::path::Path;

use calabash_step_core::command::{CommandError, CommandRunner, CommandSpec};
use calabash_step_core::config::StepConfig;

pub const SIMCTL_LIST: &str = "xcrun simctl list devices -j";

pub const DEVICE_LIST: &str = r#"{
    "devices": {
        "com.apple.CoreSimulator.SimRuntime.iOS-16-4": [
            {
                "udid": "C3D4E5F6-A7B8-9012-CDEF-123456789012",
                "name": "iPhone 14",
                "state": "Shutdown",
                "isAvailable": true
            }
        ],
        "com.apple.CoreSimulator.SimRuntime.iOS-17-0": [
            {
                "udid": "B2C3D4E5-F6A7-8901-BCDE-F12345678901",
                "name": "iPhone 14",
                "state": "Booted",
                "isAvailable": true
            },
            {
                "udid": "A1B2C3D4-E5F6-7890-ABCD-EF1234567890",
                "name": "iPhone 5",
                "state": "Shutdown",
                "isAvailable": true
            }
        ]
    }
}"#;

/// A [`CommandRunner`] that records every command instead of spawning it.
///
/// Outputs are keyed by the command's printable form; commands whose printable
/// form starts with a registered failure prefix exit with code 1.
#[derive(Default)]
pub struct RecordingRunner {
    calls: RefCell<Vec<CommandSpec>>,
    outputs: Vec<(String, String)>,
    failures: Vec<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default().with_output(SIMCTL_LIST, DEVICE_LIST)
    }

    pub fn with_output(mut self, printable: &str, output: &str) -> Self {
        self.outputs.push((printable.to_string(), output.to_string()));
        self
    }

    pub fn failing(mut self, printable_prefix: &str) -> Self {
        self.failures.push(printable_prefix.to_string());
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.borrow().clone()
    }

    pub fn printed(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.printable()).collect()
    }

    /// The value fed to `envman` for the last result export, if any.
    pub fn exported_result(&self) -> Option<String> {
        self.calls
            .borrow()
            .iter()
            .rev()
            .find(|c| c.program == "envman")
            .and_then(|c| c.stdin.clone())
    }

    fn record(&self, cmd: &CommandSpec) -> Result<String, CommandError> {
        self.calls.borrow_mut().push(cmd.clone());
        let printable = cmd.printable();
        if self.failures.iter().any(|f| printable.starts_with(f.as_str())) {
            return Err(CommandError::Failed {
                command: printable,
                code: Some(1),
                output: "simulated failure".to_string(),
            });
        }
        Ok(self
            .outputs
            .iter()
            .find(|(key, _)| *key == printable)
            .map(|(_, out)| out.clone())
            .unwrap_or_default())
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, cmd: &CommandSpec) -> Result<(), CommandError> {
        self.record(cmd).map(|_| ())
    }

    fn output(&self, cmd: &CommandSpec) -> Result<String, CommandError> {
        self.record(cmd)
    }
}

/// A valid config pointing at `work_dir`, targeting iPhone 14 on iOS 17.0.
pub fn config_for(work_dir: &Path) -> StepConfig {
    StepConfig {
        work_dir: work_dir.display().to_string(),
        simulator_device: "iPhone 14".to_string(),
        simulator_os_version: "iOS 17.0".to_string(),
        ..Default::default()
    }
}
