//! Top-level step error.

use thiserror::Error;

use crate::app::AppError;
use crate::command::CommandError;
use crate::config::ConfigError;
use crate::gemfile::GemfileError;
use crate::simctl::SimctlError;

/// Any failure that stops the step. Every variant ends the run with exit
/// code 1 and a `failed` result export.
#[derive(Error, Debug)]
pub enum StepError {
    #[error("Issue with input: {0}")]
    Input(#[from] ConfigError),

    #[error("Failed to get simulator info, error: {0}")]
    Simulator(#[from] SimctlError),

    #[error("Failed to prepare .app for the simulator, error: {0}")]
    App(#[from] AppError),

    #[error("Failed to get calabash-cucumber version from Gemfile.lock, error: {0}")]
    Gemfile(#[from] GemfileError),

    #[error("Failed to install calabash-cucumber, error: {0}")]
    Install(#[source] CommandError),

    #[error("cucumber failed, error: {0}")]
    Cucumber(#[source] CommandError),
}

impl StepError {
    pub fn exit_code(&self) -> u8 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_error_display() {
        let err = StepError::from(ConfigError::Missing("work_dir"));
        assert_eq!(err.to_string(), "Issue with input: no work_dir parameter specified");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_cucumber_error_display() {
        let err = StepError::Cucumber(CommandError::Failed {
            command: "cucumber".to_string(),
            code: Some(1),
            output: String::new(),
        });
        assert!(err.to_string().starts_with("cucumber failed, error:"));
    }
}
