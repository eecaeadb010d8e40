//! Step inputs.
//!
//! The CI system hands inputs to the step as environment variables. The
//! binary reads them once into a [`StepConfig`]; nothing mutates it
//! afterwards except [`crate::app`], which may swap in a rebuilt app path.
//!
//! # Example
//!
//! ```
//! use calabash_step_core::config::StepConfig;
//!
//! let config = StepConfig {
//!     work_dir: ".".into(),
//!     simulator_device: "iPhone 15".into(),
//!     simulator_os_version: "latest".into(),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! assert!(config.wants_latest_os());
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

/// Requesting this OS version selects the newest runtime that has the device.
pub const LATEST_OS_VERSION: &str = "latest";

/// Input validation failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no {0} parameter specified")]
    Missing(&'static str),

    #[error("{name} directory not exists at: {path}")]
    DirNotFound { name: &'static str, path: PathBuf },

    #[error("failed to check if {name} exist, error: {source}")]
    Io {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to split additional options ({options}), error: {source}")]
    Options {
        options: String,
        #[source]
        source: shell_words::ParseError,
    },

    #[error("failed to expand path ({0}): no home directory")]
    NoHomeDir(String),
}

/// Flat step configuration. Empty strings mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepConfig {
    pub work_dir: String,
    pub gemfile_path: String,
    pub app_path: String,
    pub additional_options: String,
    pub simulator_device: String,
    pub simulator_os_version: String,
    pub calabash_cucumber_version: String,
}

impl StepConfig {
    /// Logs every input, one per line.
    pub fn log_summary(&self) {
        info!("Configs:");
        info!("- WorkDir: {}", self.work_dir);
        info!("- GemFilePath: {}", self.gemfile_path);
        info!("- AppPath: {}", self.app_path);
        info!("- Options: {}", self.additional_options);
        info!("- SimulatorDevice: {}", self.simulator_device);
        info!("- SimulatorOsVersion: {}", self.simulator_os_version);
        info!("- CalabashCucumberVersion: {}", self.calabash_cucumber_version);
    }

    /// Checks the inputs, stopping at the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.work_dir.is_empty() {
            return Err(ConfigError::Missing("work_dir"));
        }
        ensure_dir("work_dir", Path::new(&self.work_dir))?;

        if !self.app_path.is_empty() {
            ensure_dir("app_path", Path::new(&self.app_path))?;
        }

        if self.simulator_device.is_empty() {
            return Err(ConfigError::Missing("simulator_device"));
        }
        if self.simulator_os_version.is_empty() {
            return Err(ConfigError::Missing("simulator_os_version"));
        }
        Ok(())
    }

    /// Splits `additional_options` using POSIX shell quoting.
    pub fn split_options(&self) -> Result<Vec<String>, ConfigError> {
        shell_words::split(&self.additional_options).map_err(|source| ConfigError::Options {
            options: self.additional_options.clone(),
            source,
        })
    }

    pub fn wants_latest_os(&self) -> bool {
        self.simulator_os_version == LATEST_OS_VERSION
    }

    pub fn app_path(&self) -> Option<&Path> {
        non_empty(&self.app_path).map(Path::new)
    }

    pub fn gemfile_path(&self) -> Option<&str> {
        non_empty(&self.gemfile_path)
    }

    pub fn calabash_cucumber_version(&self) -> Option<&str> {
        non_empty(&self.calabash_cucumber_version)
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn ensure_dir(name: &'static str, path: &Path) -> Result<(), ConfigError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(ConfigError::DirNotFound {
            name,
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::DirNotFound {
            name,
            path: path.to_path_buf(),
        }),
        Err(source) => Err(ConfigError::Io { name, source }),
    }
}

/// Expands a leading `~` and makes the path absolute against the current
/// directory.
pub fn absolute_path(path: &str) -> Result<PathBuf, ConfigError> {
    let expanded = if path == "~" {
        dirs::home_dir().ok_or_else(|| ConfigError::NoHomeDir(path.to_string()))?
    } else if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .ok_or_else(|| ConfigError::NoHomeDir(path.to_string()))?
            .join(rest)
    } else {
        PathBuf::from(path)
    };

    if expanded.is_absolute() {
        return Ok(expanded);
    }
    let cwd = std::env::current_dir().map_err(|source| ConfigError::Io {
        name: "current directory",
        source,
    })?;
    Ok(cwd.join(expanded))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config(work_dir: &Path) -> StepConfig {
        StepConfig {
            work_dir: work_dir.display().to_string(),
            simulator_device: "iPhone 15".to_string(),
            simulator_os_version: "iOS 17.0".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(valid_config(dir.path()).validate().is_ok());
    }

    #[test]
    fn test_validate_missing_work_dir() {
        let config = StepConfig::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("work_dir")));
        assert_eq!(err.to_string(), "no work_dir parameter specified");
    }

    #[test]
    fn test_validate_work_dir_not_found() {
        let config = StepConfig {
            work_dir: "/path/that/does/not/exist".to_string(),
            ..Default::default()
        };
        match config.validate() {
            Err(ConfigError::DirNotFound { name, .. }) => assert_eq!(name, "work_dir"),
            other => panic!("Expected DirNotFound, got: {:?}", other),
        }
    }

    #[test]
    fn test_validate_work_dir_is_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("features.txt");
        std::fs::write(&file, "").unwrap();

        let config = valid_config(&file);
        assert!(matches!(config.validate(), Err(ConfigError::DirNotFound { .. })));
    }

    #[test]
    fn test_validate_app_path_checked_only_when_set() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = valid_config(dir.path());
        config.app_path = dir.path().join("Missing.app").display().to_string();

        match config.validate() {
            Err(ConfigError::DirNotFound { name, .. }) => assert_eq!(name, "app_path"),
            other => panic!("Expected DirNotFound, got: {:?}", other),
        }
    }

    #[test]
    fn test_validate_missing_device_then_os() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = valid_config(dir.path());
        config.simulator_device.clear();
        config.simulator_os_version.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Missing("simulator_device"))));

        config.simulator_device = "iPad Air".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Missing("simulator_os_version"))));
    }

    #[test]
    fn test_split_options() {
        let config = StepConfig {
            additional_options: r#"--format html --out "report dir/index.html" -t @smoke"#
                .to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.split_options().unwrap(),
            vec!["--format", "html", "--out", "report dir/index.html", "-t", "@smoke"]
        );
    }

    #[test]
    fn test_split_options_empty() {
        assert!(StepConfig::default().split_options().unwrap().is_empty());
    }

    #[test]
    fn test_split_options_unbalanced_quote() {
        let config = StepConfig {
            additional_options: "--tags 'smoke".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.split_options(), Err(ConfigError::Options { .. })));
    }

    #[test]
    fn test_optional_accessors() {
        let config = StepConfig {
            calabash_cucumber_version: "0.19.1".to_string(),
            simulator_os_version: "latest".to_string(),
            ..Default::default()
        };
        assert_eq!(config.calabash_cucumber_version(), Some("0.19.1"));
        assert_eq!(config.gemfile_path(), None);
        assert_eq!(config.app_path(), None);
        assert!(config.wants_latest_os());
    }

    #[test]
    fn test_absolute_path_keeps_absolute() {
        assert_eq!(absolute_path("/tmp/Gemfile").unwrap(), PathBuf::from("/tmp/Gemfile"));
    }

    #[test]
    fn test_absolute_path_relative_joins_cwd() {
        let path = absolute_path("features").unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("features"));
    }

    #[test]
    fn test_absolute_path_expands_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(absolute_path("~/Gemfile").unwrap(), home.join("Gemfile"));
        }
    }
}
