//! How `calabash-cucumber` gets installed and how `cucumber` is invoked.
//!
//! An explicitly configured gem version always wins. Otherwise a Gemfile with
//! a `Gemfile.lock` next to it switches everything to Bundler, and failing
//! that the latest published gem is installed.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::command::{CommandRunner, CommandSpec};
use crate::config::{absolute_path, StepConfig};
use crate::error::StepError;
use crate::gemfile::{
    calabash_cucumber_version_from_lock_file, file_exists, lockfile_for, CALABASH_CUCUMBER_GEM,
};
use crate::ruby::{self, RubyInstallType};

/// Where the `calabash-cucumber` gem comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GemStrategy {
    /// A specific version installed with `gem install`.
    Pinned(String),
    /// Whatever the Gemfile locks, through `bundle install` / `bundle exec`.
    Bundler { gemfile: PathBuf },
    /// The newest published version.
    Latest,
}

impl GemStrategy {
    /// Picks the strategy for `config`, logging what the lockfile pins.
    pub fn resolve(config: &StepConfig) -> Result<Self, StepError> {
        let bundler_gemfile = match config.gemfile_path() {
            Some(path) => locked_gemfile(&absolute_path(path)?)?,
            None => None,
        };

        let strategy = if let Some(version) = config.calabash_cucumber_version() {
            info!("using calabash-cucumber version: {}", version);
            GemStrategy::Pinned(version.to_string())
        } else if let Some(gemfile) = bundler_gemfile {
            info!("using calabash-cucumber with bundler");
            GemStrategy::Bundler { gemfile }
        } else {
            info!("using calabash-cucumber latest version");
            GemStrategy::Latest
        };
        Ok(strategy)
    }
}

/// Returns the Gemfile when both it and its lockfile exist.
fn locked_gemfile(gemfile: &Path) -> Result<Option<PathBuf>, StepError> {
    if !file_exists(gemfile)? {
        warn!("Gemfile not found at: {}", gemfile.display());
        return Ok(None);
    }
    info!("Gemfile exists at: {}", gemfile.display());

    let lockfile = lockfile_for(gemfile);
    if !file_exists(&lockfile)? {
        warn!("Gemfile.lock not found at: {}", lockfile.display());
        return Ok(None);
    }
    info!("Gemfile.lock exists at: {}", lockfile.display());

    let version = calabash_cucumber_version_from_lock_file(&lockfile)?;
    info!(
        "calabash-cucumber version in Gemfile.lock: {}",
        version.as_deref().unwrap_or("")
    );
    Ok(Some(gemfile.to_path_buf()))
}

fn run_logged(runner: &dyn CommandRunner, cmd: &CommandSpec) -> Result<(), StepError> {
    info!("$ {}", cmd.printable());
    runner.run(cmd).map_err(StepError::Install)
}

/// Makes `calabash-cucumber` available according to `strategy`.
pub fn install(
    runner: &dyn CommandRunner,
    install_type: RubyInstallType,
    strategy: &GemStrategy,
) -> Result<(), StepError> {
    match strategy {
        GemStrategy::Pinned(version) => {
            let installed =
                ruby::is_gem_installed(runner, install_type, CALABASH_CUCUMBER_GEM, version)
                    .map_err(StepError::Install)?;
            if installed {
                info!("calabash-cucumber {} installed", version);
                return Ok(());
            }
            let commands = ruby::gem_install_commands(
                install_type,
                CALABASH_CUCUMBER_GEM,
                Some(version.as_str()),
            )
            .map_err(StepError::Install)?;
            for cmd in commands {
                run_logged(runner, &cmd)?;
            }
        }
        GemStrategy::Bundler { gemfile } => {
            let cmd = ruby::bundle_install_command(install_type, gemfile)
                .map_err(StepError::Install)?;
            run_logged(runner, &cmd)?;
        }
        GemStrategy::Latest => {
            for cmd in ruby::gem_install_commands(install_type, CALABASH_CUCUMBER_GEM, None)
                .map_err(StepError::Install)?
            {
                run_logged(runner, &cmd)?;
            }
        }
    }
    Ok(())
}

/// Everything the test run is parameterized by.
#[derive(Debug, Clone)]
pub struct CucumberRun<'a> {
    pub strategy: &'a GemStrategy,
    pub device_udid: &'a str,
    pub app: Option<&'a Path>,
    pub options: &'a [String],
    pub work_dir: &'a Path,
}

/// Builds the `cucumber` invocation: the simulator goes in `DEVICE_TARGET`,
/// the app (if any) in `APP`.
pub fn cucumber_command(
    install_type: RubyInstallType,
    run: &CucumberRun<'_>,
) -> Result<CommandSpec, StepError> {
    let mut argv: Vec<String> = Vec::new();
    let mut envs = vec![("DEVICE_TARGET".to_string(), run.device_udid.to_string())];
    if let Some(app) = run.app {
        envs.push(("APP".to_string(), app.display().to_string()));
    }

    match run.strategy {
        GemStrategy::Pinned(version) => {
            argv.push("cucumber".to_string());
            argv.push(format!("_{}_", version));
        }
        GemStrategy::Bundler { gemfile } => {
            argv.extend(["bundle", "exec", "cucumber"].map(String::from));
            envs.push(("BUNDLE_GEMFILE".to_string(), gemfile.display().to_string()));
        }
        GemStrategy::Latest => argv.push("cucumber".to_string()),
    }
    argv.extend(run.options.iter().cloned());

    let cmd = envs.into_iter().fold(
        ruby::ruby_command(install_type, argv.as_slice()).map_err(StepError::Cucumber)?,
        |cmd, (key, value)| cmd.env(key, value),
    );
    Ok(cmd.current_dir(run.work_dir))
}
