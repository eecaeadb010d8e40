//! The step itself: validate, resolve the simulator, install the gem, run
//! cucumber, report.

use std::path::PathBuf;

use tracing::{error, info};

use crate::app;
use crate::command::{CommandRunner, CommandSpec};
use crate::config::{absolute_path, StepConfig};
use crate::cucumber::{self, CucumberRun, GemStrategy};
use crate::envman::{self, TestResult};
use crate::error::StepError;
use crate::ruby::RubyInstallType;
use crate::simctl::{Simctl, SimulatorInfo, DEFAULT_PLATFORM};

/// What a successful run resolved and executed.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub simulator: SimulatorInfo,
    pub strategy: GemStrategy,
    pub app_path: Option<PathBuf>,
    pub cucumber: CommandSpec,
}

/// Runs the step against a [`CommandRunner`].
pub struct Step<'a> {
    runner: &'a dyn CommandRunner,
    ruby: RubyInstallType,
    scratch_dir: Option<PathBuf>,
}

impl<'a> Step<'a> {
    pub fn new(runner: &'a dyn CommandRunner, ruby: RubyInstallType) -> Self {
        Self {
            runner,
            ruby,
            scratch_dir: None,
        }
    }

    /// Rebuilt fat apps go under `dir` instead of a fresh temp directory.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Runs the step and exports the test result, whatever the outcome.
    pub fn run_and_report(&self, config: &StepConfig) -> Result<StepOutcome, StepError> {
        match self.run(config) {
            Ok(outcome) => {
                envman::export_test_result(self.runner, TestResult::Succeeded);
                Ok(outcome)
            }
            Err(e) => {
                error!("{}", e);
                envman::export_test_result(self.runner, TestResult::Failed);
                Err(e)
            }
        }
    }

    /// Runs the step, stopping at the first failure.
    pub fn run(&self, config: &StepConfig) -> Result<StepOutcome, StepError> {
        config.log_summary();
        config.validate()?;
        let options = config.split_options()?;

        info!("Collecting simulator info...");
        let simulator = self.resolve_simulator(config)?;
        info!(
            "Simulator ({}), id: ({}), status: {}",
            simulator.name, simulator.udid, simulator.state
        );

        let app_path = match config.app_path() {
            Some(app) => {
                let is_64bit = Simctl::is_64bit_architecture(&config.simulator_device);
                let prepared = match &self.scratch_dir {
                    Some(dir) => app::prepare_app_in(app, is_64bit, dir)?,
                    None => app::prepare_app(app, is_64bit)?,
                };
                Some(prepared)
            }
            None => None,
        };

        info!("Determining calabash-cucumber version...");
        let work_dir = absolute_path(&config.work_dir)?;
        let strategy = GemStrategy::resolve(config)?;

        info!("Installing calabash-cucumber...");
        cucumber::install(self.runner, self.ruby, &strategy)?;

        info!("Running cucumber test...");
        let cucumber = cucumber::cucumber_command(
            self.ruby,
            &CucumberRun {
                strategy: &strategy,
                device_udid: &simulator.udid,
                app: app_path.as_deref(),
                options: &options,
                work_dir: &work_dir,
            },
        )?;
        info!("$ {}", cucumber.printable());
        self.runner.run(&cucumber).map_err(StepError::Cucumber)?;

        Ok(StepOutcome {
            simulator,
            strategy,
            app_path,
            cucumber,
        })
    }

    fn resolve_simulator(&self, config: &StepConfig) -> Result<SimulatorInfo, StepError> {
        if config.wants_latest_os() {
            let (info, version) = Simctl::find_latest_simulator(
                self.runner,
                DEFAULT_PLATFORM,
                &config.simulator_device,
            )?;
            info!("Latest os version: {}", version);
            return Ok(info);
        }
        Ok(Simctl::find_simulator(
            self.runner,
            &config.simulator_os_version,
            &config.simulator_device,
        )?)
    }
}
