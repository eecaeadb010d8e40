//! Bitrise step that runs a calabash-ios cucumber suite on an iOS Simulator.
//!
//! Inputs arrive as environment variables (each one can also be passed as a
//! flag). The step resolves the simulator, installs `calabash-cucumber`, runs
//! `cucumber` and exports `BITRISE_XAMARIN_TEST_RESULT` through `envman`.
//!
//! # Usage
//!
//! ```bash
//! # Typical CI invocation, inputs from the environment
//! work_dir=./features simulator_device="iPhone 15" simulator_os_version=latest calabash-step
//!
//! # Same inputs as flags
//! calabash-step --work-dir ./features --simulator-device "iPhone 15" \
//!     --simulator-os-version "iOS 17.0"
//!
//! # Pin the gem and pass options through to cucumber
//! calabash-step --calabash-cucumber-version 0.19.1 --additional-options "--tags @smoke"
//!
//! # Show the simulators simctl knows about
//! calabash-step list-simulators
//! ```

use std::io::IsTerminal;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use calabash_step_core::command::SystemRunner;
use calabash_step_core::config::StepConfig;
use calabash_step_core::envman::{self, TestResult};
use calabash_step_core::ruby::RubyInstallType;
use calabash_step_core::simctl::Simctl;
use calabash_step_core::step::Step;

/// Directory to mirror the log into, as `calabash-step.log`.
const LOG_DIR_ENV: &str = "CALABASH_STEP_LOG_DIR";
const LOG_FILE_NAME: &str = "calabash-step.log";

/// Run a calabash-ios cucumber suite on an iOS Simulator.
#[derive(Parser)]
#[command(name = "calabash-step")]
#[command(about = "Run calabash-ios cucumber tests on an iOS Simulator")]
#[command(version)]
struct Cli {
    /// Directory cucumber runs in
    #[arg(long, env = "work_dir")]
    work_dir: Option<String>,

    /// Gemfile to take calabash-cucumber from (used when its Gemfile.lock exists)
    #[arg(long, env = "gem_file_path")]
    gem_file_path: Option<String>,

    /// The .app bundle to test, passed to cucumber as APP
    #[arg(long, env = "app_path")]
    app_path: Option<String>,

    /// Extra cucumber arguments, split with shell quoting rules
    #[arg(long, env = "additional_options", allow_hyphen_values = true)]
    additional_options: Option<String>,

    /// Simulator device name, e.g. "iPhone 15"
    #[arg(long, env = "simulator_device")]
    simulator_device: Option<String>,

    /// Simulator OS version, e.g. "iOS 17.0", or "latest"
    #[arg(long, env = "simulator_os_version")]
    simulator_os_version: Option<String>,

    /// calabash-cucumber gem version to install and run
    #[arg(long, env = "calabash_cucumber_version")]
    calabash_cucumber_version: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List simulator devices grouped by OS runtime
    ListSimulators,
}

impl Cli {
    fn step_config(self) -> StepConfig {
        StepConfig {
            work_dir: self.work_dir.unwrap_or_default(),
            gemfile_path: self.gem_file_path.unwrap_or_default(),
            app_path: self.app_path.unwrap_or_default(),
            additional_options: self.additional_options.unwrap_or_default(),
            simulator_device: self.simulator_device.unwrap_or_default(),
            simulator_os_version: self.simulator_os_version.unwrap_or_default(),
            calabash_cucumber_version: self.calabash_cucumber_version.unwrap_or_default(),
        }
    }
}

fn init_tracing() {
    let file_layer = std::env::var_os(LOG_DIR_ENV).and_then(|dir| {
        if let Err(e) = std::fs::create_dir_all(&dir) {
            eprintln!(
                "warning: cannot create log dir {}: {}; file logging disabled",
                std::path::Path::new(&dir).display(),
                e
            );
            return None;
        }
        Some(
            fmt::layer()
                .with_writer(tracing_appender::rolling::never(dir, LOG_FILE_NAME))
                .with_ansi(false),
        )
    });

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal())
                .with_target(false),
        )
        .with(file_layer)
        .init();
}

fn main() -> ExitCode {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            error!("Issue with input: invalid command line");
            envman::export_test_result(&SystemRunner, TestResult::Failed);
            return ExitCode::from(1);
        }
    };

    match cli.command {
        Some(Command::ListSimulators) => list_simulators(),
        None => run_step(cli.step_config()),
    }
}

fn run_step(config: StepConfig) -> ExitCode {
    let step = Step::new(&SystemRunner, RubyInstallType::detect());
    match step.run_and_report(&config) {
        Ok(outcome) => {
            info!(
                simulator = %outcome.simulator.udid,
                "calabash-ios tests succeeded"
            );
            ExitCode::SUCCESS
        }
        Err(e) => ExitCode::from(e.exit_code()),
    }
}

fn list_simulators() -> ExitCode {
    match Simctl::list_runtimes(&SystemRunner) {
        Ok(runtimes) => {
            if runtimes.is_empty() {
                eprintln!("No simulator devices found");
            }
            print!("{}", Simctl::format_runtimes(&runtimes));
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to list simulators: {}", e);
            ExitCode::from(1)
        }
    }
}
