//! # calabash-step-core
//!
//! Core library for running calabash-ios cucumber suites on an iOS Simulator
//! as a Bitrise CI step.
//!
//! ## Modules
//!
//! - [`config`] - Step inputs and their validation
//! - [`simctl`] - Simulator lookup through `xcrun simctl`
//! - [`gemfile`] - `Gemfile.lock` inspection
//! - [`ruby`] - RubyGems and Bundler command construction
//! - [`cucumber`] - Gem install strategy and the `cucumber` invocation
//! - [`app`] - Preparing fat Xamarin `.app` bundles for the simulator
//! - [`envman`] - Exporting the test result to the CI system
//! - [`command`] - External process model and runner
//! - [`step`] - The step sequence tying the above together
//!
//! ## External Dependencies
//!
//! - **Xcode** (for `xcrun simctl`)
//! - **Ruby** with RubyGems, and Bundler when a Gemfile is used
//! - **envman** (provided on Bitrise build machines)
//!
//! ## Example
//!
//! ```no_run
//! use calabash_step_core::command::SystemRunner;
//! use calabash_step_core::config::StepConfig;
//! use calabash_step_core::ruby::RubyInstallType;
//! use calabash_step_core::step::Step;
//!
//! let config = StepConfig {
//!     work_dir: "./features-project".into(),
//!     simulator_device: "iPhone 15".into(),
//!     simulator_os_version: "latest".into(),
//!     ..Default::default()
//! };
//!
//! let step = Step::new(&SystemRunner, RubyInstallType::detect());
//! if let Err(e) = step.run_and_report(&config) {
//!     eprintln!("{}", e);
//!     std::process::exit(e.exit_code().into());
//! }
//! ```

pub mod app;
pub mod command;
pub mod config;
pub mod cucumber;
pub mod envman;
pub mod error;
pub mod gemfile;
pub mod ruby;
pub mod simctl;
pub mod step;
