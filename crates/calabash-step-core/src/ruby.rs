//! RubyGems and Bundler commands.
//!
//! How gems must be installed depends on which Ruby is active: the macOS
//! system Ruby needs `sudo` for gem management, rbenv needs a `rehash` after
//! installing executables. [`RubyInstallType::detect`] figures this out once
//! and the command builders take it as a parameter.

use std::path::Path;

use regex::Regex;
use tracing::debug;

use crate::command::{CommandError, CommandRunner, CommandSpec};

const SYSTEM_RUBY_PATH: &str = "/usr/bin/ruby";
const BREW_RUBY_PATH: &str = "/usr/local/bin/ruby";

/// Where the active `ruby` comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RubyInstallType {
    System,
    Brew,
    Rvm,
    Rbenv,
    Unknown,
}

impl RubyInstallType {
    /// Detects the install type from the `ruby` found on `PATH` and the
    /// presence of the `rvm` or `rbenv` version managers.
    pub fn detect() -> Self {
        let ruby = match which::which("ruby") {
            Ok(path) => path,
            Err(e) => {
                debug!(error = %e, "ruby not found on PATH");
                return RubyInstallType::Unknown;
            }
        };
        let install_type = Self::classify(
            &ruby,
            which::which("rvm").is_ok(),
            which::which("rbenv").is_ok(),
        );
        debug!(ruby = %ruby.display(), ?install_type, "detected ruby install");
        install_type
    }

    fn classify(ruby: &Path, has_rvm: bool, has_rbenv: bool) -> Self {
        if ruby == Path::new(SYSTEM_RUBY_PATH) {
            RubyInstallType::System
        } else if ruby == Path::new(BREW_RUBY_PATH) {
            RubyInstallType::Brew
        } else if has_rvm {
            RubyInstallType::Rvm
        } else if has_rbenv {
            RubyInstallType::Rbenv
        } else {
            RubyInstallType::Unknown
        }
    }
}

fn sudo_needed<S: AsRef<str>>(install_type: RubyInstallType, args: &[S]) -> bool {
    if install_type != RubyInstallType::System {
        return false;
    }
    match args {
        [tool, action, ..] => {
            matches!(tool.as_ref(), "gem" | "bundle")
                && matches!(action.as_ref(), "install" | "uninstall")
        }
        _ => false,
    }
}

/// Builds a Ruby tool command, prefixing `sudo` where the install requires it.
pub fn ruby_command<S: AsRef<str>>(
    install_type: RubyInstallType,
    argv: &[S],
) -> Result<CommandSpec, CommandError> {
    let cmd = CommandSpec::from_argv(argv)?;
    if sudo_needed(install_type, argv) {
        return Ok(CommandSpec::new("sudo").arg(cmd.program).args(cmd.args.as_slice()));
    }
    Ok(cmd)
}

/// The commands that install `gem` (any version when `version` is `None`).
pub fn gem_install_commands(
    install_type: RubyInstallType,
    gem: &str,
    version: Option<&str>,
) -> Result<Vec<CommandSpec>, CommandError> {
    let mut argv = vec!["gem", "install", gem, "--no-document"];
    if let Some(version) = version {
        argv.extend(["-v", version]);
    }

    let mut commands = vec![ruby_command(install_type, argv.as_slice())?];
    if install_type == RubyInstallType::Rbenv {
        commands.push(CommandSpec::new("rbenv").arg("rehash"));
    }
    Ok(commands)
}

/// `bundle install` against the given Gemfile.
pub fn bundle_install_command(
    install_type: RubyInstallType,
    gemfile: &Path,
) -> Result<CommandSpec, CommandError> {
    Ok(
        ruby_command(install_type, &["bundle", "install", "--jobs", "20", "--retry", "5"])?
            .env("BUNDLE_GEMFILE", gemfile.display().to_string()),
    )
}

/// Whether `gem list` output shows `gem` with a version containing `version`.
pub fn find_gem_in_list(gem_list: &str, gem: &str, version: &str) -> bool {
    let pattern = format!(r"^{} \(.*{}.*\)", regex::escape(gem), regex::escape(version));
    match Regex::new(&pattern) {
        Ok(re) => gem_list.lines().any(|line| re.is_match(line)),
        Err(_) => false,
    }
}

/// Runs `gem list` and checks whether `gem` is installed at `version`.
pub fn is_gem_installed(
    runner: &dyn CommandRunner,
    install_type: RubyInstallType,
    gem: &str,
    version: &str,
) -> Result<bool, CommandError> {
    let list = runner.output(&ruby_command(install_type, &["gem", "list"])?)?;
    Ok(find_gem_in_list(&list, gem, version))
}
