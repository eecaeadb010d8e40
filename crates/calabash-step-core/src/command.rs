//! Process model for the external tools the step drives.
//!
//! Every external invocation (`xcrun`, `gem`, `bundle`, `cucumber`, `envman`)
//! is described by a [`CommandSpec`] and executed through a [`CommandRunner`].
//! [`SystemRunner`] spawns real processes; tests substitute a recording runner
//! so the step's orchestration can be checked without Ruby or Xcode installed.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use thiserror::Error;
use tracing::debug;

/// Errors raised while running an external command.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The command has no program to execute.
    #[error("Empty command")]
    Empty,

    /// The program could not be started (usually: not on `PATH`).
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran but exited unsuccessfully.
    #[error("'{command}' failed with {}: {output}", exit_status_text(.code))]
    Failed {
        command: String,
        code: Option<i32>,
        output: String,
    },

    /// An I/O error occurred while talking to the child process.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_status_text(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "signal".to_string(),
    }
}

/// A fully described external command: program, arguments, extra
/// environment, working directory and optional stdin payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    pub dir: Option<PathBuf>,
    pub stdin: Option<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Builds a command from an argument vector whose first element is the
    /// program.
    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Result<Self, CommandError> {
        let (program, rest) = argv.split_first().ok_or(CommandError::Empty)?;
        Ok(Self::new(program.as_ref()).args(rest))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<S: AsRef<str>>(mut self, args: &[S]) -> Self {
        self.args.extend(args.iter().map(|a| a.as_ref().to_string()));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Looks up an injected environment value.
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.envs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The argument vector including the program, shell-quoted, as it is
    /// shown in the `$ ...` log lines.
    pub fn printable(&self) -> String {
        shell_words::join(std::iter::once(&self.program).chain(self.args.iter()))
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// Executes [`CommandSpec`]s.
pub trait CommandRunner {
    /// Runs the command with stdout/stderr attached to this process and waits
    /// for it. A non-zero exit is an error.
    fn run(&self, cmd: &CommandSpec) -> Result<(), CommandError>;

    /// Runs the command and returns its trimmed stdout. A non-zero exit is an
    /// error carrying the captured stderr.
    fn output(&self, cmd: &CommandSpec) -> Result<String, CommandError>;
}

/// [`CommandRunner`] backed by real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    fn spawn_error(cmd: &CommandSpec, source: std::io::Error) -> CommandError {
        CommandError::Spawn {
            program: cmd.program.clone(),
            source,
        }
    }

    /// Writes the stdin payload, if any, and closes the pipe. The result is
    /// reported only after the child has been waited on.
    fn feed_stdin(cmd: &CommandSpec, child: &mut Child) -> std::io::Result<()> {
        match (&cmd.stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => pipe.write_all(input.as_bytes()),
            _ => Ok(()),
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &CommandSpec) -> Result<(), CommandError> {
        debug!(command = %cmd.printable(), dir = ?cmd.dir, "running");

        let mut command = cmd.to_command();
        command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        if cmd.stdin.is_some() {
            command.stdin(Stdio::piped());
        }

        let mut child = command.spawn().map_err(|e| Self::spawn_error(cmd, e))?;
        let fed = Self::feed_stdin(cmd, &mut child);

        let status = child.wait()?;
        if !status.success() {
            return Err(CommandError::Failed {
                command: cmd.printable(),
                code: status.code(),
                output: String::new(),
            });
        }
        fed?;
        Ok(())
    }

    fn output(&self, cmd: &CommandSpec) -> Result<String, CommandError> {
        debug!(command = %cmd.printable(), "capturing output");

        let mut command = cmd.to_command();
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        command.stdin(if cmd.stdin.is_some() { Stdio::piped() } else { Stdio::null() });

        let mut child = command.spawn().map_err(|e| Self::spawn_error(cmd, e))?;
        let fed = Self::feed_stdin(cmd, &mut child);

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(CommandError::Failed {
                command: cmd.printable(),
                code: output.status.code(),
                output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        fed?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
