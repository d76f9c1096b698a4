use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use log::debug;
use tokio::process::Command;

use crate::error::{HydrogitError, Result};

/// A single external tool call.
///
/// Program and arguments stay OS strings so paths reach the child unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
    /// Extra variables for this child only.
    pub env: Vec<(String, String)>,
    /// Show output even when the run is not verbose.
    pub always_show: bool,
}

impl Invocation {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            always_show: false,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path)
    }

    #[must_use]
    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn show_output(mut self) -> Self {
        self.always_show = true;
        self
    }

    /// Full command line, for logs and dry runs. Lossy on non-UTF-8 input.
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Argument `index` as UTF-8, if present and valid.
    #[cfg(test)]
    pub fn arg_str(&self, index: usize) -> Option<&str> {
        self.args.get(index).and_then(|arg| arg.to_str())
    }
}

/// Runs external tools and reports their exit code.
///
/// Non-zero codes are returned, not raised; callers decide which steps are
/// allowed to fail (see [`ensure_success`]).
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    async fn run(&self, invocation: &Invocation) -> Result<i32>;
}

/// Spawns real subprocesses, one at a time.
pub struct SystemRunner {
    verbose: bool,
}

impl SystemRunner {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<i32> {
        debug!("Running: {}", invocation.command_line());

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }
        command.envs(invocation.env.iter().map(|(k, v)| (k, v)));

        if self.verbose || invocation.always_show {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let status = command
            .status()
            .await
            .map_err(|source| HydrogitError::ToolSpawn {
                program: invocation.program.to_string_lossy().into_owned(),
                source,
            })?;

        // Killed by a signal: no code to report.
        Ok(status.code().unwrap_or(-1))
    }
}

/// Runs `invocation` and turns a non-zero exit into [`HydrogitError::ToolFailed`].
pub async fn ensure_success<R: CommandRunner>(
    runner: &R,
    step: &str,
    invocation: &Invocation,
) -> Result<()> {
    let code = runner.run(invocation).await?;
    if code == 0 {
        Ok(())
    } else {
        Err(HydrogitError::ToolFailed {
            step: step.to_string(),
            code,
        })
    }
}
