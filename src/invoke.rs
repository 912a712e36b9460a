//src/invoke.rs
//! Typed descriptors for external tool runs.
//!
//! Pipeline stages never build shell strings. They describe the run as an
//! [`Invocation`] and hand it to a [`ToolInvoker`], which lets tests swap the
//! real binaries for a fake that writes canned output files.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use crate::error::{PipelineError, Result};

/// Which collaborator an invocation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Aligner,
    KmerCounter,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tool::Aligner => f.write_str("aligner"),
            Tool::KmerCounter => f.write_str("k-mer counter"),
        }
    }
}

/// One run of an external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub tool: Tool,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub working_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(tool: Tool, program: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Value following `flag` in the argument list, if any.
    pub fn value_after(&self, flag: &str) -> Option<&OsStr> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(|a| a.as_os_str())
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }

    /// Space-joined rendering for log lines. Not meant to be fed back to a shell.
    pub fn command_line(&self) -> String {
        let mut line = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// How a started tool finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// Exited with status 0. Output files may still be empty.
    Completed,
    /// Exited non-zero or was killed by a signal (`code` is `None` then).
    Failed { code: Option<i32>, stderr: String },
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Completed)
    }
}

/// Runs invocations to completion. `Err` means the program could not be
/// started; a program that ran and failed is `Ok(ToolOutcome::Failed { .. })`.
pub trait ToolInvoker {
    fn invoke(&self, invocation: &Invocation) -> Result<ToolOutcome>;
}

/// Runs the real binaries with `std::process::Command`, blocking until they exit.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessInvoker;

impl ToolInvoker for ProcessInvoker {
    fn invoke(&self, invocation: &Invocation) -> Result<ToolOutcome> {
        log::debug!("Running {}: {}", invocation.tool, invocation.command_line());

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        if let Some(dir) = &invocation.working_dir {
            cmd.current_dir(dir);
        }

        let output = cmd.output().map_err(|source| PipelineError::Launch {
            tool: invocation.tool,
            program: invocation.program.clone(),
            source,
        })?;

        if output.status.success() {
            Ok(ToolOutcome::Completed)
        } else {
            Ok(ToolOutcome::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// Shared handling of a finished run: failures are logged, never raised.
pub(crate) fn log_outcome(invocation: &Invocation, outcome: &ToolOutcome) {
    match outcome {
        ToolOutcome::Completed => {
            log::debug!("{} finished: {}", invocation.tool, invocation.command_line())
        }
        ToolOutcome::Failed { code, stderr } => {
            let status = code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}"));
            log::warn!(
                "{} exited with {status}: {}\n{stderr}",
                invocation.tool,
                invocation.command_line()
            );
        }
    }
}
