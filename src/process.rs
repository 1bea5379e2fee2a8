//! Thin builder over `std::process::Command` for host tool invocation.
//!
//! Captures output so tool noise stays out of the progress log, and folds
//! stderr into the error when a tool fails.

use anyhow::{bail, Context, Result};
use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

pub struct Cmd {
    program: String,
    args: Vec<OsString>,
    error_msg: Option<String>,
}

impl Cmd {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            error_msg: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    /// Message prepended to the error if the command exits non-zero.
    pub fn error_msg(mut self, msg: &str) -> Self {
        self.error_msg = Some(msg.to_string());
        self
    }

    /// Run the command, discarding stdout.
    pub fn run(self) -> Result<()> {
        self.run_capture().map(|_| ())
    }

    /// Run the command and return its stdout as UTF-8.
    pub fn run_capture(self) -> Result<String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .with_context(|| format!("failed to spawn '{}'", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let msg = self
                .error_msg
                .unwrap_or_else(|| format!("'{}' failed", self.program));
            bail!("{} ({}): {}", msg, output.status, stderr.trim());
        }

        String::from_utf8(output.stdout)
            .with_context(|| format!("'{}' produced non-UTF-8 output", self.program))
    }
}
