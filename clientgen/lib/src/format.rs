//! Optional formatting of the generated sources by an external tool.
//!
//! Formatting is cosmetic. A formatter that is missing or fails only
//! produces a warning and the run still succeeds.

use std::path::Path;
use std::process::Command;

use tracing::{debug, instrument, warn};

/// An external formatter invoked as `<program> <args...> <output_dir>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formatter {
    pub program: String,
    pub args: Vec<String>,
}

impl Formatter {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    /// Splits a command line on whitespace. Returns `None` when it is blank.
    ///
    /// ```
    /// use clientgen::format::Formatter;
    ///
    /// let formatter = Formatter::parse("prettier --write").unwrap();
    /// assert_eq!(formatter.program, "prettier");
    /// assert_eq!(formatter.args, vec!["--write"]);
    /// assert!(Formatter::parse("   ").is_none());
    /// ```
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn command(&self, dir: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).arg(dir);
        command
    }

    /// Runs the formatter over `dir`. Returns whether it succeeded.
    #[instrument(skip(self), fields(program = %self.program, dir = %dir.display()))]
    pub fn run(&self, dir: &Path) -> bool {
        match self.command(dir).output() {
            Ok(output) if output.status.success() => {
                debug!("Formatter finished");
                true
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!(status = %output.status, stderr = %stderr.trim(), "Formatter failed, output left unformatted");
                false
            }
            Err(err) => {
                warn!(error = %err, "Could not run formatter, output left unformatted");
                false
            }
        }
    }
}
