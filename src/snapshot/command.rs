//! Shell command execution seam.
//!
//! Every interaction with the host (mount table, mdadm, freeze commands,
//! configured hooks, the aws CLI) goes through [`CommandRunner`] so the rest
//! of the crate never touches `std::process` directly and tests can script
//! command output.

use crate::snapshot::result_error::error::Error;
use crate::snapshot::result_error::result::Result;
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, info};

pub trait CommandRunner {
    /// Runs a command line and returns its stdout. A non-zero exit status is
    /// an error carrying the captured stderr.
    fn run(&self, command: &str) -> Result<String>;
}

/// Runs command strings through `sh -c` on the local host.
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) -> Result<String> {
        debug!("Running command {command:?}");
        let output = Command::new("sh").args(["-c", command]).output()?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(Error::CommandFailed {
                command: command.to_string(),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

/// Runs the before/after hook commands configured on a backup rule, in
/// order. The first failing command aborts the rest.
pub fn run_all(runner: &dyn CommandRunner, commands: &[Arc<str>]) -> Result<()> {
    for command in commands {
        info!("Running custom command {command:?}");
        runner.run(command)?;
    }
    Ok(())
}
