//! Host-command collaborators: database dump and package inventory.
//!
//! Both ports run a configured argv and capture stdout. Failures here are
//! collaborator failures, not transfer failures: the caller logs a notice
//! and the pass continues without the ride-along artifact.

use std::io;
use std::process::Command;

use thiserror::Error;

use super::interpreter::{DatabaseDumper, PackageInventory};

/// Errors that can occur while running a host command.
#[derive(Debug, Error)]
pub enum HostCmdError {
    /// The command could not be launched.
    #[error("failed to launch {command}: {source}")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The command ran and exited nonzero.
    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
}

/// Result type for host command operations.
pub type Result<T> = std::result::Result<T, HostCmdError>;

/// Runs an argv and returns its stdout bytes.
fn run_capture(argv: &[String]) -> Result<Vec<u8>> {
    let command = argv.join(" ");
    // Config validation rejects empty ride-along commands before we get here.
    let Some((program, args)) = argv.split_first() else {
        return Err(HostCmdError::Launch {
            command,
            source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
        });
    };

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| HostCmdError::Launch {
            command: command.clone(),
            source,
        })?;

    if output.status.success() {
        Ok(output.stdout)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        Err(HostCmdError::CommandFailed { command, stderr })
    }
}

/// Database dumper backed by a configured command (e.g. `mysqldump
/// --all-databases`) whose stdout is the dump stream.
pub struct CommandDumper {
    argv: Vec<String>,
}

impl CommandDumper {
    pub fn new(argv: Vec<String>) -> Self {
        CommandDumper { argv }
    }
}

impl DatabaseDumper for CommandDumper {
    type Error = HostCmdError;

    fn dump(&self) -> Result<Vec<u8>> {
        run_capture(&self.argv)
    }
}

/// Package inventory backed by a configured command (e.g. `dpkg
/// --get-selections`).
pub struct CommandInventory {
    argv: Vec<String>,
}

impl CommandInventory {
    pub fn new(argv: Vec<String>) -> Self {
        CommandInventory { argv }
    }
}

impl PackageInventory for CommandInventory {
    type Error = HostCmdError;

    fn list(&self) -> Result<String> {
        let bytes = run_capture(&self.argv)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
