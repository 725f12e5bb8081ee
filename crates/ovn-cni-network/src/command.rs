//! External tool invocation.
//!
//! `ovs-vsctl` and `ovn-nbctl` calls are synchronous RPCs: the request is the
//! argv, the response is the exit status plus whatever the tool printed.

use std::process::Command;

use ovn_cni_common::{CniError, CniResult};

/// Result of running an external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Whether the tool exited successfully.
    pub success: bool,
    /// Stdout followed by stderr.
    pub combined: String,
}

impl CommandOutput {
    /// Successful run with the given output.
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            combined: output.into(),
        }
    }

    /// Failed run with the given output.
    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            combined: output.into(),
        }
    }
}

/// Runs a program to completion.
pub trait CommandRunner {
    /// Run `program` with `args` and collect its output.
    ///
    /// A non-zero exit is reported through [`CommandOutput::success`]; only a
    /// failure to start the program is an error.
    fn run(&self, program: &str, args: &[&str]) -> CniResult<CommandOutput>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn run(&self, program: &str, args: &[&str]) -> CniResult<CommandOutput> {
        (**self).run(program, args)
    }
}

/// [`CommandRunner`] spawning real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> CniResult<CommandOutput> {
        tracing::trace!(program, ?args, "Running command");

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| CniError::ToolSpawn {
                program: program.to_string(),
                message: e.to_string(),
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            tracing::debug!(program, status = %output.status, output = %combined.trim(), "Command failed");
        }

        Ok(CommandOutput {
            success: output.status.success(),
            combined,
        })
    }
}
