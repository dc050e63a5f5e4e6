//! Wrapper around the `sui` binary
//!
//! Used for building packages to bytecode, reading the active client
//! environment, and recording publications in `Move.lock`.

use std::path::Path;
use std::process::{Command, Stdio};

use super::publisher::{PublishError, Toolchain};
use super::types::{CompiledPackage, NetworkContext};

pub struct SuiCli {
    bin: String,
}

impl SuiCli {
    pub fn new(bin: &str) -> Self {
        Self {
            bin: bin.to_string(),
        }
    }

    /// Run `sui <args>`. With `capture`, stdout is returned and stderr kept
    /// for the error; otherwise output goes straight to the terminal.
    fn run(&self, args: &[&str], capture: bool) -> Result<String, PublishError> {
        let command = format!("{} {}", self.bin, args.join(" "));
        tracing::debug!("Running {}", command);

        let mut cmd = Command::new(&self.bin);
        cmd.args(args).stdin(Stdio::null());

        if !capture {
            let status = cmd.status().map_err(|source| PublishError::Spawn {
                command: command.clone(),
                source,
            })?;
            if !status.success() {
                return Err(PublishError::ToolchainFailed {
                    command,
                    status: status.to_string(),
                    stderr: String::new(),
                });
            }
            return Ok(String::new());
        }

        let output = cmd.output().map_err(|source| PublishError::Spawn {
            command: command.clone(),
            source,
        })?;
        if !output.status.success() {
            return Err(PublishError::ToolchainFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub fn active_env(&self) -> Result<String, PublishError> {
        Ok(self.run(&["client", "active-env"], true)?.trim().to_string())
    }

    pub fn chain_identifier(&self) -> Result<String, PublishError> {
        Ok(self.run(&["client", "chain-identifier"], true)?.trim().to_string())
    }
}

/// Extract the bytecode JSON from build output.
///
/// Older toolchains print build progress on stdout ahead of the JSON.
pub fn parse_build_output(command: &str, stdout: &str) -> Result<CompiledPackage, PublishError> {
    let start = stdout.find('{').ok_or_else(|| PublishError::ToolchainOutput {
        command: command.to_string(),
        reason: "no JSON object in output".to_string(),
    })?;
    serde_json::from_str(stdout[start..].trim()).map_err(|e| PublishError::ToolchainOutput {
        command: command.to_string(),
        reason: e.to_string(),
    })
}

impl Toolchain for SuiCli {
    fn build(&self, package_dir: &Path) -> Result<CompiledPackage, PublishError> {
        let path = package_dir.to_string_lossy();
        let args = ["move", "build", "--dump-bytecode-as-base64", "--path", path.as_ref()];
        let stdout = self.run(&args, true)?;
        parse_build_output(&format!("{} {}", self.bin, args.join(" ")), &stdout)
    }

    fn network_context(&self) -> Result<NetworkContext, PublishError> {
        Ok(NetworkContext {
            environment: self.active_env()?,
            chain_id: self.chain_identifier()?,
        })
    }

    fn register_publication(
        &self,
        package_dir: &Path,
        network: &NetworkContext,
        package_id: &str,
    ) -> Result<(), PublishError> {
        let path = package_dir.to_string_lossy();
        self.run(
            &[
                "move",
                "manage-package",
                "--environment",
                network.environment.as_str(),
                "--network-id",
                network.chain_id.as_str(),
                "--original-id",
                package_id,
                "--latest-id",
                package_id,
                "--version-number",
                "1",
                "--path",
                path.as_ref(),
            ],
            false,
        )?;
        Ok(())
    }
}
