//! External program invocation (clusterctl)

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

/// Runs external programs to completion
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run with the caller's stdio attached, failing on a non-zero exit
    async fn run(&self, program: &str, args: &[String]) -> Result<()>;

    /// Run and capture stdout, failing on a non-zero exit
    async fn output(&self, program: &str, args: &[String]) -> Result<String>;
}

/// [`CommandRunner`] that spawns real processes
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

fn describe(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<()> {
        let command = describe(program, args);
        debug!(command = %command, "running command");

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| Error::Command {
                command: command.clone(),
                message: e.to_string(),
            })?;

        if !status.success() {
            return Err(Error::Command {
                command,
                message: status.to_string(),
            });
        }
        Ok(())
    }

    async fn output(&self, program: &str, args: &[String]) -> Result<String> {
        let command = describe(program, args);
        debug!(command = %command, "capturing command output");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::Command {
                command: command.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(Error::Command {
                command,
                message: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        String::from_utf8(output.stdout).map_err(|e| Error::decode("command output", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_joins_args() {
        let args = vec!["init".to_string(), "--wait-providers".to_string()];
        assert_eq!(describe("clusterctl", &args), "clusterctl init --wait-providers");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_captures_stdout() {
        let out = ProcessRunner
            .output("sh", &["-c".to_string(), "echo hello".to_string()])
            .await
            .unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_command_error() {
        let err = ProcessRunner
            .output("sh", &["-c".to_string(), "echo boom >&2; exit 3".to_string()])
            .await
            .unwrap_err();
        match err {
            Error::Command { command, message } => {
                assert!(command.starts_with("sh -c"));
                assert!(message.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_command_error() {
        let err = ProcessRunner
            .run("knest-definitely-not-a-program", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Command { .. }));
    }
}
