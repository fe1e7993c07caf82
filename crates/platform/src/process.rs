//! Process execution through a single uniform seam

use async_trait::async_trait;
use rootpatch_errors::{Error, PlatformError};
use tokio::process::Command;

/// A command description handed to a [`ToolRunner`].
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
}

impl ToolCommand {
    #[must_use]
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg<S: AsRef<str>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Shell-style rendering for logs and diagnostics.
    #[must_use]
    pub fn display(&self) -> String {
        let mut rendered = self.program.clone();
        for arg in &self.args {
            rendered.push(' ');
            if arg.contains(' ') {
                rendered.push('\'');
                rendered.push_str(arg);
                rendered.push('\'');
            } else {
                rendered.push_str(arg);
            }
        }
        rendered
    }
}

/// Captured output of a finished tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Exit code; `-1` when the process was killed by a signal.
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Stdout and stderr concatenated, for diagnostics.
    #[must_use]
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }

    /// A zero-exit output, mostly useful for test stubs.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failing output with a diagnostic on stderr.
    #[must_use]
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Trait for running external tools.
///
/// A non-zero exit is not an error at this layer; it comes back as a
/// [`ToolOutput`] and the caller owns the decision. `Err` means the tool
/// could not be spawned at all.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, command: ToolCommand) -> Result<ToolOutput, Error>;

    /// Existence probe for paths the tools operate on. Test hosts re-root
    /// this into their sandbox.
    fn path_exists(&self, path: &std::path::Path) -> bool {
        path.exists()
    }
}

/// Run a command and enforce the zero-exit contract.
pub async fn run_checked(
    runner: &dyn ToolRunner,
    command: ToolCommand,
) -> Result<ToolOutput, Error> {
    let rendered = command.display();
    let output = runner.run(command).await?;
    if output.success() {
        Ok(output)
    } else {
        Err(PlatformError::ProcessExecutionFailed {
            command: rendered,
            message: output.combined(),
        }
        .into())
    }
}

/// Production runner backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostToolRunner;

impl HostToolRunner {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolRunner for HostToolRunner {
    async fn run(&self, command: ToolCommand) -> Result<ToolOutput, Error> {
        tracing::debug!(command = %command.display(), "running external tool");
        let output = Command::new(command.program())
            .args(command.get_args())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => PlatformError::CommandNotFound {
                    command: command.program().to_string(),
                },
                _ => PlatformError::ProcessExecutionFailed {
                    command: command.display(),
                    message: e.to_string(),
                },
            })?;

        Ok(ToolOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_spaced_arguments() {
        let cmd = ToolCommand::new("rsync")
            .args(["-r", "-i", "-a"])
            .arg("/tmp/src/")
            .arg("/Library/Application Support");
        assert_eq!(
            cmd.display(),
            "rsync -r -i -a /tmp/src/ '/Library/Application Support'"
        );
    }

    #[test]
    fn combined_output_joins_streams() {
        let out = ToolOutput {
            code: 1,
            stdout: "partial".to_string(),
            stderr: "boom".to_string(),
        };
        assert_eq!(out.combined(), "partial\nboom");
        assert!(!out.success());
    }
}
