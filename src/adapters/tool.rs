use crate::domain::ports::{ToolOutput, ToolRunner};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

/// Runs the provisioning tool as a child process, optionally through sudo,
/// from the tool's own directory.
#[derive(Debug, Clone)]
pub struct CommandToolRunner {
    tool_path: PathBuf,
    use_sudo: bool,
}

impl CommandToolRunner {
    /// A relative `tool_path` is resolved against the current directory, since
    /// the tool runs from its own directory.
    pub fn new(tool_path: impl Into<PathBuf>, use_sudo: bool) -> Self {
        let tool_path = tool_path.into();
        let tool_path = if tool_path.is_relative() {
            match std::env::current_dir() {
                Ok(cwd) => cwd.join(tool_path),
                Err(_) => tool_path,
            }
        } else {
            tool_path
        };
        Self {
            tool_path,
            use_sudo,
        }
    }

    pub fn tool_path(&self) -> &Path {
        &self.tool_path
    }

    fn working_dir(&self) -> &Path {
        match self.tool_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = if self.use_sudo {
            let mut sudo = Command::new("sudo");
            sudo.arg(&self.tool_path);
            sudo
        } else {
            Command::new(&self.tool_path)
        };
        cmd.args(args)
            .current_dir(self.working_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

#[async_trait]
impl ToolRunner for CommandToolRunner {
    async fn run(&self, args: &[String]) -> Result<ToolOutput> {
        let output = self.command(args).output().await?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(match output.status.code() {
            Some(code) => ToolOutput::exited(code, combined),
            None => ToolOutput::signalled(signal_name(&output.status), combined),
        })
    }
}

#[cfg(unix)]
fn signal_name(status: &ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;

    match status.signal() {
        Some(1) => "hangup".to_string(),
        Some(2) => "interrupt".to_string(),
        Some(3) => "quit".to_string(),
        Some(6) => "aborted".to_string(),
        Some(9) => "killed".to_string(),
        Some(11) => "segmentation fault".to_string(),
        Some(13) => "broken pipe".to_string(),
        Some(15) => "terminated".to_string(),
        Some(n) => format!("signal {}", n),
        None => "unknown".to_string(),
    }
}

#[cfg(not(unix))]
fn signal_name(_status: &ExitStatus) -> String {
    "unknown".to_string()
}
