//! Builder for executing external tool commands with timeout support.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use shortforge_core::{Error, Result};
use tokio::process::Command;

/// Default command timeout: 5 minutes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Maximum number of stderr characters kept in a tool error.
const MAX_STDERR_CHARS: usize = 800;

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// The child process is killed when the returned future is dropped, so a
/// timed-out or cancelled invocation never outlives its run.
///
/// # Example
///
/// ```no_run
/// use shortforge_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> shortforge_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-v", "quiet", "-print_format", "json", "-show_format"])
///     .arg("/tmp/clip.mp4")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    current_dir: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            current_dir: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append a path argument.
    pub fn path_arg(&mut self, path: &Path) -> &mut Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Run the process from `dir`.
    pub fn current_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tool`] if spawning fails, the process times out, or
    /// it exits with a non-zero status (the message includes stderr).
    pub async fn execute(&self) -> Result<ToolOutput> {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!(tool = %program_name, args = ?self.args, "executing tool");

        let child = cmd
            .spawn()
            .map_err(|e| Error::tool(&program_name, format!("failed to spawn: {e}")))?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let tool_output = ToolOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if !output.status.success() {
                    return Err(Error::tool(
                        program_name,
                        format!(
                            "exited with status {}: {}",
                            output.status,
                            tail(tool_output.stderr.trim(), MAX_STDERR_CHARS)
                        ),
                    ));
                }

                Ok(tool_output)
            }
            Ok(Err(e)) => Err(Error::tool(
                program_name,
                format!("I/O error waiting for process: {e}"),
            )),
            // Dropping the wait future kills the child (kill_on_drop).
            Err(_elapsed) => Err(Error::tool(
                program_name,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }
}

/// Last `max` characters of `s`; ffmpeg puts the useful part of its
/// diagnostics at the end.
fn tail(s: &str, max: usize) -> &str {
    let count = s.chars().count();
    if count <= max {
        return s;
    }
    let skip = count - max;
    let (idx, _) = s.char_indices().nth(skip).unwrap_or((0, ' '));
    &s[idx..]
}
