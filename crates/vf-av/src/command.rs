//! Builder for executing external tool commands with a hard timeout.
//!
//! The child runs in its own process group. When the timeout expires or the
//! caller cancels, the whole group is killed with `SIGKILL` and the child is
//! reaped before the error is returned. The group is also killed once the
//! child exits normally, so helpers forked by the tool never outlive the call
//! or keep its pipes open.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use vf_core::ToolFailure;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Number of trailing stderr lines kept for errors and [`ToolOutput::stderr`].
const STDERR_TAIL_LINES: usize = 20;

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Last non-blank lines of standard error (lossy UTF-8). Callers that
    /// need every line use the callback of
    /// [`ToolCommand::execute_with_stderr_callback`].
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use vf_av::ToolCommand;
/// use std::path::PathBuf;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), vf_core::ToolFailure> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-v", "quiet", "-print_format", "json", "-show_format"])
///     .arg("/path/to/video.mov")
///     .timeout(Duration::from_secs(30))
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
}

type Finished = (Vec<u8>, StderrTail, ExitStatus);

enum Outcome {
    Finished(std::io::Result<Finished>),
    TimedOut,
    Cancelled,
}

/// Bounded ring of the most recent non-blank stderr lines.
#[derive(Debug)]
struct StderrTail {
    lines: VecDeque<String>,
    cap: usize,
}

impl StderrTail {
    fn new(cap: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(cap),
            cap,
        }
    }

    fn push(&mut self, line: &str) {
        if self.cap == 0 || line.trim().is_empty() {
            return;
        }
        if self.lines.len() == self.cap {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
    }

    fn joined(&self) -> String {
        self.lines
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
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

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and the tail of stderr.
    ///
    /// # Errors
    ///
    /// - [`ToolFailure::Spawn`] if the process cannot be started.
    /// - [`ToolFailure::Timeout`] if it outlives the timeout (it is killed).
    /// - [`ToolFailure::Exit`] on a non-zero exit status.
    pub async fn execute(&self) -> Result<ToolOutput, ToolFailure> {
        self.execute_with_stderr_callback(|_| {}, None).await
    }

    /// Like [`execute`](Self::execute), but hands every stderr line to
    /// `on_line` as it arrives and aborts when `cancel` fires.
    ///
    /// The callback only observes; it cannot influence the outcome. The
    /// timeout covers the whole call: draining both pipes and reaping the
    /// child.
    pub async fn execute_with_stderr_callback(
        &self,
        mut on_line: impl FnMut(&str) + Send,
        cancel: Option<CancellationToken>,
    ) -> Result<ToolOutput, ToolFailure> {
        let tool = self.program_name();

        let mut std_cmd = std::process::Command::new(&self.program);
        std_cmd
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // New process group so the tool's helpers can be killed with it.
            std_cmd.process_group(0);
        }
        let mut cmd = Command::from(std_cmd);
        cmd.kill_on_drop(true);

        tracing::debug!("exec: {} {}", self.program.display(), self.args.join(" "));

        let mut child = cmd.spawn().map_err(|e| ToolFailure::Spawn {
            tool: tool.clone(),
            message: e.to_string(),
        })?;

        // The group id equals the child's pid; it is gone from `child` once
        // the child has been reaped.
        let pgid = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let outcome = {
            let read_stdout = async {
                let mut buf = Vec::new();
                if let Some(mut out) = stdout {
                    out.read_to_end(&mut buf).await?;
                }
                Ok::<_, std::io::Error>(buf)
            };

            let read_stderr = async {
                let mut tail = StderrTail::new(STDERR_TAIL_LINES);
                if let Some(err) = stderr {
                    let mut reader = BufReader::new(err);
                    let mut buf = Vec::new();
                    loop {
                        buf.clear();
                        if reader.read_until(b'\n', &mut buf).await? == 0 {
                            break;
                        }
                        let line = String::from_utf8_lossy(&buf);
                        let line = line.trim_end_matches(['\r', '\n']);
                        on_line(line);
                        tail.push(line);
                    }
                }
                Ok::<_, std::io::Error>(tail)
            };

            let reap = async {
                let status = child.wait().await?;
                // Anything still in the group would hold the pipes open.
                kill_group(pgid, &tool);
                Ok::<_, std::io::Error>(status)
            };

            let run = async { tokio::try_join!(read_stdout, read_stderr, reap) };

            tokio::select! {
                res = run => Outcome::Finished(res),
                _ = tokio::time::sleep(self.timeout) => Outcome::TimedOut,
                _ = wait_cancelled(cancel.as_ref()) => Outcome::Cancelled,
            }
        };

        match outcome {
            Outcome::Finished(Ok((stdout, tail, status))) => {
                let stderr = tail.joined();
                if !status.success() {
                    return Err(ToolFailure::Exit {
                        tool,
                        code: status.code(),
                        stderr,
                    });
                }

                Ok(ToolOutput {
                    status,
                    stdout: String::from_utf8_lossy(&stdout).into_owned(),
                    stderr,
                })
            }
            Outcome::Finished(Err(e)) => {
                terminate(&mut child, pgid, &tool).await;
                Err(ToolFailure::Io {
                    tool,
                    message: format!("I/O error waiting for process: {e}"),
                })
            }
            Outcome::TimedOut => {
                tracing::warn!("{tool} exceeded {:?}; killing process group", self.timeout);
                terminate(&mut child, pgid, &tool).await;
                Err(ToolFailure::Timeout {
                    tool,
                    after: self.timeout,
                })
            }
            Outcome::Cancelled => {
                tracing::info!("{tool} cancelled; killing process group");
                terminate(&mut child, pgid, &tool).await;
                Err(ToolFailure::Cancelled { tool })
            }
        }
    }
}

async fn wait_cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

/// `SIGKILL` every process in the group led by `pgid`. An empty group is
/// fine.
fn kill_group(pgid: Option<u32>, tool: &str) {
    #[cfg(unix)]
    if let Some(pgid) = pgid {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => tracing::debug!("killpg for {tool} (pgid {pgid}) failed: {e}"),
        }
    }
    #[cfg(not(unix))]
    let _ = (pgid, tool);
}

/// Kill the child's whole process group, then kill and reap the child itself.
async fn terminate(child: &mut Child, pgid: Option<u32>, tool: &str) {
    kill_group(pgid, tool);
    if let Err(e) = child.kill().await {
        tracing::debug!("kill for {tool} failed: {e}");
    }
}
