//! Subprocess execution utilities.
//!
//! Wraps `std::process` with the configuration surface the build
//! pipeline needs: explicit stdout/stderr routing, a working directory,
//! POSIX-aware exit status reporting, and a retrying output helper.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};

/// Where a child's stdout/stderr goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Io {
    /// Share the parent's descriptor.
    #[default]
    Inherit,
    /// Discard into /dev/null.
    Null,
    /// Capture through a pipe.
    Piped,
}

impl Io {
    fn to_stdio(self) -> Stdio {
        match self {
            Io::Inherit => Stdio::inherit(),
            Io::Null => Stdio::null(),
            Io::Piped => Stdio::piped(),
        }
    }
}

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct Command {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    stdout: Io,
    stderr: Io,
}

impl Command {
    pub fn new(program: impl Into<String>) -> Self {
        Command {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            stdout: Io::Inherit,
            stderr: Io::Inherit,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args
            .extend(args.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    /// Set the working directory for the child.
    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn stdout(mut self, io: Io) -> Self {
        self.stdout = io;
        self
    }

    pub fn stderr(mut self, io: Io) -> Self {
        self.stderr = io;
        self
    }

    pub fn get_program(&self) -> &str {
        &self.program
    }

    fn build_command(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdout(self.stdout.to_stdio());
        cmd.stderr(self.stderr.to_stdio());
        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }

    /// Spawn the child with the configured stdio routing.
    pub fn spawn(&self) -> Result<Child> {
        let child = self
            .build_command()
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program))?;
        Ok(Child { inner: child })
    }

    /// Run with both streams piped and collect the output.
    pub fn output(&self) -> Result<CommandOutput> {
        let mut cmd = self.clone();
        cmd.stdout = Io::Piped;
        cmd.stderr = Io::Piped;
        cmd.spawn()?.wait_with_output()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// A spawned child process. Dropping it without waiting leaves the
/// process running; callers always reap through `wait`/`wait_with_output`.
#[derive(Debug)]
pub struct Child {
    inner: std::process::Child,
}

impl Child {
    /// Reap the child, closing any captured pipe ends.
    pub fn wait(mut self) -> Result<ExitStatus> {
        let status = self.inner.wait().context("waitpid() failed")?;
        Ok(ExitStatus { inner: status })
    }

    /// Drain both pipes to completion, then reap the child.
    pub fn wait_with_output(self) -> Result<CommandOutput> {
        let out = self
            .inner
            .wait_with_output()
            .context("failed to read child output")?;
        Ok(CommandOutput {
            status: ExitStatus { inner: out.status },
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        })
    }
}

/// Full POSIX wait semantics for a finished child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    inner: std::process::ExitStatus,
}

impl ExitStatus {
    pub fn exited_normally(&self) -> bool {
        self.inner.code().is_some()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.inner.code()
    }

    #[cfg(unix)]
    pub fn killed_by_signal(&self) -> bool {
        use std::os::unix::process::ExitStatusExt;
        self.inner.signal().is_some()
    }

    #[cfg(unix)]
    pub fn term_signal(&self) -> Option<i32> {
        use std::os::unix::process::ExitStatusExt;
        self.inner.signal()
    }

    #[cfg(unix)]
    pub fn stopped_by_signal(&self) -> bool {
        use std::os::unix::process::ExitStatusExt;
        self.inner.stopped_signal().is_some()
    }

    #[cfg(unix)]
    pub fn stop_signal(&self) -> Option<i32> {
        use std::os::unix::process::ExitStatusExt;
        self.inner.stopped_signal()
    }

    #[cfg(unix)]
    pub fn core_dumped(&self) -> bool {
        use std::os::unix::process::ExitStatusExt;
        self.inner.core_dumped()
    }

    /// Successful only if normally exited with code 0.
    pub fn success(&self) -> bool {
        self.inner.success()
    }
}

impl Default for ExitStatus {
    fn default() -> Self {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus {
            inner: std::process::ExitStatus::from_raw(0),
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.exit_code() {
            write!(f, "exited with code {code}")
        } else if let Some(sig) = self.term_signal() {
            write!(
                f,
                "killed by signal {sig}{}",
                if self.core_dumped() {
                    " (core dumped)"
                } else {
                    ""
                }
            )
        } else if let Some(sig) = self.stop_signal() {
            write!(f, "stopped by signal {sig}")
        } else {
            write!(f, "unknown status")
        }
    }
}

/// Captured output of a finished child.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Spawn `cmd` with inherited stdio and wait for it.
pub fn exec_cmd(cmd: &Command) -> Result<ExitStatus> {
    tracing::debug!("Running `{cmd}`");
    cmd.spawn()?.wait()
}

/// Run `cmd` capturing stdout, retrying non-success exits with
/// exponential backoff (1s, 2s, 4s, ...). The final failure surfaces the
/// captured stderr in the error chain.
pub fn get_cmd_output_with_retry(cmd: &Command, retry: u32) -> Result<String> {
    tracing::trace!("Running `{cmd}`");

    let mut status = ExitStatus::default();
    let mut stderr = String::new();
    let mut wait = 1u64;
    for attempt in 0..retry {
        let out = cmd.output()?;
        if out.status.success() {
            return Ok(out.stdout);
        }
        status = out.status;
        stderr = out.stderr;

        if attempt + 1 < retry {
            std::thread::sleep(Duration::from_secs(wait));
            wait *= 2;
        }
    }

    Err(anyhow::anyhow!("{}", stderr.trim_end().to_string())
        .context(format!("Command `{cmd}` {status}")))
}

/// Run `cmd` capturing stdout with the default retry policy.
pub fn get_cmd_output(cmd: &Command) -> Result<String> {
    get_cmd_output_with_retry(cmd, 3)
}

/// Whether an executable with the given name exists in `PATH`.
pub fn command_exists(name: &str) -> bool {
    which::which(name).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_captures_stdout() {
        let out = Command::new("echo").arg("hello").output().unwrap();
        assert!(out.status.success());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn test_display_command() {
        let cmd = Command::new("g++").args(["-Wall", "-c", "a.cc", "-o", "a.o"]);
        assert_eq!(cmd.to_string(), "g++ -Wall -c a.cc -o a.o");
    }

    #[test]
    fn test_exit_status_display_normal() {
        let st = Command::new("true").spawn().unwrap().wait().unwrap();
        assert!(st.success());
        assert!(st.exited_normally());
        assert_eq!(st.to_string(), "exited with code 0");

        let st = Command::new("false").spawn().unwrap().wait().unwrap();
        assert!(!st.success());
        assert_eq!(st.to_string(), "exited with code 1");
    }

    #[test]
    fn test_exit_status_signal() {
        // The shell kills itself with SIGKILL; the wait status must report it.
        let st = Command::new("sh")
            .args(["-c", "kill -9 $$"])
            .stderr(Io::Null)
            .spawn()
            .unwrap()
            .wait()
            .unwrap();
        assert!(!st.success());
        assert!(st.killed_by_signal());
        assert_eq!(st.term_signal(), Some(9));
        assert!(st.to_string().starts_with("killed by signal 9"));
    }

    #[test]
    fn test_cwd() {
        let tmp = tempfile::TempDir::new().unwrap();
        let out = Command::new("pwd").cwd(tmp.path()).output().unwrap();
        let got = std::fs::canonicalize(out.stdout.trim()).unwrap();
        assert_eq!(got, std::fs::canonicalize(tmp.path()).unwrap());
    }

    #[test]
    fn test_get_cmd_output_failure_carries_stderr() {
        let cmd = Command::new("sh").args(["-c", "echo boom >&2; exit 3"]);
        let err = get_cmd_output_with_retry(&cmd, 1).unwrap_err();
        let rendered = format!("{err:#}");
        assert!(rendered.contains("exited with code 3"));
        assert!(rendered.contains("boom"));
    }

    #[test]
    fn test_command_exists() {
        assert!(command_exists("sh"));
        assert!(!command_exists("definitely-not-a-real-tool-xyz"));
    }
}
