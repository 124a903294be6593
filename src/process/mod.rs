//! Subprocess supervision: spawn a server, own its stdio, write/read
//! without blocking the caller's poll loop, and terminate it.

#[cfg(unix)]
#[path = "unix.rs"]
mod platform;

#[cfg(windows)]
#[path = "windows.rs"]
mod platform;

use crate::error::{Error, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};

/// Outcome of one non-blocking read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// `n` bytes were appended to the caller's buffer.
    Data(usize),
    /// Nothing was available right now; not an error.
    WouldBlock,
    /// The child closed its write end (exited or crashed).
    Eof,
}

/// Parameters the caller passes to [`Supervisor::spawn`], mirroring the
/// `seek_path_env` bit of [`ConnectParams`](crate::capabilities::ConnectParams).
#[derive(Debug, Clone, Default)]
pub struct SpawnParams<'a> {
    pub args: &'a [String],
    pub current_dir: Option<&'a Path>,
    pub seek_path_env: bool,
}

/// Owns a spawned language server's stdio and process handle.
pub struct Supervisor {
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
    stderr: ChildStderr,
    failed: bool,
}

impl Supervisor {
    /// Spawns `command` with `params`, wiring two anonymous pipes
    /// (stdin/stdout) and multiplexing stderr onto the same inbound
    /// buffer as stdout: both pipes are put in non-blocking mode and
    /// polled together by `read_available`.
    /// Closes the child-side pipe ends in the parent automatically (this
    /// is what `Stdio::piped()` + `Child::stdin/stdout.take()` does for
    /// us: only the parent-side halves remain open here).
    pub fn spawn(command: &str, params: &SpawnParams<'_>) -> Result<Self> {
        let resolved = if params.seek_path_env && is_bare_name(command) {
            resolve_on_path(command)
                .ok_or_else(|| Error::Spawn(not_found_error(command)))?
        } else {
            PathBuf::from(command)
        };

        let mut cmd = Command::new(&resolved);
        cmd.args(params.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = params.current_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn()?;
        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");

        platform::set_nonblocking(&stdout)?;
        platform::set_nonblocking(&stderr)?;

        Ok(Self {
            child,
            stdin,
            stdout,
            stderr,
            failed: false,
        })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Best-effort full write; partial writes are retried until either all
    /// bytes are delivered or the pipe is broken.
    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        match self.stdin.write_all(bytes) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.failed = true;
                Err(Error::Transport(format!("write to child stdin failed: {e}")))
            }
        }
    }

    /// Non-blocking read of whatever bytes are present; never blocks the
    /// caller's polling loop. Stderr is read opportunistically in the same
    /// poll and appended to the same buffer as stdout; its own status
    /// never overrides the one stdout reports, since stdout alone carries
    /// the framed protocol stream and decides session liveness.
    pub fn read_available(&mut self, buf: &mut Vec<u8>) -> Result<ReadStatus> {
        let status = platform::read_available(&mut self.stdout, buf)
            .map_err(|e| Error::Transport(format!("read from child stdout failed: {e}")))?;
        if status == ReadStatus::Eof {
            self.failed = true;
        }
        let _ = platform::read_available(&mut self.stderr, buf);
        Ok(status)
    }

    /// Forcibly ends the child and closes all handles.
    pub fn terminate(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn is_bare_name(command: &str) -> bool {
    !command.contains(std::path::MAIN_SEPARATOR) && !command.contains('/')
}

/// Resolves a bare executable name against `PATH`, using the platform's
/// separator (`;` on Windows, `:` elsewhere).
fn resolve_on_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    let separator = if cfg!(windows) { ';' } else { ':' };
    let path_str = path_var.to_string_lossy();
    for dir in path_str.split(separator) {
        if dir.is_empty() {
            continue;
        }
        let candidate = Path::new(dir).join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        #[cfg(windows)]
        {
            let with_exe = candidate.with_extension("exe");
            if with_exe.is_file() {
                return Some(with_exe);
            }
        }
    }
    None
}

fn not_found_error(command: &str) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("'{command}' not found on PATH"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seek_path_env_returns_none_for_unknown_bare_name() {
        assert!(resolve_on_path("definitely-not-a-real-binary-xyz").is_none());
    }

    #[test]
    fn is_bare_name_rejects_paths() {
        assert!(is_bare_name("rust-analyzer"));
        assert!(!is_bare_name("./rust-analyzer"));
        assert!(!is_bare_name("/usr/bin/rust-analyzer"));
    }
}
