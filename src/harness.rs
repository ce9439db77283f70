// src/harness.rs

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use regex::Regex;
use tracing::{debug, warn};

/// First stderr line printed when the filesystem fails to start
pub const DAEMON_ERROR_LINE: &str = "cannot start the filesystem daemon";

/// Flags understood by the filesystem executable, rendered Go-style
/// (`-uid 1234`, `-allow-nonempty`).
#[derive(Debug, Clone, Default)]
pub struct MountFlags {
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub allow_nonempty: bool,
    pub log_level: Option<String>,
    pub help: bool,
    /// Passed through verbatim, before the positional arguments
    pub extra: Vec<String>,
}

impl MountFlags {
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(uid) = self.uid {
            args.extend(["-uid".to_string(), uid.to_string()]);
        }
        if let Some(gid) = self.gid {
            args.extend(["-gid".to_string(), gid.to_string()]);
        }
        if self.allow_nonempty {
            args.push("-allow-nonempty".to_string());
        }
        if let Some(level) = &self.log_level {
            args.extend(["-log-level".to_string(), level.clone()]);
        }
        if self.help {
            args.push("-help".to_string());
        }
        args.extend(self.extra.iter().cloned());
        args
    }
}

/// The filesystem executable under test
#[derive(Debug, Clone)]
pub struct FsBinary {
    path: PathBuf,
}

impl FsBinary {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FsBinary { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn usage_line(&self) -> String {
        format!("Usage: {} <repo-dir> <mount-dir>", self.path.display())
    }

    pub fn is_usage_line(&self, line: &str) -> bool {
        line.trim() == self.usage_line()
    }

    /// Runs the executable and waits for it to exit. Either positional
    /// argument may be left out to exercise argument errors. A successful
    /// mount is unmounted when the returned guard is dropped.
    pub fn mount(
        &self,
        repo: Option<&Path>,
        mount_point: Option<&Path>,
        flags: &MountFlags,
    ) -> io::Result<MountProcess> {
        let mut command = Command::new(&self.path);
        command.args(flags.to_args());
        if let Some(repo) = repo {
            command.arg(repo);
        }
        if let Some(mount_point) = mount_point {
            command.arg(mount_point);
        }
        debug!(?command, "running filesystem");

        let output = command.output()?;
        Ok(MountProcess {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            mount_point: mount_point.map(Path::to_path_buf),
            unmount: true,
        })
    }
}

/// Outcome of one run of the filesystem executable
#[derive(Debug)]
pub struct MountProcess {
    /// Exit code, `None` if killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    mount_point: Option<PathBuf>,
    unmount: bool,
}

impl MountProcess {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Leaves the filesystem mounted when the guard goes away.
    pub fn keep_mounted(mut self) -> Self {
        self.unmount = false;
        self
    }

    /// Unmounts now instead of on drop.
    pub fn unmount(mut self) -> io::Result<()> {
        self.unmount = false;
        self.run_umount()
    }

    fn run_umount(&self) -> io::Result<()> {
        let Some(mount_point) = self.mount_point.as_deref().filter(|_| self.success()) else {
            return Ok(());
        };
        let status = Command::new("umount").arg(mount_point).status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::Other,
                format!("umount {} exited with {status}", mount_point.display()),
            ))
        }
    }
}

impl Drop for MountProcess {
    fn drop(&mut self) {
        if self.unmount {
            if let Err(e) = self.run_umount() {
                warn!(error = %e, "failed to unmount filesystem");
            }
        }
    }
}

/// Whether `stderr` is a daemon start failure whose detail line matches
/// `pattern` at its start.
pub fn is_filesystem_error(stderr: &str, pattern: &Regex) -> bool {
    let mut lines = stderr.lines();
    match (lines.next(), lines.next()) {
        (Some(first), Some(second)) => {
            first.trim() == DAEMON_ERROR_LINE && pattern.find(second).map_or(false, |m| m.start() == 0)
        }
        _ => false,
    }
}
