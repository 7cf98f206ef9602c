//! Hosting process lifecycle
//!
//! The watcher runs the site's entry point as a child process. A restart
//! stops that child and exits with status 0; bringing the process back is
//! left to the external supervisor.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Mutex;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::paths::{find_path_from, PathMode};
use crate::{Error, Result};

/// How often a launched entry process is checked for exit
const ENTRY_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Why the process is being restarted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartReason {
    /// A fresh clone was made
    Cloned,
    /// Pulled changes include code files
    CodeChanged {
        /// Changed code files
        files: Vec<String>,
    },
    /// A pull merged but its changed files could not be determined
    UnclassifiedUpdate {
        /// Why change detection failed
        reason: String,
    },
}

/// Terminates the hosting process
pub trait ProcessLifecycle: Send + Sync {
    /// Stop the process so the supervisor relaunches it with the new code
    fn restart(&self, reason: &RestartReason);
}

/// Locate the application entry point, first candidate wins
pub fn locate_entry<S: AsRef<str>>(root: &Path, candidates: &[S]) -> Result<PathBuf> {
    find_path_from(root, candidates, PathMode::Exact)
}

enum EntryState {
    NotLaunched,
    Running,
    Exited(ExitStatus),
}

/// A launched entry point and the process group it leads
#[derive(Debug)]
struct EntryChild {
    child: Child,
    group: Option<u32>,
}

/// The real hosting process, optionally owning the launched entry point
#[derive(Debug, Default)]
pub struct HostProcess {
    entry: Mutex<Option<EntryChild>>,
}

impl HostProcess {
    /// Create a host process with no entry point running
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch `launcher... entry` with `cwd` as working directory
    pub fn launch_entry(&self, launcher: &[String], entry: &Path, cwd: &Path) -> Result<()> {
        let Some((program, args)) = launcher.split_first() else {
            return Err(Error::Config("Entry launcher command is empty".to_string()));
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .arg(entry)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        // Launchers such as `npx` run the server as a grandchild; a group of
        // its own lets a restart stop all of them.
        #[cfg(unix)]
        command.process_group(0);

        let child = command
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::Config(format!("Entry launcher '{}' not found", program))
                } else {
                    Error::Io(e)
                }
            })?;

        info!(entry = %entry.display(), pid = ?child.id(), "Launched entry point");

        let mut slot = self
            .entry
            .lock()
            .map_err(|_| Error::Other("Entry process lock poisoned".to_string()))?;
        let group = if cfg!(unix) { child.id() } else { None };
        *slot = Some(EntryChild { child, group });
        Ok(())
    }

    /// Resolve once the launched entry point exits
    ///
    /// Never resolves when nothing was launched.
    pub async fn entry_exited(&self) -> ExitStatus {
        loop {
            match self.poll_entry() {
                EntryState::Exited(status) => return status,
                EntryState::NotLaunched => std::future::pending::<()>().await,
                EntryState::Running => tokio::time::sleep(ENTRY_POLL_INTERVAL).await,
            }
        }
    }

    fn poll_entry(&self) -> EntryState {
        let Ok(mut slot) = self.entry.lock() else {
            return EntryState::NotLaunched;
        };

        let Some(entry) = slot.as_mut() else {
            return EntryState::NotLaunched;
        };

        match entry.child.try_wait() {
            Ok(Some(status)) => {
                slot.take();
                EntryState::Exited(status)
            }
            Ok(None) => EntryState::Running,
            Err(e) => {
                warn!(error = %e, "Failed to poll entry process");
                EntryState::Running
            }
        }
    }

    /// Kill the entry point and every process in its group
    fn stop_entry(&self) {
        let Ok(mut slot) = self.entry.lock() else {
            return;
        };
        let Some(mut entry) = slot.take() else {
            return;
        };

        if let Some(group) = entry.group {
            if kill_group(group) {
                return;
            }
        }

        if let Err(e) = entry.child.start_kill() {
            warn!(error = %e, "Failed to stop entry process");
        }
    }
}

impl ProcessLifecycle for HostProcess {
    fn restart(&self, reason: &RestartReason) {
        match reason {
            RestartReason::Cloned => info!("Repository cloned, restarting"),
            RestartReason::CodeChanged { files } => {
                info!(files = ?files, "Code files updated, restarting")
            }
            RestartReason::UnclassifiedUpdate { reason } => {
                warn!(%reason, "Update merged but changes unknown, restarting")
            }
        }

        self.stop_entry();
        std::process::exit(0);
    }
}

/// Send SIGKILL to a process group, returning whether the signal was delivered
#[cfg(unix)]
#[allow(unsafe_code)]
fn kill_group(group: u32) -> bool {
    let Ok(pgid) = libc::pid_t::try_from(group) else {
        return false;
    };

    // SAFETY: killpg only sends a signal; no memory is shared with the callee
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
        return true;
    }

    warn!(
        group,
        error = %std::io::Error::last_os_error(),
        "Failed to stop entry process group"
    );
    false
}

#[cfg(not(unix))]
fn kill_group(_group: u32) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_locate_entry_prefers_first_candidate() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("src/index.ts"), "").unwrap();
        fs::write(temp.path().join("src/main.ts"), "").unwrap();

        let entry = locate_entry(temp.path(), &["src/index.ts", "src/main.ts"]).unwrap();
        assert_eq!(entry, temp.path().join("src/index.ts"));
    }

    #[test]
    fn test_locate_entry_missing() {
        let temp = TempDir::new().unwrap();
        let err = locate_entry(temp.path(), &["src/.redeploy-none.ts"]).unwrap_err();
        assert!(matches!(err, Error::PathNotFound { .. }));
    }

    #[tokio::test]
    async fn test_empty_launcher_rejected() {
        let host = HostProcess::new();
        let result = host.launch_entry(&[], Path::new("src/index.ts"), Path::new("."));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_missing_launcher_rejected() {
        let host = HostProcess::new();
        let launcher = vec!["/nonexistent/redeploy-launcher".to_string()];
        let result = host.launch_entry(&launcher, Path::new("src/index.ts"), Path::new("."));
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_entry_exit_is_observed() {
        let temp = TempDir::new().unwrap();
        let entry = temp.path().join("entry.sh");
        fs::write(&entry, "exit 3\n").unwrap();

        let host = HostProcess::new();
        host.launch_entry(&["sh".to_string()], &entry, temp.path()).unwrap();

        let status = host.entry_exited().await;
        assert_eq!(status.code(), Some(3));
    }

    /// Whether `pid` no longer runs (gone, or a zombie awaiting reaping)
    #[cfg(target_os = "linux")]
    fn process_gone(pid: u32) -> bool {
        match fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Err(_) => true,
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .map(|rest| rest.trim_start().starts_with('Z'))
                .unwrap_or(false),
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_stop_entry_kills_backgrounded_children() {
        let temp = TempDir::new().unwrap();
        let pid_file = temp.path().join("server.pid");
        let entry = temp.path().join("entry.sh");
        fs::write(
            &entry,
            format!("sleep 30 &\necho $! > {}\nwait\n", pid_file.display()),
        )
        .unwrap();

        let host = HostProcess::new();
        host.launch_entry(&["sh".to_string()], &entry, temp.path()).unwrap();

        let mut server_pid = None;
        for _ in 0..100 {
            if let Ok(contents) = fs::read_to_string(&pid_file) {
                if let Ok(pid) = contents.trim().parse::<u32>() {
                    server_pid = Some(pid);
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        let server_pid = server_pid.expect("entry script never started its server");
        assert!(!process_gone(server_pid));

        host.stop_entry();

        let mut gone = false;
        for _ in 0..100 {
            if process_gone(server_pid) {
                gone = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(gone, "backgrounded server {} survived stop_entry", server_pid);
    }
}
