//! Detaching from the terminal
//!
//! Classic double fork: the original process waits on a pipe until the
//! detached grandchild reports that it is up, then exits 0 (or 1 if the pipe
//! closes without a report). The grandchild runs in its own session with
//! stdin on `/dev/null` and stdout/stderr on the log file.

use std::fs::{File, OpenOptions};
use std::os::fd::OwnedFd;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use nix::unistd::{chdir, fork, pipe, read, setsid, write, ForkResult};
use tokenkeeper_domain::{KeeperError, Result};

/// Make `path` absolute against the current directory.
///
/// Run before detaching, since the daemon changes to `/`.
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|e| KeeperError::io("cannot determine current directory", &e))?;
    Ok(cwd.join(path))
}

/// Open the daemon log: created if missing, emptied, then appended to.
pub fn open_log_file(path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| KeeperError::io(format!("cannot open log file {}", path.display()), &e))?;
    file.set_len(0)
        .map_err(|e| KeeperError::io(format!("cannot truncate log file {}", path.display()), &e))?;
    Ok(file)
}

/// Handle held by the detached process until start-up has finished
#[derive(Debug)]
pub struct DetachedProcess {
    ready: OwnedFd,
}

impl DetachedProcess {
    /// Release the waiting parent with exit status 0.
    pub fn notify_ready(self) -> Result<()> {
        write(&self.ready, &[1u8])
            .map_err(|e| KeeperError::Io(format!("cannot notify parent process: {e}")))?;
        Ok(())
    }
}

/// Detach into the background, writing all further output to `log`.
///
/// Only the detached grandchild returns. Must be called while the process is
/// single-threaded: no async runtime may be alive.
pub fn daemonize(log: &File) -> Result<DetachedProcess> {
    let (read_end, write_end) =
        pipe().map_err(|e| KeeperError::Io(format!("cannot create pipe: {e}")))?;

    // SAFETY: the caller guarantees no other threads are running, so the
    // child starts with a consistent copy of the process state.
    match unsafe { fork() }.map_err(|e| KeeperError::Io(format!("first fork failed: {e}")))? {
        ForkResult::Parent { .. } => {
            drop(write_end);
            let mut buf = [0u8; 1];
            match read(&read_end, &mut buf) {
                Ok(1) if buf[0] == 1 => std::process::exit(0),
                _ => {
                    eprintln!("tokenkeeper: daemon failed to start, see the log file");
                    std::process::exit(1);
                }
            }
        }
        ForkResult::Child => drop(read_end),
    }

    setsid().map_err(|e| KeeperError::Io(format!("setsid failed: {e}")))?;

    // SAFETY: still single-threaded, see above.
    match unsafe { fork() }.map_err(|e| KeeperError::Io(format!("second fork failed: {e}")))? {
        ForkResult::Parent { .. } => std::process::exit(0),
        ForkResult::Child => {}
    }

    chdir("/").map_err(|e| KeeperError::Io(format!("cannot change to /: {e}")))?;

    let dev_null = File::open("/dev/null").map_err(|e| KeeperError::io("cannot open /dev/null", &e))?;
    // SAFETY: both descriptors are open and owned by this process; dup2 only
    // replaces the standard descriptors 0, 1 and 2.
    let redirected = unsafe {
        libc::dup2(dev_null.as_raw_fd(), 0) != -1
            && libc::dup2(log.as_raw_fd(), 1) != -1
            && libc::dup2(log.as_raw_fd(), 2) != -1
    };
    if !redirected {
        return Err(KeeperError::Io(format!(
            "cannot redirect standard streams: {}",
            std::io::Error::last_os_error()
        )));
    }

    tracing::info!(event = "daemon.detached", pid = std::process::id());
    Ok(DetachedProcess { ready: write_end })
}
