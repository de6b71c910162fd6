//! Single-instance lock using an advisory-locked PID file
//!
//! Prevents two daemons from refreshing (and rotating) the same session.
//! The lock is an exclusive `flock` on the open pidfile, so it disappears
//! with the owning process even if the file is left behind.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tokenkeeper_domain::{KeeperError, Result};

/// Opens of a pidfile that was replaced while being locked
const OPEN_ATTEMPTS: usize = 3;

/// Held pidfile lock; the file is removed when dropped.
#[derive(Debug)]
pub struct PidLock {
    pid_file: PathBuf,
    file: File,
}

enum Attempt {
    Locked(File),
    /// The locked inode is no longer the one at the path.
    Replaced,
}

impl PidLock {
    /// Advisory check that no other process holds the lock.
    ///
    /// Runs before any prompt so a second invocation fails fast. It is
    /// racy by nature; [`Self::acquire`] is authoritative. The probe holds a
    /// shared lock for the duration of one syscall pair, and an `acquire` in
    /// another process landing inside that window reports "already running".
    pub fn check_available(pid_file: &Path) -> Result<()> {
        let file = match File::open(pid_file) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(KeeperError::io(format!("cannot open {}", pid_file.display()), &err)),
        };

        match FileExt::try_lock_shared(&file) {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                Ok(())
            }
            Err(err) if is_contended(&err) => Err(held_by_other(pid_file)),
            Err(err) => Err(KeeperError::io(format!("cannot lock {}", pid_file.display()), &err)),
        }
    }

    /// Take the exclusive lock and record the current pid.
    ///
    /// Fails with a lock error naming the owner if another process holds it.
    pub fn acquire(pid_file: &Path) -> Result<Self> {
        for _ in 0..OPEN_ATTEMPTS {
            let file = open_pidfile(pid_file)?;
            match lock_opened(file, pid_file)? {
                Attempt::Locked(file) => {
                    let mut lock = Self { pid_file: pid_file.to_path_buf(), file };
                    lock.record_current_pid()?;
                    tracing::info!(
                        event = "instance_lock.acquired",
                        pid = std::process::id(),
                        path = %lock.pid_file.display()
                    );
                    return Ok(lock);
                }
                Attempt::Replaced => {
                    tracing::debug!(event = "instance_lock.replaced", path = %pid_file.display());
                }
            }
        }
        Err(held_by_other(pid_file))
    }

    /// Rewrite the pidfile with this process's id (after detaching).
    pub fn record_current_pid(&mut self) -> Result<()> {
        let pid = std::process::id();
        let write = |file: &mut File| -> io::Result<()> {
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            writeln!(file, "{pid}")?;
            file.sync_all()
        };
        write(&mut self.file)
            .map_err(|e| KeeperError::io(format!("cannot write {}", self.pid_file.display()), &e))?;
        tracing::debug!(event = "instance_lock.pid_recorded", pid);
        Ok(())
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        // Unlinked while still locked; a starter that opened this inode
        // earlier sees it replaced and reopens.
        if let Err(e) = fs::remove_file(&self.pid_file) {
            tracing::warn!(event = "instance_lock.remove_pid_failed", error = %e, path = %self.pid_file.display());
        } else {
            tracing::info!(event = "instance_lock.released", path = %self.pid_file.display());
        }
    }
}

fn open_pidfile(pid_file: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .mode(0o644)
        .open(pid_file)
        .map_err(|e| KeeperError::io(format!("cannot open {}", pid_file.display()), &e))
}

/// Lock an opened pidfile and confirm it is still the file at `pid_file`.
fn lock_opened(file: File, pid_file: &Path) -> Result<Attempt> {
    if let Err(err) = FileExt::try_lock_exclusive(&file) {
        if is_contended(&err) {
            return Err(held_by_other(pid_file));
        }
        return Err(KeeperError::io(format!("cannot lock {}", pid_file.display()), &err));
    }

    let opened = file
        .metadata()
        .map_err(|e| KeeperError::io(format!("cannot stat {}", pid_file.display()), &e))?;
    let current = match fs::metadata(pid_file) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Attempt::Replaced),
        Err(err) => return Err(KeeperError::io(format!("cannot stat {}", pid_file.display()), &err)),
    };

    if opened.dev() == current.dev() && opened.ino() == current.ino() {
        Ok(Attempt::Locked(file))
    } else {
        Ok(Attempt::Replaced)
    }
}

fn held_by_other(pid_file: &Path) -> KeeperError {
    let pid = read_pid(pid_file);
    tracing::warn!(event = "instance_lock.process_active", existing_pid = ?pid, path = %pid_file.display());
    KeeperError::already_running(pid, pid_file)
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == fs2::lock_contended_error().kind()
}

fn read_pid(pid_file: &Path) -> Option<u32> {
    fs::read_to_string(pid_file).ok().and_then(|content| content.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_single_instance() {
        let dir = tempdir().unwrap();
        let pid_file = dir.path().join("tokenkeeper.pid");

        // First instance should succeed
        let lock1 = PidLock::acquire(&pid_file).unwrap();
        assert_eq!(read_pid(&pid_file), Some(std::process::id()));

        // Second instance should fail
        let err = PidLock::acquire(&pid_file).unwrap_err();
        assert!(matches!(err, KeeperError::Lock { pid: Some(pid), .. } if pid == std::process::id()));

        // Drop first lock
        drop(lock1);
        assert!(!pid_file.exists());

        // Now second instance should succeed
        let lock3 = PidLock::acquire(&pid_file);
        assert!(lock3.is_ok());
    }

    #[test]
    fn test_precheck_reports_owner_pid() {
        let dir = tempdir().unwrap();
        let pid_file = dir.path().join("tokenkeeper.pid");
        PidLock::check_available(&pid_file).unwrap();

        let _held = PidLock::acquire(&pid_file).unwrap();
        let err = PidLock::check_available(&pid_file).unwrap_err();

        let message = err.to_string();
        assert!(message.contains("already running"));
        assert!(message.contains(&std::process::id().to_string()));
    }

    #[test]
    fn test_unlocked_leftover_pidfile_is_reused() {
        let dir = tempdir().unwrap();
        let pid_file = dir.path().join("tokenkeeper.pid");
        fs::write(&pid_file, "999999\n").unwrap();

        PidLock::check_available(&pid_file).unwrap();
        let _lock = PidLock::acquire(&pid_file).unwrap();
        assert_eq!(read_pid(&pid_file), Some(std::process::id()));
    }

    #[test]
    fn test_starter_holding_released_inode_does_not_win() {
        let dir = tempdir().unwrap();
        let pid_file = dir.path().join("tokenkeeper.pid");

        let first = PidLock::acquire(&pid_file).unwrap();
        let early = open_pidfile(&pid_file).unwrap();
        drop(first);

        // The early opener now locks the unlinked inode, which must not
        // count as holding the pidfile.
        assert!(matches!(lock_opened(early, &pid_file).unwrap(), Attempt::Replaced));

        let _third = PidLock::acquire(&pid_file).unwrap();
        let late = open_pidfile(&pid_file).unwrap();
        let err = lock_opened(late, &pid_file).err().unwrap();
        assert!(matches!(err, KeeperError::Lock { .. }));
    }

    #[test]
    fn test_precheck_leaves_pidfile_lockable() {
        let dir = tempdir().unwrap();
        let pid_file = dir.path().join("tokenkeeper.pid");
        fs::write(&pid_file, "").unwrap();

        let holder = File::open(&pid_file).unwrap();
        FileExt::try_lock_shared(&holder).unwrap();
        // concurrent probes share the lock
        PidLock::check_available(&pid_file).unwrap();
        drop(holder);

        PidLock::check_available(&pid_file).unwrap();
        PidLock::acquire(&pid_file).unwrap();
    }
}
