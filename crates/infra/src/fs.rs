//! Owner-only atomic file replacement
//!
//! Session files and token files are written next to their target as
//! `<name>.new` with mode 0600 and renamed over the target, so readers only
//! ever see the old or the new content.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

const OWNER_ONLY: u32 = 0o600;

/// Temporary sibling used while replacing `target`.
#[must_use]
pub fn staging_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".new");
    target.with_file_name(name)
}

/// Replace `target` with `data`, creating it with mode 0600.
pub fn write_atomic(target: &Path, data: &[u8]) -> io::Result<()> {
    let staging = staging_path(target);

    let result = (|| {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(OWNER_ONLY)
            .open(&staging)?;
        // A leftover staging file keeps its old mode through `open`.
        file.set_permissions(fs::Permissions::from_mode(OWNER_ONLY))?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&staging, target)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&staging);
    }
    result
}

/// Remove `path`, treating an absent file as success.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}
