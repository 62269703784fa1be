//! Atomic whole-file writes: write `{path}.tmp`, then rename into place.
//!
//! Readers see either the previous file or the new one, never a torn write.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

fn tmp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Replace `path` with `contents`, creating parent directories as needed.
pub fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path).map_err(|e| {
        // clean up the temp file; the rename error is what the caller sees
        let _ = fs::remove_file(&tmp);
        e
    })
}
