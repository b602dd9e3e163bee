//! Storage backends for research state files.
//!
//! `StorageBackend` abstracts the raw byte I/O so the retrying state store can
//! be exercised against failing backends. `FsBackend` is the real filesystem
//! implementation, with optional atomic writes (write to `.tmp`, then rename).

use std::io;
use std::path::{Path, PathBuf};

/// Raw byte storage used by the state store.
pub trait StorageBackend: Send + Sync {
    /// Replace the content at `path` with `data`.
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// Read the full content at `path`.
    fn read(&self, path: &Path) -> io::Result<String>;

    /// Paths of the entries directly under `dir`. A missing `dir` lists as empty.
    fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Filesystem-backed storage.
#[derive(Debug, Clone, Copy)]
pub struct FsBackend {
    atomic: bool,
}

impl FsBackend {
    pub fn new(atomic: bool) -> Self {
        Self { atomic }
    }

    pub fn is_atomic(&self) -> bool {
        self.atomic
    }
}

impl Default for FsBackend {
    fn default() -> Self {
        Self::new(true)
    }
}

impl StorageBackend for FsBackend {
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        if self.atomic {
            atomic_write(path, data)
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, data)
        }
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries.map(|e| e.map(|e| e.path())).collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

/// Atomically write raw bytes to a file.
///
/// Writes to a `.tmp` sibling file, then renames to the target path.
/// Creates parent directories if they don't exist.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
