/*
 * fs.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * File-system collaborator used to read templates and write documents.
 */

//! File access for builds.
//!
//! Builds never touch `std::fs` directly; they go through [`FileSystem`] so
//! a build can run against an in-memory tree ([`MemoryFileSystem`]) for
//! tests and dry runs.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// File operations needed by a build.
pub trait FileSystem: Send + Sync {
    /// Read a file as UTF-8 text.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Create a directory and all missing parents.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Write a file, replacing any existing content.
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;
}

/// The real file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeFileSystem;

impl FileSystem for NativeFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        std::fs::write(path, contents)
    }
}

/// An in-memory file tree.
///
/// Writing requires the parent directory to have been created, like the
/// native file system.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: Mutex<BTreeMap<PathBuf, String>>,
    dirs: Mutex<BTreeSet<PathBuf>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file (and its parent directories).
    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.insert(path, contents);
        self
    }

    /// Add a file (and its parent directories).
    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        let path = path.into();
        if let Some(parent) = path.parent() {
            self.add_dirs(parent);
        }
        lock(&self.files).insert(path, contents.into());
    }

    /// Current content of a file.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        lock(&self.files).get(path.as_ref()).cloned()
    }

    /// All file paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        lock(&self.files).keys().cloned().collect()
    }

    pub fn is_dir(&self, path: impl AsRef<Path>) -> bool {
        lock(&self.dirs).contains(path.as_ref())
    }

    fn add_dirs(&self, path: &Path) {
        let mut dirs = lock(&self.dirs);
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            dirs.insert(ancestor.to_path_buf());
        }
    }
}

impl FileSystem for MemoryFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.get(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )
        })
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.add_dirs(path);
        Ok(())
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !self.is_dir(parent) {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("directory {} does not exist", parent.display()),
                ));
            }
        }
        lock(&self.files).insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_write() {
        let fs = MemoryFileSystem::new().with_file("src/a.rhtml", "<p>a</p>");
        assert_eq!(fs.read_to_string(Path::new("src/a.rhtml")).unwrap(), "<p>a</p>");
        assert!(fs.is_dir("src"));

        let err = fs.read_to_string(Path::new("missing")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_memory_write_requires_parent_dir() {
        let fs = MemoryFileSystem::new();
        let out = Path::new("build/en/index.html");
        assert!(fs.write(out, "x").is_err());

        fs.create_dir_all(Path::new("build/en")).unwrap();
        fs.write(out, "x").unwrap();
        assert_eq!(fs.get(out).as_deref(), Some("x"));
        assert!(fs.is_dir("build"));
    }

    #[test]
    fn test_native_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        let fs = NativeFileSystem;
        fs.create_dir_all(&nested).unwrap();
        fs.write(&nested.join("page.html"), "<html></html>").unwrap();
        assert_eq!(
            fs.read_to_string(&nested.join("page.html")).unwrap(),
            "<html></html>"
        );
    }
}
