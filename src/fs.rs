//! Filesystem abstraction used by the include driver.
//!
//! The driver only needs two things: open a file for reading, and turn a path that
//! is relative to some directory into the absolute form used as the file's identity.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

pub trait Filesystem {
    /// Open `path` for reading. The reader is dropped as soon as the file is read.
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + '_>>;

    /// Make `path` absolute when relative to the directory `dir`.
    fn absolute(&self, dir: &Path, path: &Path) -> io::Result<PathBuf>;
}

impl<T: Filesystem + ?Sized> Filesystem for &T {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + '_>> {
        (**self).open(path)
    }

    fn absolute(&self, dir: &Path, path: &Path) -> io::Result<PathBuf> {
        (**self).absolute(dir, path)
    }
}

/// The host filesystem. Relative paths resolve against the working directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFilesystem;

impl Filesystem for OsFilesystem {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(File::open(path)?))
    }

    fn absolute(&self, dir: &Path, path: &Path) -> io::Result<PathBuf> {
        let joined = dir.join(path);
        if joined.is_absolute() {
            Ok(clean(&joined))
        } else {
            Ok(clean(&std::env::current_dir()?.join(joined)))
        }
    }
}

/// In-memory sources keyed by absolute path, rooted at `/`.
#[derive(Debug, Clone, Default)]
pub struct MemoryFilesystem {
    files: HashMap<PathBuf, String>,
}

impl MemoryFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a file. Relative paths are taken relative to `/`.
    pub fn insert(&mut self, path: impl AsRef<Path>, source: impl Into<String>) -> &mut Self {
        self.files.insert(rooted(path.as_ref()), source.into());
        self
    }

    pub fn with_file(mut self, path: impl AsRef<Path>, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }
}

impl Filesystem for MemoryFilesystem {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + '_>> {
        match self.files.get(&rooted(path)) {
            Some(source) => Ok(Box::new(source.as_bytes())),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )),
        }
    }

    fn absolute(&self, dir: &Path, path: &Path) -> io::Result<PathBuf> {
        Ok(rooted(&dir.join(path)))
    }
}

fn rooted(path: &Path) -> PathBuf {
    clean(&Path::new("/").join(path))
}

/// Lexically normalise a path: drop `.` components and fold `..` into its parent.
pub(crate) fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}
