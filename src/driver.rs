//! Include resolution: parse an entry file and every file reachable through its includes.
//!
//! Files are identified by their canonical absolute path. Each file is parsed at most
//! once per [`Parser`]; later calls reuse what earlier calls parsed. A `Parser` is not
//! meant to be shared between threads without external synchronisation.

use crate::ast::Thrift;
use crate::error::{Error, Result};
use crate::fs::{Filesystem, OsFilesystem};
use crate::options::ParseOptions;
use crate::parser::parse_with_options;
use crate::templates;
use log::{debug, info, trace};
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Canonical path -> parsed file. Iterates in path order.
pub type FileMap = BTreeMap<PathBuf, Thrift>;

#[derive(Debug)]
pub struct Parser<F = OsFilesystem> {
    filesystem: F,
    options: ParseOptions,
    files: FileMap,
}

impl Parser<OsFilesystem> {
    /// A parser reading from the host filesystem.
    pub fn new() -> Self {
        Self::with_filesystem(OsFilesystem)
    }
}

impl Default for Parser<OsFilesystem> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Filesystem> Parser<F> {
    pub fn with_filesystem(filesystem: F) -> Self {
        Parser {
            filesystem,
            options: ParseOptions::default(),
            files: FileMap::new(),
        }
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn filesystem(&self) -> &F {
        &self.filesystem
    }

    /// Every file parsed so far.
    pub fn files(&self) -> &FileMap {
        &self.files
    }

    pub fn file(&self, path: &Path) -> Option<&Thrift> {
        self.files.get(path)
    }

    pub fn into_files(self) -> FileMap {
        self.files
    }

    /// Parse `path` and every file it transitively includes.
    ///
    /// Include paths are resolved against the including file's directory and rewritten
    /// in place to their canonical form. Returns all files parsed so far by this parser
    /// together with the canonical entry path. On error nothing from this call is kept.
    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> Result<(&FileMap, PathBuf)> {
        let path = path.as_ref();
        let entry = self
            .filesystem
            .absolute(Path::new(""), path)
            .map_err(|source| Error::Io {
                path: path.to_path_buf(),
                source,
            })?;
        info!(entry:? = entry; "Resolving includes");

        let mut parsed = FileMap::new();
        let mut include_paths: HashMap<String, PathBuf> = HashMap::new();
        let mut pending = vec![entry.clone()];
        while let Some(path) = pending.pop() {
            if self.files.contains_key(&path) || parsed.contains_key(&path) {
                trace!(path:? = path; "Already parsed");
                continue;
            }
            let mut thrift = self.read_file(&path)?;
            let dir = path.parent().unwrap_or_else(|| Path::new(""));
            for (name, include) in thrift.includes.iter_mut() {
                let resolved = self
                    .filesystem
                    .absolute(dir, include.as_path())
                    .map_err(|source| Error::Io {
                        path: dir.join(include.as_path()),
                        source,
                    })?;
                if let Some(first) = include_paths.get(name) {
                    if *first != resolved {
                        return Err(Error::IncludeConflict {
                            name: name.clone(),
                            first: first.clone(),
                            second: resolved,
                        });
                    }
                } else {
                    include_paths.insert(name.clone(), resolved.clone());
                }
                debug!(from:? = path, include:? = resolved; "Resolved include");
                if !self.files.contains_key(&resolved) && !parsed.contains_key(&resolved) {
                    pending.push(resolved.clone());
                }
                *include = resolved;
            }
            parsed.insert(path, thrift);
        }

        info!(new_files = parsed.len(), total_files = self.files.len() + parsed.len(); "Includes resolved");
        self.files.append(&mut parsed);
        Ok((&self.files, entry))
    }

    fn read_file(&self, path: &Path) -> Result<Thrift> {
        let io_error = |source| Error::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut source = String::new();
        self.filesystem
            .open(path)
            .map_err(io_error)?
            .read_to_string(&mut source)
            .map_err(io_error)?;
        debug!(path:? = path, bytes = source.len(); "Parsing file");
        parse_with_options(&path.display().to_string(), &source, &self.options)
    }

    /// Expand every template instance in the parsed files.
    pub fn render_templates(self) -> Result<Self> {
        let Parser {
            filesystem,
            options,
            files,
        } = self;
        let files = templates::render(files)?;
        Ok(Parser {
            filesystem,
            options,
            files,
        })
    }
}
