//! Include driver tests: closure resolution, canonical include paths, memoisation,
//! conflict detection and failure atomicity.

use std::cell::RefCell;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thriftidl::{Error, Filesystem, MemoryFilesystem, ParseOptions, Parser, Pos};

fn layered() -> MemoryFilesystem {
    MemoryFilesystem::new()
        .with_file(
            "idl/main.thrift",
            r#"
include "shared/base.thrift"
include "common.thrift"

struct Main {
  1: base.Base base
  2: common.Common common
}
"#,
        )
        .with_file(
            "idl/shared/base.thrift",
            r#"
include "../common.thrift"

struct Base {
  1: common.Common common
}
"#,
        )
        .with_file("idl/common.thrift", "struct Common { 1: i32 id }")
}

/// Wraps a filesystem and records every path opened.
struct Recording<F> {
    inner: F,
    opened: RefCell<Vec<PathBuf>>,
}

impl<F> Recording<F> {
    fn new(inner: F) -> Self {
        Recording {
            inner,
            opened: RefCell::new(Vec::new()),
        }
    }

    fn opened(&self) -> Vec<PathBuf> {
        self.opened.borrow().clone()
    }
}

impl<F: Filesystem> Filesystem for Recording<F> {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + '_>> {
        self.opened.borrow_mut().push(path.to_path_buf());
        self.inner.open(path)
    }

    fn absolute(&self, dir: &Path, path: &Path) -> io::Result<PathBuf> {
        self.inner.absolute(dir, path)
    }
}

#[test]
fn parse_file_resolves_include_closure() {
    let mut parser = Parser::with_filesystem(layered());
    let (files, entry) = parser.parse_file("idl/main.thrift").expect("parse_file");
    assert_eq!(entry, PathBuf::from("/idl/main.thrift"));

    let keys: Vec<&Path> = files.keys().map(PathBuf::as_path).collect();
    assert_eq!(
        keys,
        [
            Path::new("/idl/common.thrift"),
            Path::new("/idl/main.thrift"),
            Path::new("/idl/shared/base.thrift"),
        ]
    );

    let main = &files[&entry];
    assert_eq!(main.includes["base"], PathBuf::from("/idl/shared/base.thrift"));
    assert_eq!(main.includes["common"], PathBuf::from("/idl/common.thrift"));
    let base = &files[Path::new("/idl/shared/base.thrift")];
    assert_eq!(base.includes["common"], PathBuf::from("/idl/common.thrift"));
    assert!(files[Path::new("/idl/common.thrift")].includes.is_empty());
}

#[test]
fn parse_file_records_filename() {
    let mut parser = Parser::with_filesystem(layered());
    let (files, entry) = parser.parse_file("idl/main.thrift").expect("parse_file");
    assert_eq!(files[&entry].filename, "/idl/main.thrift");
}

#[test]
fn parse_file_parses_each_file_once() {
    let fs = Recording::new(layered());
    let mut parser = Parser::with_filesystem(&fs);
    parser.parse_file("idl/main.thrift").expect("first parse");
    let mut opened = fs.opened();
    opened.sort();
    assert_eq!(
        opened,
        [
            PathBuf::from("/idl/common.thrift"),
            PathBuf::from("/idl/main.thrift"),
            PathBuf::from("/idl/shared/base.thrift"),
        ]
    );

    let before = parser.files().clone();
    let (files, _) = parser.parse_file("/idl/main.thrift").expect("second parse");
    assert_eq!(files, &before);
    assert_eq!(fs.opened().len(), 3, "memoised files are not reopened");

    // A new entry that shares a dependency only reads the new file.
    parser.parse_file("idl/shared/base.thrift").expect("already known");
    assert_eq!(fs.opened().len(), 3);
}

#[test]
fn parse_file_reuses_files_across_entries() {
    let fs = Recording::new(layered().with_file(
        "idl/extra.thrift",
        "include \"common.thrift\"\nstruct Extra { 1: common.Common c }",
    ));
    let mut parser = Parser::with_filesystem(&fs);
    parser.parse_file("idl/main.thrift").expect("main");
    let (files, entry) = parser.parse_file("idl/extra.thrift").expect("extra");
    assert_eq!(entry, PathBuf::from("/idl/extra.thrift"));
    assert_eq!(files.len(), 4);
    assert_eq!(fs.opened().last(), Some(&PathBuf::from("/idl/extra.thrift")));
    assert_eq!(fs.opened().len(), 4);
}

#[test]
fn parse_file_handles_include_cycles() {
    let fs = MemoryFilesystem::new()
        .with_file("a.thrift", "include \"b.thrift\"\nstruct A { 1: optional b.B b }")
        .with_file("b.thrift", "include \"a.thrift\"\nstruct B { 1: optional a.A a }");
    let mut parser = Parser::with_filesystem(fs);
    let (files, _) = parser.parse_file("a.thrift").expect("cycle");
    assert_eq!(files.len(), 2);
    assert_eq!(files[Path::new("/b.thrift")].includes["a"], PathBuf::from("/a.thrift"));
}

#[test]
fn parse_file_detects_conflicting_include_names() {
    let fs = MemoryFilesystem::new()
        .with_file("idl/main.thrift", "include \"a/types.thrift\"\ninclude \"b/other.thrift\"\n")
        .with_file("idl/a/types.thrift", "struct T {}")
        .with_file("idl/b/other.thrift", "include \"../c/types.thrift\"\n")
        .with_file("idl/c/types.thrift", "struct T {}");
    let mut parser = Parser::with_filesystem(fs);
    let err = parser.parse_file("idl/main.thrift").expect_err("conflict");
    match &err {
        Error::IncludeConflict { name, first, second } => {
            assert_eq!(name, "types");
            let mut paths = [first.clone(), second.clone()];
            paths.sort();
            assert_eq!(
                paths,
                [PathBuf::from("/idl/a/types.thrift"), PathBuf::from("/idl/c/types.thrift")]
            );
        }
        other => panic!("expected include conflict, got {:?}", other),
    }
    assert!(parser.files().is_empty(), "failed resolution keeps nothing");
}

#[test]
fn parse_file_same_name_same_file_is_not_a_conflict() {
    let fs = MemoryFilesystem::new()
        .with_file("idl/main.thrift", "include \"sub/x.thrift\"\ninclude \"common.thrift\"\n")
        .with_file("idl/sub/x.thrift", "include \"../common.thrift\"\n")
        .with_file("idl/common.thrift", "");
    let mut parser = Parser::with_filesystem(fs);
    let (files, _) = parser.parse_file("idl/main.thrift").expect("same target");
    assert_eq!(files.len(), 3);
}

#[test]
fn parse_file_missing_include_is_io_error() {
    let fs = MemoryFilesystem::new().with_file("idl/main.thrift", "include \"missing.thrift\"\n");
    let mut parser = Parser::with_filesystem(fs);
    let err = parser.parse_file("idl/main.thrift").expect_err("missing include");
    match &err {
        Error::Io { path, source } => {
            assert_eq!(path, &PathBuf::from("/idl/missing.thrift"));
            assert_eq!(source.kind(), io::ErrorKind::NotFound);
        }
        other => panic!("expected io error, got {:?}", other),
    }
    assert!(err.to_string().contains("missing.thrift"));
    assert!(parser.files().is_empty());
}

#[test]
fn parse_file_missing_entry_is_io_error() {
    let mut parser = Parser::with_filesystem(MemoryFilesystem::new());
    let err = parser.parse_file("nope.thrift").expect_err("missing entry");
    assert!(matches!(err, Error::Io { .. }), "{:?}", err);
}

#[test]
fn parse_file_syntax_error_in_include_aborts() {
    let fs = MemoryFilesystem::new()
        .with_file("idl/main.thrift", "include \"bad.thrift\"\nstruct Ok {}")
        .with_file("idl/bad.thrift", "struct Broken {\n  1: i32\n}");
    let mut parser = Parser::with_filesystem(fs);
    let err = parser.parse_file("idl/main.thrift").expect_err("syntax error");
    match &err {
        Error::Syntax(e) => assert_eq!(e.file, "/idl/bad.thrift"),
        other => panic!("expected syntax error, got {:?}", other),
    }
    assert!(parser.files().is_empty(), "main.thrift is not kept either");
}

#[test]
fn parse_file_keeps_earlier_results_after_failure() {
    let fs = layered().with_file("idl/broken.thrift", "include \"common.thrift\"\nstruct {");
    let mut parser = Parser::with_filesystem(fs);
    parser.parse_file("idl/main.thrift").expect("main");
    parser.parse_file("idl/broken.thrift").expect_err("broken");
    assert_eq!(parser.files().len(), 3);
    assert!(parser.file(Path::new("/idl/broken.thrift")).is_none());
}

#[test]
fn parse_file_applies_options() {
    let options = ParseOptions::new().with_positions(false);
    let mut parser = Parser::with_filesystem(layered()).with_options(options);
    assert_eq!(parser.options(), &options);
    let (files, entry) = parser.parse_file("idl/main.thrift").expect("parse_file");
    assert_eq!(files[&entry].structs["Main"].pos, Pos::default());

    let mut parser = Parser::with_filesystem(layered());
    let (files, entry) = parser.parse_file("idl/main.thrift").expect("parse_file");
    assert_eq!(files[&entry].structs["Main"].pos, Pos { line: 5, col: 1 });
}

#[test]
fn parse_file_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("shared")).expect("mkdir");
    std::fs::write(
        dir.path().join("service.thrift"),
        "include \"shared/types.thrift\"\nservice Echo { types.Msg echo(1: types.Msg m) }\n",
    )
    .expect("write service");
    std::fs::write(
        dir.path().join("shared/types.thrift"),
        "struct Msg { 1: string body }\n",
    )
    .expect("write types");

    let mut parser = Parser::new();
    let (files, entry) = parser
        .parse_file(dir.path().join("service.thrift"))
        .expect("parse_file");
    assert_eq!(entry, dir.path().join("service.thrift"));
    let types = dir.path().join("shared").join("types.thrift");
    assert_eq!(files[&entry].includes["types"], types);
    assert!(files[&types].structs.contains_key("Msg"));

    let files = parser.into_files();
    assert_eq!(files.len(), 2);
}
