//! # thriftidl — Thrift IDL parser with includes and templates
//!
//! Parses the Thrift interface definition language into a typed AST, follows
//! `include` statements to build the closed set of files reachable from an entry
//! file, and expands parametric struct templates into concrete structs.
//!
//! ## Pipeline
//!
//! - **Grammar engine** ([`parse`], [`parse_with_options`]): one source text to one [`Thrift`]
//! - **Include driver** ([`Parser::parse_file`]): entry path to a map of canonical path -> [`Thrift`]
//! - **Template engine** ([`render_templates`], [`Parser::render_templates`]): materialises
//!   every `Template<Args..>` reference as a struct named `Template__Arg0__Arg1`
//!
//! ## Example IDL
//!
//! ```text
//! include "shared.thrift"
//! namespace go example
//!
//! template Pair<K, V> {
//!   1: optional K key;
//!   2: optional V value;
//! }
//!
//! struct Lookup {
//!   1: required list<Pair<string, i32>> entries
//! }
//!
//! service Directory extends shared.Base {
//!   Pair<string, i32> find(1: string key) throws (1: shared.NotFound missing)
//! }
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use thriftidl::Parser;
//!
//! let mut parser = Parser::new();
//! let (_files, entry) = parser.parse_file("service.thrift")?;
//! let parser = parser.render_templates()?;
//! let root = &parser.files()[&entry];
//! println!("{} structs", root.structs.len());
//! # Ok::<(), thriftidl::Error>(())
//! ```

pub mod ast;
pub mod driver;
pub mod error;
pub mod fs;
pub mod options;
pub mod parser;
pub mod templates;

pub use ast::{
    Annotation, ConstValue, Constant, Enum, EnumValue, Field, KeyValue, Method, Pos, SEnum,
    SEnumValue, Service, Struct, TemplateDef, TemplateInstance, Thrift, Type, Typedef,
};
pub use driver::{FileMap, Parser};
pub use error::{Error, Result, SyntaxError};
pub use fs::{Filesystem, MemoryFilesystem, OsFilesystem};
pub use options::ParseOptions;
pub use parser::{parse, parse_with_options};
pub use templates::render as render_templates;
