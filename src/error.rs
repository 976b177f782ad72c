//! Errors raised while parsing, resolving includes and rendering templates.

use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Syntax(#[from] SyntaxError),
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("conflicting includes for {name:?}: {} and {}", .first.display(), .second.display())]
    IncludeConflict {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("Undefined template {0}")]
    UndefinedTemplate(String),
    #[error("Template {template} args mismatch. Expected {expected} args, got {actual}")]
    TemplateArgumentCount {
        template: String,
        expected: usize,
        actual: usize,
    },
    #[error("Template instance {instance} nests its arguments deeper than {limit} levels")]
    TemplateNestingTooDeep { instance: String, limit: usize },
    #[error("Template expansion produced more than {limit} instances")]
    TooManyTemplateInstances { limit: usize },
}

/// Malformed source at a given position. The whole file is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{file}:{line}:{column}: {message}")]
pub struct SyntaxError {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
}
