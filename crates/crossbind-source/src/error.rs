use std::path::PathBuf;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Errors raised while reading definition files and project configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum SourceError {
    #[error("Failed to read {}", path.display())]
    #[diagnostic(
        code("DEF-001"),
        help("Make sure the path exists and has proper permissions")
    )]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to scan source tree at {}", root.display())]
    #[diagnostic(code("DEF-002"))]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Invalid definition file: {message}")]
    #[diagnostic(
        code("DEF-003"),
        help("Definition files are TOML documents with `[types.*]` and `[functions.*]` tables")
    )]
    Parse {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: Option<SourceSpan>,
    },

    #[error("Invalid project configuration in {}: {message}", path.display())]
    #[diagnostic(code("DEF-004"), help("Check the syntax of crossbind.toml"))]
    Config { path: PathBuf, message: String },

    #[error("Unknown type `{name}`")]
    #[diagnostic(
        code("DEF-005"),
        help("Use a builtin kind, a type declared in this file, or `namespace::Name`")
    )]
    UnknownType {
        name: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("referenced here")]
        span: SourceSpan,
    },

    #[error("Type `{name}` is declared twice in namespace `{namespace}`")]
    #[diagnostic(code("DEF-006"))]
    DuplicateType {
        name: String,
        namespace: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("second declaration")]
        span: SourceSpan,
    },

    #[error("This function definition needs a name")]
    #[diagnostic(
        code("DEF-007"),
        help("Every function is exported under its table key; empty keys are not allowed")
    )]
    UnnamedFunction {
        #[source_code]
        src: NamedSource<String>,
        #[label("declared here")]
        span: SourceSpan,
    },

    #[error("Type `{name}` refers to itself")]
    #[diagnostic(code("DEF-008"))]
    RecursiveType {
        name: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("cycle starts here")]
        span: SourceSpan,
    },

    #[error("{message}")]
    #[diagnostic(code("DEF-009"))]
    InvalidDefinition {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("in this declaration")]
        span: SourceSpan,
    },

    #[error("Native source {} does not exist", path.display())]
    #[diagnostic(
        code("DEF-010"),
        help("Each `name.bind.toml` is implemented by a `name.zig` next to it")
    )]
    MissingNativeSource {
        path: PathBuf,
        #[source_code]
        src: NamedSource<String>,
        #[label("definitions declared here")]
        span: SourceSpan,
    },
}

pub type SourceResult<T> = Result<T, SourceError>;
