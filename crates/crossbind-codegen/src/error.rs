use std::path::PathBuf;

use crossbind_layout::LayoutError;
use crossbind_source::{SourceError, SourceMap};
use crossbind_types::Origin;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Fatal generation-time errors. Each one aborts the run before anything is written.
#[derive(Debug, Error, Diagnostic)]
pub enum CodegenError {
    #[error("{message}")]
    #[diagnostic(
        code("GEN-001"),
        help("This combination of type and position has no lowering yet")
    )]
    Unsupported {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("declared here")]
        span: SourceSpan,
    },

    #[error("Variants of `{function}` taking {arg_count} arguments cannot be told apart")]
    #[diagnostic(code("GEN-002"))]
    AmbiguousOverload {
        function: String,
        arg_count: usize,
        /// Lists the competing signatures.
        #[help]
        variants: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("overloads declared here")]
        span: SourceSpan,
    },

    #[error("Missing binding declaration `{symbol}` in {}", file.display())]
    #[diagnostic(
        code("GEN-003"),
        help("Declare the function in the native source, or fix the variant suffix")
    )]
    MissingImplementation {
        symbol: String,
        file: PathBuf,
        #[source_code]
        src: NamedSource<String>,
        #[label("bound here")]
        span: SourceSpan,
    },

    #[error("Namespace `{namespace}` is defined by both {} and {}", first.display(), second.display())]
    #[diagnostic(
        code("GEN-004"),
        help("Namespaces come from file names; rename one of the definition files")
    )]
    NamespaceCollision {
        namespace: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Cannot find a native source named {file}")]
    #[diagnostic(code("GEN-005"))]
    EnumNotFound {
        file: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("enum declared here")]
        span: SourceSpan,
    },

    #[error("{file} is not specific enough, matches: {candidates}")]
    #[diagnostic(code("GEN-006"), help("Add leading directories to the `file` key"))]
    EnumAmbiguous {
        file: String,
        candidates: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("enum declared here")]
        span: SourceSpan,
    },

    #[error("Failed to extract enum definitions: {message}")]
    #[diagnostic(
        code("GEN-007"),
        help(
            "If you just added a native enum, check its file for top-level comptime blocks; \
             they may need an `export_cpp_apis` guard. Moving the enum to a file of its own \
             also works."
        )
    )]
    EnumExtraction { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Source(#[from] SourceError),

    #[error("Failed to write {}", path.display())]
    #[diagnostic(
        code("GEN-009"),
        help("Make sure the output directory exists and is writable")
    )]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} would be generated twice", path.display())]
    #[diagnostic(code("GEN-010"))]
    DuplicateOutput { path: PathBuf },

    #[error("Invalid enum metadata in {what}")]
    #[diagnostic(code("GEN-011"))]
    Json {
        what: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type CodegenResult<T> = Result<T, CodegenError>;

impl CodegenError {
    pub fn unsupported(sources: &SourceMap, origin: Origin, message: impl Into<String>) -> Self {
        CodegenError::Unsupported {
            message: message.into(),
            src: sources.named_source(origin.file),
            span: origin.span,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CodegenError::Io {
            path: path.into(),
            source,
        }
    }
}
