use std::path::PathBuf;

use crossbind_codegen::CodegenError;
use crossbind_source::SourceError;
use miette::Diagnostic;
use thiserror::Error;

/// Everything the `crossbind` binary reports before exiting unsuccessfully.
#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("Source root {} is not a directory", path.display())]
    #[diagnostic(
        code(crossbind::cli::source_root),
        help("Pass the directory holding the *.bind.toml files with --source-root")
    )]
    SourceRootNotFound { path: PathBuf },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] SourceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Generation(#[from] CodegenError),
}
