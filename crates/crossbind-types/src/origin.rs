use miette::SourceSpan;

/// Index of a definition file in the source map of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

/// Where a type, function, variant or argument was declared.
///
/// Captured when the declaration is read, so diagnostics raised much later
/// still point at the declaration rather than at the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Origin {
    pub file: FileId,
    pub span: SourceSpan,
}

impl Origin {
    pub fn new(file: FileId, span: impl Into<SourceSpan>) -> Self {
        Self {
            file,
            span: span.into(),
        }
    }
}
