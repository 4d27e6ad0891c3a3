use std::path::{Path, PathBuf};

use fxhash::FxHashSet;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{SourceError, SourceResult};

lazy_static! {
    static ref FUNCTION: Regex = Regex::new(r"\bfn\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap();
    static ref CONTAINER: Regex =
        Regex::new(r"\bconst\s+([A-Za-z_][A-Za-z0-9_]*)\s*=\s*struct\b").unwrap();
}

/// Declarations found in a hand-written native source file.
///
/// This is a lexical scan, not a parse: it is only used to report a missing
/// implementation early, with the definition that expects it.
#[derive(Debug, Clone, Default)]
pub struct NativeSource {
    path: PathBuf,
    functions: FxHashSet<String>,
    containers: FxHashSet<String>,
}

impl NativeSource {
    pub fn parse(path: impl Into<PathBuf>, contents: &str) -> Self {
        let functions = FUNCTION
            .captures_iter(contents)
            .map(|c| c[1].to_string())
            .collect();
        let containers = CONTAINER
            .captures_iter(contents)
            .map(|c| c[1].to_string())
            .collect();
        Self {
            path: path.into(),
            functions,
            containers,
        }
    }

    /// Reads `root/relative` and indexes it under `relative`.
    pub fn scan(root: &Path, relative: &Path) -> SourceResult<Self> {
        let full = root.join(relative);
        let contents = std::fs::read_to_string(&full).map_err(|source| SourceError::Io {
            path: full,
            source,
        })?;
        Ok(Self::parse(relative, &contents))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn declares_function(&self, name: &str) -> bool {
        self.functions.contains(name)
    }

    pub fn declares_container(&self, name: &str) -> bool {
        self.containers.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_functions_and_containers() {
        let source = NativeSource::parse(
            "node/fs.zig",
            r#"
const std = @import("std");
pub const Bindings = struct {
    pub fn readFile1(global: *JSC.JSGlobalObject, path: bun.String) bun.JSError!JSValue {
        return .undefined;
    }
    fn helper () void {}
};
// fn commented(
"#,
        );
        assert!(source.declares_function("readFile1"));
        assert!(source.declares_function("helper"));
        assert!(!source.declares_function("readFile"));
        assert!(source.declares_container("Bindings"));
        assert!(!source.declares_container("std"));
        assert_eq!(source.path(), Path::new("node/fs.zig"));
    }
}
