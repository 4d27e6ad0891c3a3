use std::path::{Path, PathBuf};

use crossbind_types::{FileId, Origin};
use miette::NamedSource;

#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the source root.
    pub path: PathBuf,
    pub contents: String,
}

/// Contents of every definition file read during a run.
///
/// Kept alive for the whole run so that any later stage can render a
/// diagnostic against the declaration it concerns.
#[derive(Debug, Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<PathBuf>, contents: impl Into<String>) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push(SourceFile {
            path: path.into(),
            contents: contents.into(),
        });
        id
    }

    pub fn get(&self, id: FileId) -> &SourceFile {
        &self.files[id.0 as usize]
    }

    pub fn path(&self, id: FileId) -> &Path {
        &self.get(id).path
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn named_source(&self, id: FileId) -> NamedSource<String> {
        let file = self.get(id);
        NamedSource::new(file.path.display().to_string(), file.contents.clone())
    }

    /// `path:line:column` of an origin, for plain-text messages.
    pub fn location(&self, origin: Origin) -> String {
        let file = self.get(origin.file);
        let offset = origin.span.offset().min(file.contents.len());
        let before = &file.contents[..offset];
        let line = before.matches('\n').count() + 1;
        let column = offset - before.rfind('\n').map_or(0, |i| i + 1) + 1;
        format!("{}:{}:{}", file.path.display(), line, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locations_are_one_based() {
        let mut map = SourceMap::new();
        let id = map.add("fs.bind.toml", "[functions.read]\nargs = []\n");
        assert_eq!(map.location(Origin::new(id, (0, 1))), "fs.bind.toml:1:1");
        assert_eq!(map.location(Origin::new(id, (17, 4))), "fs.bind.toml:2:1");
        assert_eq!(map.location(Origin::new(id, (24, 2))), "fs.bind.toml:2:8");
    }
}
