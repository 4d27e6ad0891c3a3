//! Generated artifacts are collected in memory and written only when their
//! contents changed, so an unchanged input touches no file.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::{CodegenError, CodegenResult};

/// Writes `contents` to `path` unless the file already holds exactly that.
///
/// Returns whether the file was written.
pub fn write_if_changed(path: &Path, contents: &str) -> CodegenResult<bool> {
    match std::fs::read(path) {
        Ok(existing) if existing == contents.as_bytes() => {
            log::debug!("{} is up to date", path.display());
            return Ok(false);
        }
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(CodegenError::io(path, err)),
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| CodegenError::io(parent, err))?;
    }
    std::fs::write(path, contents).map_err(|err| CodegenError::io(path, err))?;
    Ok(true)
}

/// Every artifact of one run, keyed by destination path.
#[derive(Debug, Default)]
pub struct OutputSet {
    files: IndexMap<PathBuf, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: usize,
    pub unchanged: usize,
}

impl OutputSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each path may be produced once per run.
    pub fn add(&mut self, path: impl Into<PathBuf>, contents: String) -> CodegenResult<()> {
        let path = path.into();
        if self.files.contains_key(&path) {
            return Err(CodegenError::DuplicateOutput { path });
        }
        self.files.insert(path, contents);
        Ok(())
    }

    pub fn get(&self, path: &Path) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Writes every changed artifact, calling `on_write` before each write.
    pub fn write_all(&self, mut on_write: impl FnMut(&Path)) -> CodegenResult<WriteSummary> {
        let mut summary = WriteSummary::default();
        for (path, contents) in &self.files {
            let unchanged = std::fs::read(path)
                .map(|existing| existing == contents.as_bytes())
                .unwrap_or(false);
            if unchanged {
                summary.unchanged += 1;
                continue;
            }
            on_write(path);
            write_if_changed(path, contents)?;
            summary.written += 1;
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_files_are_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/GeneratedFs.h");
        assert!(write_if_changed(&path, "#pragma once\n").unwrap());
        assert!(!write_if_changed(&path, "#pragma once\n").unwrap());
        assert!(write_if_changed(&path, "#pragma once\n// v2\n").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "#pragma once\n// v2\n");
    }

    #[test]
    fn duplicate_paths_are_rejected() {
        let mut outputs = OutputSet::new();
        outputs.add("a.cpp", String::new()).unwrap();
        let err = outputs.add("a.cpp", String::new()).unwrap_err();
        assert!(matches!(err, CodegenError::DuplicateOutput { .. }));
    }

    #[test]
    fn write_all_counts_skipped_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut outputs = OutputSet::new();
        outputs.add(dir.path().join("a.zig"), "const a = 1;\n".to_string()).unwrap();
        outputs.add(dir.path().join("b.zig"), "const b = 2;\n".to_string()).unwrap();

        let mut seen = Vec::new();
        let first = outputs.write_all(|p| seen.push(p.to_path_buf())).unwrap();
        assert_eq!(first, WriteSummary { written: 2, unchanged: 0 });
        assert_eq!(seen.len(), 2);

        let second = outputs.write_all(|_| panic!("nothing should be written")).unwrap();
        assert_eq!(second, WriteSummary { written: 0, unchanged: 2 });
    }
}
