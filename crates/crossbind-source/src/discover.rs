use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::error::{SourceError, SourceResult};

pub const DEFINITION_SUFFIX: &str = ".bind.toml";
pub const NATIVE_EXTENSION: &str = "zig";

/// Files found under the source root, relative to it and sorted.
#[derive(Debug, Clone, Default)]
pub struct Discovered {
    pub definitions: Vec<PathBuf>,
    pub native_sources: Vec<PathBuf>,
}

fn is_excluded(entry: &DirEntry, exclude: &[String]) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| exclude.iter().any(|e| e == name))
}

pub fn discover(root: &Path, exclude: &[String]) -> SourceResult<Discovered> {
    let mut found = Discovered::default();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_excluded(entry, exclude));

    for entry in walker {
        let entry = entry.map_err(|source| SourceError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let name = entry.file_name().to_string_lossy();
        if name.ends_with(DEFINITION_SUFFIX) {
            found.definitions.push(relative.to_path_buf());
        } else if relative.extension().is_some_and(|ext| ext == NATIVE_EXTENSION) {
            found.native_sources.push(relative.to_path_buf());
        }
    }

    found.definitions.sort();
    found.native_sources.sort();
    log::debug!(
        "discovered {} definition files and {} native sources under {}",
        found.definitions.len(),
        found.native_sources.len(),
        root.display()
    );
    Ok(found)
}

/// `dir/name.bind.toml` is implemented by `dir/name.zig`.
pub fn native_source_for(definition: &Path) -> PathBuf {
    let name = definition
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem = name.strip_suffix(DEFINITION_SUFFIX).unwrap_or(&name);
    definition.with_file_name(format!("{stem}.{NATIVE_EXTENSION}"))
}

/// The namespace identifier a definition file contributes to.
pub fn namespace_for(definition: &Path) -> String {
    let name = definition
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    name.strip_suffix(DEFINITION_SUFFIX)
        .unwrap_or(&name)
        .to_string()
}
