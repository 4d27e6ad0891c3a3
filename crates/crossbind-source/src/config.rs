use std::path::{Path, PathBuf};

use crossbind_layout::AbiPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::{SourceError, SourceResult};

pub const CONFIG_FILE_NAME: &str = "crossbind.toml";

/// Optional `crossbind.toml` at the source root.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProjectConfig {
    /// Code generation policy
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Where native enum metadata comes from
    #[serde(default)]
    pub enums: EnumConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GeneratorConfig {
    /// Flat kinds passed by value instead of by pointer, by ABI name
    #[serde(default = "default_value_pass")]
    pub value_pass: Vec<String>,

    /// Pack communication structs by descending field size
    #[serde(default = "default_true")]
    pub reorder_fields: bool,

    /// Aggregated native artifact, relative to the source root
    #[serde(default = "default_native_output")]
    pub native_output: PathBuf,

    /// Directory names skipped during discovery
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            value_pass: default_value_pass(),
            reorder_fields: true,
            native_output: default_native_output(),
            exclude: default_exclude(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EnumConfig {
    /// Precomputed enum metadata; when set the native toolchain is not invoked
    #[serde(default)]
    pub metadata: Option<PathBuf>,
}

pub fn default_value_pass() -> Vec<String> {
    [
        AbiPrimitive::OpaquePointer,
        AbiPrimitive::GlobalObjectPointer,
        AbiPrimitive::StringImplPointer,
    ]
    .iter()
    .map(|p| p.key().to_string())
    .collect()
}

pub fn default_native_output() -> PathBuf {
    PathBuf::from("bun.js/bindings/GeneratedBindings.zig")
}

pub fn default_exclude() -> Vec<String> {
    vec!["node_modules".to_string(), ".git".to_string()]
}

fn default_true() -> bool {
    true
}

impl ProjectConfig {
    /// Reads `crossbind.toml` from `root`, falling back to defaults when absent.
    pub fn load(root: &Path) -> SourceResult<Self> {
        let path = root.join(CONFIG_FILE_NAME);
        if !path.is_file() {
            log::debug!("no {} in {}, using defaults", CONFIG_FILE_NAME, root.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path).map_err(|source| SourceError::Io {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&contents).map_err(|e| SourceError::Config {
            path,
            message: e.message().to_string(),
        })
    }

    /// The value-pass policy as ABI primitives.
    pub fn value_pass_set(&self) -> SourceResult<Vec<AbiPrimitive>> {
        self.generator
            .value_pass
            .iter()
            .map(|key| {
                AbiPrimitive::from_key(key).ok_or_else(|| SourceError::Config {
                    path: PathBuf::from(CONFIG_FILE_NAME),
                    message: format!("`{key}` in generator.value-pass is not an ABI type"),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert!(config.generator.reorder_fields);
        assert_eq!(
            config.value_pass_set().unwrap(),
            vec![
                AbiPrimitive::OpaquePointer,
                AbiPrimitive::GlobalObjectPointer,
                AbiPrimitive::StringImplPointer
            ]
        );
    }

    #[test]
    fn partial_files_keep_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[generator]\nvalue-pass = [\"u32\", \"*JSGlobalObject\"]\n",
        )
        .unwrap();
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(
            config.value_pass_set().unwrap(),
            vec![AbiPrimitive::U32, AbiPrimitive::GlobalObjectPointer]
        );
        assert_eq!(config.generator.native_output, default_native_output());
        assert!(config.enums.metadata.is_none());
    }

    #[test]
    fn unknown_value_pass_entries_are_rejected() {
        let config = ProjectConfig {
            generator: GeneratorConfig {
                value_pass: vec!["pointer".into()],
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(config.value_pass_set(), Err(SourceError::Config { .. })));
    }
}
