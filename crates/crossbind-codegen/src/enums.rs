//! Variant lists of enums declared in native source.
//!
//! The generator never parses native code itself. An [`EnumResolver`] is
//! handed every enum the definitions refer to and answers, in the same
//! order, with the tag width and variants of each one.

use std::path::{Path, PathBuf};
use std::process::Command;

use crossbind_layout::AbiPrimitive;
use crossbind_source::SourceMap;
use crossbind_types::{EnumVariant, ResolvedEnum, TypeId, TypeKind, TypeRegistry};
use serde::{Deserialize, Serialize};

use crate::error::{CodegenError, CodegenResult};
use crate::names::{relative_path, string_literal};
use crate::output::write_if_changed;

pub const EXTRACTOR_FILE_NAME: &str = "generated_enum_extractor.zig";

/// One native enum the output needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumRequest {
    /// The declaring type.
    pub id: TypeId,
    /// Native source declaring the enum, relative to the source root.
    pub file: PathBuf,
    pub name: String,
}

/// Serialized form of one resolved enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumMetadata {
    /// Present in metadata files, absent in toolchain output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub tag: String,
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValue {
    pub name: String,
    pub value: i64,
}

impl EnumMetadata {
    fn into_resolved(self, request: &EnumRequest) -> CodegenResult<ResolvedEnum> {
        let tag = AbiPrimitive::from_key(&self.tag)
            .filter(|tag| tag.is_integer())
            .ok_or_else(|| CodegenError::EnumExtraction {
                message: format!(
                    "{} in {} has non-integer tag `{}`",
                    request.name,
                    request.file.display(),
                    self.tag
                ),
            })?;
        Ok(ResolvedEnum {
            tag,
            variants: self
                .values
                .into_iter()
                .map(|v| EnumVariant {
                    name: v.name,
                    value: v.value,
                })
                .collect(),
        })
    }
}

pub trait EnumResolver {
    /// Resolves every request; the result is in request order.
    fn resolve(&mut self, requests: &[EnumRequest]) -> CodegenResult<Vec<ResolvedEnum>>;
}

/// Collects the native enums reachable from the output and finds their source files.
///
/// `file` keys are path suffixes matched component-wise against `native_sources`.
pub fn collect_requests(
    registry: &TypeRegistry,
    sources: &SourceMap,
    native_sources: &[PathBuf],
) -> CodegenResult<Vec<EnumRequest>> {
    let mut requests: Vec<EnumRequest> = Vec::new();
    for id in registry.reachable_definitions() {
        let ty = registry.get(id);
        let TypeKind::NativeEnum(native) = ty.kind() else {
            continue;
        };
        let suffix = Path::new(&native.file);
        let matches: Vec<&PathBuf> = native_sources
            .iter()
            .filter(|path| path.ends_with(suffix))
            .collect();
        let file = match matches.as_slice() {
            [only] => (*only).clone(),
            [] => {
                return Err(CodegenError::EnumNotFound {
                    file: native.file.clone(),
                    src: sources.named_source(ty.origin().file),
                    span: ty.origin().span,
                })
            }
            several => {
                return Err(CodegenError::EnumAmbiguous {
                    file: native.file.clone(),
                    candidates: several
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                    src: sources.named_source(ty.origin().file),
                    span: ty.origin().span,
                })
            }
        };
        requests.push(EnumRequest {
            id,
            file,
            name: native.name.clone(),
        });
    }
    Ok(requests)
}

/// Answers from a fixed table, typically read from a metadata file.
#[derive(Debug, Clone, Default)]
pub struct StaticEnumResolver {
    entries: Vec<EnumMetadata>,
}

impl StaticEnumResolver {
    pub fn new(entries: Vec<EnumMetadata>) -> Self {
        Self { entries }
    }

    pub fn from_json_file(path: &Path) -> CodegenResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|err| CodegenError::io(path, err))?;
        let entries = serde_json::from_str(&contents).map_err(|source| CodegenError::Json {
            what: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(entries))
    }

    fn find(&self, request: &EnumRequest) -> Option<&EnumMetadata> {
        self.entries.iter().find(|entry| {
            entry.name.as_deref() == Some(request.name.as_str())
                && entry
                    .file
                    .as_deref()
                    .is_some_and(|file| request.file.ends_with(file))
        })
    }
}

impl EnumResolver for StaticEnumResolver {
    fn resolve(&mut self, requests: &[EnumRequest]) -> CodegenResult<Vec<ResolvedEnum>> {
        requests
            .iter()
            .map(|request| {
                let entry = self.find(request).cloned().ok_or_else(|| CodegenError::EnumExtraction {
                    message: format!(
                        "no metadata for {} in {}",
                        request.name,
                        request.file.display()
                    ),
                })?;
                entry.into_resolved(request)
            })
            .collect()
    }
}

/// Builds and runs a small native program that prints enum layouts as JSON.
#[derive(Debug, Clone)]
pub struct ToolchainEnumResolver {
    /// Source root the build runs in.
    pub root: PathBuf,
    /// Directory the extractor program is written to.
    pub codegen_dir: PathBuf,
    /// Aggregated native artifact, relative to `root`; a stub is created when missing.
    pub native_output: PathBuf,
    pub zig: PathBuf,
}

impl ToolchainEnumResolver {
    pub fn extractor_source(&self, requests: &[EnumRequest]) -> String {
        let mut out = String::new();
        out.push_str("// Prints the tag type and fields of each enum below as JSON.\n");
        out.push_str("const std = @import(\"std\");\n\n");
        out.push_str("const enums = .{\n");
        for request in requests {
            let import = relative_path(&self.codegen_dir, &self.root.join(&request.file));
            out.push_str(&format!(
                "    @import({}).{},\n",
                string_literal(&import),
                request.name
            ));
        }
        out.push_str("};\n\n");
        out.push_str(EXTRACTOR_MAIN);
        out
    }

    fn ensure_native_output(&self) -> CodegenResult<()> {
        let path = self.root.join(&self.native_output);
        if path.exists() {
            return Ok(());
        }
        log::debug!("creating stub {}", path.display());
        write_if_changed(&path, "// Replaced by the binding generator.\n")?;
        Ok(())
    }
}

const EXTRACTOR_MAIN: &str = r#"pub fn main() !void {
    const stdout = std.io.getStdOut().writer();
    try stdout.writeAll("[");
    inline for (enums, 0..) |T, i| {
        if (i > 0) try stdout.writeAll(",");
        const info = @typeInfo(T).Enum;
        try stdout.print("{{\"tag\":\"{s}\",\"values\":[", .{@typeName(info.tag_type)});
        inline for (info.fields, 0..) |field, j| {
            if (j > 0) try stdout.writeAll(",");
            try stdout.print("{{\"name\":\"{s}\",\"value\":{d}}}", .{ field.name, field.value });
        }
        try stdout.writeAll("]}");
    }
    try stdout.writeAll("]\n");
}
"#;

impl EnumResolver for ToolchainEnumResolver {
    fn resolve(&mut self, requests: &[EnumRequest]) -> CodegenResult<Vec<ResolvedEnum>> {
        let extractor = self.codegen_dir.join(EXTRACTOR_FILE_NAME);
        write_if_changed(&extractor, &self.extractor_source(requests))?;
        self.ensure_native_output()?;

        log::info!("running {} build enum-extractor", self.zig.display());
        let output = Command::new(&self.zig)
            .args([
                "build",
                "enum-extractor",
                "-Dno-compiler-info",
                "-Dignore-missing-generated-paths",
            ])
            .current_dir(&self.root)
            .output()
            .map_err(|err| CodegenError::EnumExtraction {
                message: format!("could not run {}: {err}", self.zig.display()),
            })?;
        if !output.status.success() {
            return Err(CodegenError::EnumExtraction {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let parsed: Vec<EnumMetadata> =
            serde_json::from_slice(&output.stdout).map_err(|source| CodegenError::Json {
                what: "enum extractor output".to_string(),
                source,
            })?;
        if parsed.len() != requests.len() {
            return Err(CodegenError::EnumExtraction {
                message: format!(
                    "expected {} enums, the extractor printed {}",
                    requests.len(),
                    parsed.len()
                ),
            });
        }
        parsed
            .into_iter()
            .zip(requests)
            .map(|(metadata, request)| metadata.into_resolved(request))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbind_source::Loader;
    use crossbind_types::{FileId, Origin};

    fn some_id() -> TypeId {
        let mut registry = TypeRegistry::new();
        registry.intern(TypeKind::Boolean, Default::default(), "fs", Origin::new(FileId(0), (0, 0)))
    }

    const DEFINITIONS: &str = r#"
[types.Mode]
kind = "native-enum"
file = "node/mode.zig"
name = "Mode"
"#;

    fn metadata(file: &str) -> EnumMetadata {
        EnumMetadata {
            file: Some(PathBuf::from(file)),
            name: Some("Mode".to_string()),
            tag: "u16".to_string(),
            values: vec![
                EnumValue { name: "read".to_string(), value: 4 },
                EnumValue { name: "write".to_string(), value: 2 },
            ],
        }
    }

    #[test]
    fn requests_resolve_file_suffixes() {
        let mut loader = Loader::new();
        loader.add_file("fs.bind.toml", DEFINITIONS).unwrap();
        let set = loader.finish().unwrap();

        let natives = vec![PathBuf::from("src/node/mode.zig"), PathBuf::from("src/fs.zig")];
        let requests = collect_requests(&set.registry, &set.sources, &natives).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].file, PathBuf::from("src/node/mode.zig"));

        let err = collect_requests(&set.registry, &set.sources, &[]).unwrap_err();
        assert!(matches!(err, CodegenError::EnumNotFound { .. }));

        let twice = vec![
            PathBuf::from("a/node/mode.zig"),
            PathBuf::from("b/node/mode.zig"),
        ];
        let err = collect_requests(&set.registry, &set.sources, &twice).unwrap_err();
        assert!(matches!(err, CodegenError::EnumAmbiguous { .. }));
    }

    #[test]
    fn static_resolver_matches_file_and_name() {
        let request = EnumRequest {
            id: some_id(),
            file: PathBuf::from("src/node/mode.zig"),
            name: "Mode".to_string(),
        };
        let mut resolver = StaticEnumResolver::new(vec![metadata("node/mode.zig")]);
        let resolved = resolver.resolve(std::slice::from_ref(&request)).unwrap();
        assert_eq!(resolved[0].tag, AbiPrimitive::U16);
        assert_eq!(resolved[0].variants[1].value, 2);

        let mut other = StaticEnumResolver::new(vec![metadata("web/mode.zig")]);
        assert!(other.resolve(&[request]).is_err());
    }

    #[test]
    fn extractor_imports_relative_to_codegen_dir() {
        let resolver = ToolchainEnumResolver {
            root: PathBuf::from("repo"),
            codegen_dir: PathBuf::from("repo/build/codegen"),
            native_output: PathBuf::from("bun.js/bindings/GeneratedBindings.zig"),
            zig: PathBuf::from("zig"),
        };
        let source = resolver.extractor_source(&[EnumRequest {
            id: some_id(),
            file: PathBuf::from("src/node/mode.zig"),
            name: "Mode".to_string(),
        }]);
        assert!(source.contains("    @import(\"../../src/node/mode.zig\").Mode,\n"));
        assert!(source.contains("pub fn main() !void {"));
    }
}
