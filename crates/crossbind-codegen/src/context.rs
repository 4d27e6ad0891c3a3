use std::path::{Path, PathBuf};

use crossbind_layout::AbiType;
use crossbind_source::{DefinitionFile, SourceMap};
use crossbind_types::{Origin, TypeId, TypeKind, TypeRegistry};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::error::{CodegenError, CodegenResult};
use crate::names;

/// State shared by every emitter for one generation run.
pub struct GenerationContext<'a> {
    pub registry: &'a TypeRegistry,
    pub sources: &'a SourceMap,
    /// Annotate generated glue with the resolved lowering plan.
    pub debug: bool,
    /// Aggregated native artifact, relative to the source root.
    pub native_output: &'a Path,
    /// Native source defining each native enum, relative to the source root.
    pub enum_files: FxHashMap<TypeId, PathBuf>,
}

impl<'a> GenerationContext<'a> {
    pub fn new(registry: &'a TypeRegistry, sources: &'a SourceMap, native_output: &'a Path) -> Self {
        Self {
            registry,
            sources,
            debug: false,
            native_output,
            enum_files: FxHashMap::default(),
        }
    }

    pub fn unsupported(&self, origin: Origin, message: impl Into<String>) -> CodegenError {
        CodegenError::unsupported(self.sources, origin, message)
    }

    pub fn layout(&self, id: TypeId) -> CodegenResult<AbiType> {
        self.registry.value_layout(id).ok_or_else(|| {
            let ty = self.registry.get(id);
            self.unsupported(
                ty.origin(),
                format!("{} has no flat representation", ty.kind().describe()),
            )
        })
    }

    /// Managed-side spelling of a value of `id`.
    pub fn cpp_name(&self, id: TypeId) -> CodegenResult<String> {
        Ok(self.layout(id)?.cpp_name().to_string())
    }

    /// Native-side spelling of a value of `id`, ignoring optionality.
    pub fn zig_name(&self, id: TypeId) -> CodegenResult<String> {
        if let TypeKind::CustomNative(custom) = self.registry.get(id).kind() {
            return Ok(custom.native_type.clone());
        }
        Ok(self.layout(id)?.zig_name().to_string())
    }

    /// The generated header declaring `id`, when it has a declaration of its own.
    pub fn header_for(&self, id: TypeId) -> Option<String> {
        let ty = self.registry.get(id);
        if ty.kind().lowers_to_named_type() {
            Some(names::header_name(ty.namespace()))
        } else {
            None
        }
    }

    /// Directory the aggregated native artifact lives in.
    pub fn native_output_dir(&self) -> &Path {
        self.native_output.parent().unwrap_or(Path::new(""))
    }
}

/// A type declaration in the public surface of one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    /// A type owned by the namespace. `inline` types were named by the generator.
    Named { name: String, id: TypeId, inline: bool },
    /// An exported name for a type declared elsewhere, or for a builtin kind.
    Alias { name: String, id: TypeId },
}

impl GenerationContext<'_> {
    /// Declarations of `file`, dependencies before their users.
    pub fn declarations(&self, file: &DefinitionFile) -> Vec<Declaration> {
        let registry = self.registry;
        let mut out = Vec::new();
        for id in registry.reachable_definitions() {
            let ty = registry.get(id);
            if ty.namespace() != file.namespace {
                continue;
            }
            let Some(name) = registry.name_of(id) else {
                continue;
            };
            let inline = !file
                .typedefs
                .iter()
                .any(|(declared, ty)| declared == name && registry.definition(*ty) == id);
            out.push(Declaration::Named {
                name: name.to_string(),
                id,
                inline,
            });
        }
        for (name, id) in &file.typedefs {
            let definition = registry.definition(*id);
            let owned = registry.name_of(definition) == Some(name.as_str())
                && registry.get(definition).namespace() == file.namespace
                && *id == definition;
            if !owned {
                out.push(Declaration::Alias {
                    name: name.clone(),
                    id: *id,
                });
            }
        }
        out
    }
}

/// Insertion-ordered, deduplicated `#include` list.
#[derive(Debug, Default)]
pub struct Headers {
    entries: IndexMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `name` unless present; the first reason given is kept.
    pub fn ensure(&mut self, name: impl Into<String>, reason: &str) {
        self.entries
            .entry(name.into())
            .or_insert_with(|| reason.to_string());
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, reason) in &self.entries {
            out.push_str("#include ");
            out.push_str(&names::string_literal(name));
            if !reason.is_empty() {
                out.push_str(" // ");
                out.push_str(reason);
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_keep_first_reason_and_order() {
        let mut headers = Headers::new();
        headers.ensure("root.h", "");
        headers.ensure("Blob.h", "customCpp Blob");
        headers.ensure("root.h", "again");
        headers.ensure("Blob.h", "other");
        assert_eq!(
            headers.render(),
            "#include \"root.h\"\n#include \"Blob.h\" // customCpp Blob\n"
        );
    }
}
