//! Per-namespace declaration headers for hand-written managed code.

use crossbind_layout::ExternStruct;
use crossbind_source::DefinitionFile;
use crossbind_types::case::pascal;
use crossbind_types::{Function, TypeId, TypeKind};
use rustc_hash::FxHashMap;

use crate::context::{Declaration, GenerationContext, Headers};
use crate::error::{CodegenError, CodegenResult};
use crate::managed::enum_trait_declarations;
use crate::names;
use crate::writer::CodeWriter;

/// Fails when two definition files map to the same namespace.
pub fn check_namespaces<'f>(files: impl IntoIterator<Item = &'f DefinitionFile>) -> CodegenResult<()> {
    let mut seen: FxHashMap<&str, &DefinitionFile> = FxHashMap::default();
    for file in files {
        if let Some(first) = seen.insert(&file.namespace, file) {
            return Err(CodegenError::NamespaceCollision {
                namespace: file.namespace.clone(),
                first: first.path.clone(),
                second: file.path.clone(),
            });
        }
    }
    Ok(())
}

pub struct HeaderAssembler<'a, 'ctx> {
    ctx: &'a GenerationContext<'ctx>,
}

impl<'a, 'ctx> HeaderAssembler<'a, 'ctx> {
    pub fn new(ctx: &'a GenerationContext<'ctx>) -> Self {
        Self { ctx }
    }

    /// File name of the header for `file`.
    pub fn file_name(file: &DefinitionFile) -> String {
        names::header_name(&file.namespace)
    }

    pub fn render(&self, file: &DefinitionFile, functions: &[Function]) -> CodegenResult<String> {
        let registry = self.ctx.registry;
        let namespace = &file.namespace;
        let own_header = names::header_name(namespace);
        let mut headers = Headers::new();
        headers.ensure("root.h", "");

        let declarations = self.ctx.declarations(file);
        let mut body = CodeWriter::new();
        let mut enums = Vec::new();

        for declaration in &declarations {
            match declaration {
                Declaration::Named { name, id, .. } => {
                    self.emit_named(&mut body, &mut headers, name, *id)?;
                    if registry.get(*id).kind().is_enum() {
                        enums.push(self.ctx.cpp_name(*id)?);
                    }
                }
                Declaration::Alias { name, id } => {
                    let Some(layout) = registry.value_layout(*id) else {
                        continue;
                    };
                    self.include_for(&mut headers, *id, &own_header);
                    body.line(format!("using {name} = {};", layout.cpp_name()));
                    body.blank();
                }
            }
        }
        for function in functions {
            body.line(format!(
                "constexpr auto* js{} = &{};",
                crossbind_types::case::cap(&function.name),
                names::js_function(namespace, &function.name)
            ));
        }
        if !functions.is_empty() {
            body.blank();
        }
        if !enums.is_empty() {
            headers.ensure("JSDOMConvertEnumeration.h", "");
        }

        let mut out = String::from("#pragma once\n");
        out.push_str(&headers.render());
        out.push('\n');
        if !functions.is_empty() {
            out.push_str("namespace {\n");
            for function in functions {
                out.push_str(&format!(
                    "extern \"C\" SYSV_ABI JSC::EncodedJSValue {}(JSC::JSGlobalObject*, JSC::CallFrame*);\n",
                    names::js_function(namespace, &function.name)
                ));
            }
            out.push_str("} // namespace\n\n");
        }
        out.push_str("namespace Generated {\n\n");
        out.push_str(&format!(
            "/// Generated binding code for {}\n",
            file.path.display()
        ));
        out.push_str(&format!("namespace {namespace} {{\n\n"));
        out.push_str(body.as_str());
        out.push_str(&format!("}} // namespace {namespace}\n"));
        out.push_str("} // namespace Generated\n\n");
        if !enums.is_empty() {
            let mut traits = CodeWriter::new();
            for cpp in &enums {
                enum_trait_declarations(&mut traits, cpp);
            }
            out.push_str("namespace WebCore {\n\n");
            out.push_str(traits.as_str());
            out.push_str("} // namespace WebCore\n");
        }
        Ok(out)
    }

    fn include_for(&self, headers: &mut Headers, id: TypeId, own_header: &str) {
        if let Some(header) = self.ctx.header_for(id) {
            if header != own_header {
                headers.ensure(header, "");
            }
        }
    }

    fn emit_named(
        &self,
        w: &mut CodeWriter,
        headers: &mut Headers,
        name: &str,
        id: TypeId,
    ) -> CodegenResult<()> {
        let registry = self.ctx.registry;
        let ty = registry.get(id);
        match ty.kind() {
            TypeKind::StringEnum(_) | TypeKind::NativeEnum(_) => {
                let (Some(tag), Some(variants)) = (registry.enum_tag(id), registry.enum_variants(id))
                else {
                    return Err(self.ctx.unsupported(ty.origin(), "enum variants were never resolved"));
                };
                let explicit = matches!(ty.kind(), TypeKind::NativeEnum(_));
                w.line(format!("enum class {name} : {} {{", tag.cpp_name()));
                for variant in &variants {
                    if explicit {
                        w.line(format!("    {} = {},", pascal(&variant.name), variant.value));
                    } else {
                        w.line(format!("    {},", pascal(&variant.name)));
                    }
                }
                w.line("};");
            }
            TypeKind::Dictionary(fields) => {
                let mut record = ExternStruct::new();
                for field in fields {
                    let layout = registry.flat_layout(field.ty).ok_or_else(|| {
                        self.ctx.unsupported(
                            registry.get(field.ty).origin(),
                            format!("dictionary field `{}` has no flat representation", field.key),
                        )
                    })?;
                    self.include_for(headers, field.ty, &names::header_name(ty.namespace()));
                    record.add(field.key.clone(), layout);
                }
                record.assign_generated_name(name);
                let layout = record.compute_layout()?;
                w.line(format!("struct {name} {{"));
                for field in record.fields() {
                    w.line(format!("    {} {};", field.ty.cpp_name(), field.name));
                }
                w.line("};");
                w.line(format!(
                    "static_assert(sizeof({name}) == {}, \"{name} has incorrect size\");",
                    layout.size_bytes
                ));
            }
            TypeKind::CustomManaged(custom) => {
                for header in &custom.headers {
                    headers.ensure(header.clone(), &format!("custom managed type {name}"));
                }
                w.line(format!("using {name} = {};", custom.managed_type));
            }
            TypeKind::CustomNative(_) => return Ok(()),
            _ => {
                let layout = self.ctx.layout(id)?;
                w.line(format!("using {name} = {};", layout.cpp_name()));
            }
        }
        w.blank();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbind_source::Loader;

    #[test]
    fn namespaces_must_be_unique() {
        let mut loader = Loader::new();
        loader.add_file("node/fs.bind.toml", "").unwrap();
        loader.add_file("web/fs.bind.toml", "").unwrap();
        let set = loader.finish().unwrap();
        let err = check_namespaces(&set.files).unwrap_err();
        assert!(matches!(
            err,
            CodegenError::NamespaceCollision { ref namespace, .. } if namespace == "fs"
        ));
    }
}
