use crossbind_layout::ExternStruct;
use crossbind_types::case::pascal;
use crossbind_types::{TypeId, TypeKind};

use super::{Decl, ExceptionContext, ManagedEmitter};
use crate::error::CodegenResult;
use crate::names::{self, string_literal};
use crate::writer::CodeWriter;

const ENUM_HEADERS: [&str; 4] = [
    "JavaScriptCore/JSCInlines.h",
    "JavaScriptCore/JSString.h",
    "wtf/NeverDestroyed.h",
    "wtf/SortedArrayMap.h",
];

/// Specializations of the `WebCore::IDLEnumeration` traits for one enum.
pub(crate) fn enum_trait_declarations(w: &mut CodeWriter, ty: &str) {
    w.line(format!("// Implement WebCore::IDLEnumeration trait for {ty}"));
    w.line(format!("template<> String convertEnumerationToString<{ty}>({ty});"));
    w.line(format!(
        "template<> JSC::JSString* convertEnumerationToJS<{ty}>(JSC::JSGlobalObject&, {ty});"
    ));
    w.line(format!(
        "template<> std::optional<{ty}> parseEnumerationFromString<{ty}>(const String&);"
    ));
    w.line(format!(
        "template<> std::optional<{ty}> parseEnumeration<{ty}>(JSC::JSGlobalObject&, JSC::JSValue);"
    ));
    w.line(format!("template<> ASCIILiteral expectedEnumerationValues<{ty}>();"));
    w.blank();
}

impl ManagedEmitter<'_, '_> {
    pub(crate) fn emit_communication_struct(&mut self, buffer: &ExternStruct) -> CodegenResult<()> {
        let name = buffer.name().unwrap_or_default();
        let layout = buffer.compute_layout()?;
        let w = &mut self.internal;
        w.blank();
        w.line(format!("struct {name} {{"));
        for field in buffer.fields() {
            w.line(format!("    {} {};", field.ty.cpp_name(), field.name));
        }
        w.line("};");
        w.line(format!(
            "static_assert(sizeof({name}) == {}, \"{name} has incorrect size\");",
            layout.size_bytes
        ));
        w.line(format!(
            "static_assert(alignof({name}) == {}, \"{name} has incorrect alignment\");",
            layout.align_bytes
        ));
        for field in &layout.fields {
            w.line(format!(
                "static_assert(offsetof({name}, {}) == {}, \"{name}.{} has incorrect offset\");",
                field.name, field.offset_bytes, field.name
            ));
        }
        Ok(())
    }

    /// Emits one `convert*` function per reachable dictionary, dependencies first.
    pub fn emit_dictionary_converters(&mut self) -> CodegenResult<()> {
        let registry = self.ctx.registry;
        for id in registry.reachable_definitions() {
            if let TypeKind::Dictionary(_) = registry.get(id).kind() {
                self.emit_dictionary_converter(id)?;
            }
        }
        Ok(())
    }

    fn emit_dictionary_converter(&mut self, id: TypeId) -> CodegenResult<()> {
        let registry = self.ctx.registry;
        let ty = registry.get(id);
        let TypeKind::Dictionary(fields) = ty.kind() else {
            return Ok(());
        };
        let name = registry.name_of(id).unwrap_or_default();
        let cpp_name = self.ctx.cpp_name(id)?;
        self.headers.ensure("ObjectBindings.h", "");
        self.ensure_type_header(id);

        let mut w = CodeWriter::new();
        w.line(format!("// Internal dictionary parse for {name}"));
        w.line(format!(
            "bool {}({cpp_name}* result, JSC::JSGlobalObject* global, JSC::JSValue value)",
            names::dictionary_converter(ty.namespace(), name)
        ));
        w.line("{");
        {
            let mut body = w.indent();
            body.reset_temporaries();
            body.line("auto& vm = JSC::getVM(global);");
            body.line("auto throwScope = DECLARE_THROW_SCOPE(vm);");
            body.line("bool isNullOrUndefined = value.isUndefinedOrNull();");
            body.line("auto* object = isNullOrUndefined ? nullptr : value.getObject();");
            body.line("if (UNLIKELY(!isNullOrUndefined && !object)) {");
            body.line("    throwTypeError(global, throwScope);");
            body.line("    return false;");
            body.line("}");
            body.line("JSC::JSValue propValue;");

            for field in fields {
                let field_ty = registry.get(field.ty);
                let has_default = field_ty.flags().default.is_some();
                if !field.required && !has_default {
                    return Err(self.ctx.unsupported(
                        field_ty.origin(),
                        format!("optional dictionary field `{}` needs a default", field.key),
                    ));
                }
                body.line(format!("// {}", field.key));
                body.line("if (isNullOrUndefined) {");
                body.line("    propValue = JSC::jsUndefined();");
                body.line("} else {");
                body.line(format!(
                    "    propValue = Bun::getIfPropertyExistsPrototypePollutionMitigation(vm, global, object, JSC::Identifier::fromString(vm, {}_s));",
                    string_literal(&field.key)
                ));
                body.line("    RETURN_IF_EXCEPTION(throwScope, false);");
                body.line("}");
                body.line("if (!propValue.isUndefined()) {");
                {
                    let mut inner = body.indent();
                    let context = ExceptionContext::Property { key: &field.key };
                    self.convert_value(
                        &mut inner,
                        &format!("result->{}", field.key),
                        field.ty,
                        "propValue",
                        &context,
                        !field.required,
                        Decl::Assign,
                    )?;
                }
                body.line("} else {");
                if field.required {
                    body.line("    throwTypeError(global, throwScope);");
                    body.line("    return false;");
                } else {
                    let default = self.default_literal(field.ty)?;
                    body.line(format!("    result->{} = {default};", field.key));
                }
                body.line("}");
            }
            body.line("return true;");
        }
        w.line("}");
        w.blank();
        self.body.append(w.as_str());
        Ok(())
    }

    /// Trait definitions for every reachable enum, or an empty string.
    pub(crate) fn emit_enum_traits(&mut self) -> CodegenResult<String> {
        let registry = self.ctx.registry;
        let mut w = CodeWriter::new();
        for id in registry.reachable_definitions() {
            let ty = registry.get(id);
            if !ty.kind().is_enum() {
                continue;
            }
            let Some(variants) = registry.enum_variants(id) else {
                return Err(self.ctx.unsupported(ty.origin(), "enum variants were never resolved"));
            };
            for header in ENUM_HEADERS {
                self.headers.ensure(header, "");
            }
            self.headers.ensure("JSDOMConvertEnumeration.h", "");
            self.ensure_type_header(id);
            let cpp = self.ctx.cpp_name(id)?;

            w.line(format!("template<> String convertEnumerationToString<{cpp}>({cpp} enumerationValue)"));
            w.line("{");
            if let TypeKind::StringEnum(_) = ty.kind() {
                w.line("    static const NeverDestroyed<String> values[] = {");
                for variant in &variants {
                    w.line(format!(
                        "        MAKE_STATIC_STRING_IMPL({}),",
                        string_literal(&variant.name)
                    ));
                }
                w.line("    };");
                w.line("    return values[static_cast<size_t>(enumerationValue)];");
            } else {
                w.line("    switch (enumerationValue) {");
                for variant in &variants {
                    w.line(format!("    case {cpp}::{}:", pascal(&variant.name)));
                    w.line(format!("        return {}_s;", string_literal(&variant.name)));
                }
                w.line("    }");
                w.line("    RELEASE_ASSERT_NOT_REACHED();");
            }
            w.line("}");
            w.blank();

            w.line(format!(
                "template<> JSC::JSString* convertEnumerationToJS<{cpp}>(JSC::JSGlobalObject& global, {cpp} enumerationValue)"
            ));
            w.line("{");
            w.line("    return jsStringWithCache(global.vm(), convertEnumerationToString(enumerationValue));");
            w.line("}");
            w.blank();

            let mut sorted = variants.clone();
            sorted.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
            w.line(format!(
                "template<> std::optional<{cpp}> parseEnumerationFromString<{cpp}>(const String& stringValue)"
            ));
            w.line("{");
            w.line(format!(
                "    static constexpr std::pair<ComparableASCIILiteral, {cpp}> mappings[] = {{"
            ));
            for variant in &sorted {
                w.line(format!(
                    "        {{ {}_s, {cpp}::{} }},",
                    string_literal(&variant.name),
                    pascal(&variant.name)
                ));
            }
            w.line("    };");
            w.line("    static constexpr SortedArrayMap enumerationMapping { mappings };");
            w.line("    if (auto* enumerationValue = enumerationMapping.tryGet(stringValue); LIKELY(enumerationValue))");
            w.line("        return *enumerationValue;");
            w.line("    return std::nullopt;");
            w.line("}");
            w.blank();

            w.line(format!(
                "template<> std::optional<{cpp}> parseEnumeration<{cpp}>(JSC::JSGlobalObject& lexicalGlobalObject, JSC::JSValue value)"
            ));
            w.line("{");
            w.line(format!(
                "    return parseEnumerationFromString<{cpp}>(value.toWTFString(&lexicalGlobalObject));"
            ));
            w.line("}");
            w.blank();

            let expected: Vec<String> = variants
                .iter()
                .map(|variant| format!("\"{}\"", variant.name))
                .collect();
            w.line(format!("template<> ASCIILiteral expectedEnumerationValues<{cpp}>()"));
            w.line("{");
            w.line(format!("    return {}_s;", string_literal(&expected.join(", "))));
            w.line("}");
            w.blank();
        }
        Ok(w.into_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trait_declarations_name_every_specialization() {
        let mut w = CodeWriter::new();
        enum_trait_declarations(&mut w, "Generated::fs::Encoding");
        let text = w.into_string();
        assert!(text.starts_with("// Implement WebCore::IDLEnumeration trait for Generated::fs::Encoding\n"));
        for function in [
            "convertEnumerationToString",
            "convertEnumerationToJS",
            "parseEnumerationFromString",
            "parseEnumeration<",
            "expectedEnumerationValues",
        ] {
            assert!(text.contains(function), "missing {function}");
        }
    }
}
