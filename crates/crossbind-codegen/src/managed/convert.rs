use crossbind_layout::AbiPrimitive;
use crossbind_types::{
    DefaultValue, IntegerKind, ManagedArg, RangeMode, StringKind, TypeId, TypeKind,
};

use super::{Decl, ManagedEmitter};
use crate::error::CodegenResult;
use crate::names::{self, string_literal};
use crate::writer::CodeWriter;

/// What a thrown conversion error names as its subject.
#[derive(Debug, Clone, Copy)]
pub enum ExceptionContext<'n> {
    Argument { name: &'n str },
    Property { key: &'n str },
}

impl ExceptionContext<'_> {
    /// Subject of an invalid-type error, e.g. `"path" argument`.
    fn type_subject(&self) -> String {
        match self {
            ExceptionContext::Argument { name } => format!("\"{name}\" argument"),
            ExceptionContext::Property { key } => format!("\"{key}\" property"),
        }
    }

    /// Subject of an invalid-value error, e.g. `argument 'encoding'`.
    fn value_subject(&self) -> String {
        match self {
            ExceptionContext::Argument { name } => format!("argument '{name}'"),
            ExceptionContext::Property { key } => format!("property '{key}'"),
        }
    }

    fn name(&self) -> &str {
        match self {
            ExceptionContext::Argument { name } => name,
            ExceptionContext::Property { key } => key,
        }
    }
}

/// Lambda handed to `WebCore::convert` to replace its default exception.
struct ExceptionHandler {
    params: String,
    body: String,
}

fn idl_integer(kind: IntegerKind) -> &'static str {
    match kind {
        IntegerKind::U8 => "WebCore::IDLOctet",
        IntegerKind::U16 => "WebCore::IDLUnsignedShort",
        IntegerKind::U32 => "WebCore::IDLUnsignedLong",
        IntegerKind::U64 | IntegerKind::Usize => "WebCore::IDLUnsignedLongLong",
        IntegerKind::I8 => "WebCore::IDLByte",
        IntegerKind::I16 => "WebCore::IDLShort",
        IntegerKind::I32 => "WebCore::IDLLong",
        IntegerKind::I64 => "WebCore::IDLLongLong",
    }
}

/// An integer literal valid for any 64-bit C++ integer type.
pub(crate) fn cpp_int_literal(value: i128) -> String {
    if value == i64::MIN as i128 {
        "std::numeric_limits<int64_t>::min()".to_string()
    } else if value > i64::MAX as i128 {
        format!("{value}ULL")
    } else {
        value.to_string()
    }
}

pub(crate) fn cpp_double_literal(value: f64) -> String {
    if value.is_nan() {
        "std::numeric_limits<double>::quiet_NaN()".to_string()
    } else if value.is_infinite() {
        let sign = if value < 0.0 { "-" } else { "" };
        format!("{sign}std::numeric_limits<double>::infinity()")
    } else {
        format!("{value:?}")
    }
}

impl ManagedEmitter<'_, '_> {
    /// The IDL type `WebCore::convert` uses for `id`, when there is a direct one.
    pub(crate) fn simple_idl(&mut self, id: TypeId) -> CodegenResult<Option<String>> {
        let ty = self.ctx.registry.get(id);
        let flags = ty.flags();
        let entry = match ty.kind() {
            TypeKind::Boolean => "WebCore::IDLBoolean".to_string(),
            TypeKind::Undefined => "WebCore::IDLUndefined".to_string(),
            TypeKind::Integer(kind) => idl_integer(*kind).to_string(),
            TypeKind::F64 if flags.finite => "WebCore::IDLDouble".to_string(),
            TypeKind::F64 => "WebCore::IDLUnrestrictedDouble".to_string(),
            TypeKind::StringEnum(_) | TypeKind::NativeEnum(_) => {
                format!("WebCore::IDLEnumeration<{}>", self.ctx.cpp_name(id)?)
            }
            _ => return Ok(None),
        };

        let TypeKind::Integer(kind) = ty.kind() else {
            return Ok(Some(entry));
        };
        let prim = kind.abi();
        let custom_range = match (&flags.range, flags.node_validator) {
            (_, Some(_)) => true,
            (Some(range), None) => range.mode == RangeMode::Enforce && !range.uses_abi_bounds(),
            (None, None) => false,
        };
        if custom_range {
            let (min, max) = flags
                .range
                .and_then(|range| range.bounds(prim))
                .or_else(|| prim.integer_limits())
                .unwrap_or((0, 0));
            let variant = if flags.node_validator.is_some() {
                "Node"
            } else {
                "Web"
            };
            self.headers.ensure("BindgenCustomEnforceRange.h", "");
            return Ok(Some(format!(
                "Bun::BindgenCustomEnforceRange<{}, {}, {}, Bun::BindgenCustomEnforceRangeKind::{variant}>",
                prim.cpp_name(),
                cpp_int_literal(min),
                cpp_int_literal(max)
            )));
        }
        Ok(Some(match flags.range.map(|r| r.mode) {
            Some(RangeMode::Clamp) => format!("WebCore::IDLClampAdaptor<{entry}>"),
            Some(RangeMode::Enforce) => format!("WebCore::IDLEnforceRangeAdaptor<{entry}>"),
            None => entry,
        }))
    }

    fn exception_handler(
        &mut self,
        id: TypeId,
        context: &ExceptionContext<'_>,
        value: &str,
        optional: bool,
    ) -> Option<ExceptionHandler> {
        let registry = self.ctx.registry;
        let ty = registry.get(id);
        if ty.flags().node_validator.is_some() {
            self.headers.ensure("ErrorCode.h", "");
            return Some(ExceptionHandler {
                params: "[]()".to_string(),
                body: format!("return {}_s;", string_literal(context.name())),
            });
        }
        if !ty.kind().is_enum() {
            return None;
        }
        let mut values: Vec<String> = registry
            .enum_variants(id)
            .unwrap_or_default()
            .into_iter()
            .map(|variant| format!("'{}'", variant.name))
            .collect();
        if optional {
            if !ty.flags().non_null {
                values.push("null".to_string());
            }
            values.push("undefined".to_string());
        }
        let body = self.throw_value_error(
            "&global",
            context,
            &format!("one of: {}", values.join(", ")),
            value,
        );
        Some(ExceptionHandler {
            params: "[&](JSC::JSGlobalObject& global, JSC::ThrowScope& scope)".to_string(),
            body,
        })
    }

    fn throw_type_error(&mut self, context: &ExceptionContext<'_>, message: &str, value: &str) -> String {
        self.headers.ensure("BindgenNodeErrors.h", "");
        format!(
            "throwNodeInvalidArgTypeErrorForBindgen(throwScope, global, {}_s, {}_s, {value});",
            string_literal(&context.type_subject()),
            string_literal(message)
        )
    }

    fn throw_value_error(
        &mut self,
        global: &str,
        context: &ExceptionContext<'_>,
        message: &str,
        value: &str,
    ) -> String {
        self.headers.ensure("BindgenNodeErrors.h", "");
        format!(
            "throwNodeInvalidArgValueErrorForBindgen(throwScope, {global}, {}_s, {}_s, {value});",
            string_literal(&context.value_subject()),
            string_literal(message)
        )
    }

    /// Converts the dynamic value `value` into `target`.
    ///
    /// Failures return `{}` from the enclosing function with an exception pending.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn convert_value(
        &mut self,
        w: &mut CodeWriter,
        target: &str,
        id: TypeId,
        value: &str,
        context: &ExceptionContext<'_>,
        optional: bool,
        decl: Decl,
    ) -> CodegenResult<()> {
        let registry = self.ctx.registry;
        let ty = registry.get(id);
        if decl == Decl::Declare {
            self.ensure_type_header(id);
        }
        let declared = |ctx_name: String| match decl {
            Decl::Declare => format!("{ctx_name} "),
            Decl::Assign => String::new(),
        };

        if let Some(idl) = self.simple_idl(id)? {
            let handler = self
                .exception_handler(id, context, value, optional)
                .map(|h| format!(", {} {{ {} }}", h.params, h.body))
                .unwrap_or_default();
            let prefix = declared(self.ctx.cpp_name(id)?);
            w.line(format!(
                "{prefix}{target} = WebCore::convert<{idl}>(*global, {value}{handler});"
            ));
            if let (TypeKind::Integer(kind), Some(range)) = (ty.kind(), ty.flags().range) {
                if range.mode == RangeMode::Clamp && !range.uses_abi_bounds() {
                    if let Some((min, max)) = range.bounds(kind.abi()) {
                        let (min, max) = (cpp_int_literal(min), cpp_int_literal(max));
                        w.line(format!("if ({target} < {min}) {target} = {min};"));
                        w.line(format!("else if ({target} > {max}) {target} = {max};"));
                    }
                }
            }
            w.line("RETURN_IF_EXCEPTION(throwScope, {});");
            return Ok(());
        }

        match ty.kind() {
            TypeKind::Any => {
                let prefix = declared(self.ctx.cpp_name(id)?);
                w.line(format!("{prefix}{target} = JSC::JSValue::encode({value});"));
            }
            TypeKind::String(kind) => {
                let temp = w.next_temporary("wtfString");
                let (idl, store) = match kind {
                    StringKind::UsvString => ("WebCore::IDLUSVString", format!("{temp}.impl()")),
                    StringKind::DomString => ("WebCore::IDLDOMString", format!("{temp}.impl()")),
                    StringKind::ByteString => ("WebCore::IDLByteString", format!("{temp}.impl()")),
                    StringKind::Utf8String | StringKind::BunString => {
                        ("WebCore::IDLDOMString", format!("Bun::toString({temp})"))
                    }
                };
                w.line(format!(
                    "WTF::String {temp} = WebCore::convert<{idl}>(*global, {value});"
                ));
                w.line("RETURN_IF_EXCEPTION(throwScope, {});");
                let prefix = declared(self.ctx.cpp_name(id)?);
                w.line(format!("{prefix}{target} = {store};"));
            }
            TypeKind::Dictionary(_) => {
                if decl == Decl::Declare {
                    w.line(format!("{} {target};", self.ctx.cpp_name(id)?));
                }
                let definition = registry.get(registry.definition(id));
                let name = registry.name_of(id).unwrap_or_default();
                let converter = names::dictionary_converter(definition.namespace(), name);
                w.line(format!("if (!{converter}(&{target}, global, {value}))"));
                w.line("    return {};");
            }
            TypeKind::CustomNative(custom) => {
                w.line(format!("{target} = JSC::JSValue::encode({value});"));
                if let Some(validate) = &custom.validate {
                    let validator = names::custom_validator(validate);
                    if self.validators.insert(validator.clone()) {
                        self.internal.line(format!(
                            "extern \"C\" bool {validator}(JSC::EncodedJSValue);"
                        ));
                    }
                    let message = custom
                        .validate_error
                        .clone()
                        .unwrap_or_else(|| custom.native_type.clone());
                    let throw = self.throw_type_error(context, &message, value);
                    w.line(format!("if (!{validator}({target})) {{"));
                    w.line(format!("    {throw}"));
                    w.line("    return {};");
                    w.line("}");
                }
            }
            TypeKind::CustomManaged(custom) => {
                for header in &custom.headers {
                    self.headers
                        .ensure(header.clone(), &format!("custom managed type {}", custom.managed_type));
                }
                if decl == Decl::Declare {
                    w.line(format!("{} {target};", custom.managed_type));
                }
                let args: Vec<String> = custom
                    .from_js_args
                    .iter()
                    .map(|arg| match arg {
                        ManagedArg::Global => "global".to_string(),
                        ManagedArg::Value => value.to_string(),
                        ManagedArg::EncodedValue => format!("JSC::JSValue::encode({value})"),
                        ManagedArg::Out => format!("&{target}"),
                        ManagedArg::Text(text) => text.clone(),
                    })
                    .collect();
                let throw = self.throw_type_error(context, &custom.validate_error, value);
                w.line(format!("if (!{}({})) {{", custom.from_js, args.join(", ")));
                w.line(format!("    {throw}"));
                w.line("    return {};");
                w.line("}");
            }
            kind => {
                return Err(self.ctx.unsupported(
                    ty.origin(),
                    format!("cannot convert a call-site value to {}", kind.describe()),
                ))
            }
        }
        Ok(())
    }

    /// The declared default of `id` as a C++ expression.
    pub(crate) fn default_literal(&self, id: TypeId) -> CodegenResult<String> {
        let ty = self.ctx.registry.get(id);
        let Some(default) = &ty.flags().default else {
            return Err(self.ctx.unsupported(ty.origin(), "no default value declared"));
        };
        let literal = match (ty.kind(), default) {
            (_, DefaultValue::Boolean(b)) => b.to_string(),
            (TypeKind::F64, DefaultValue::Integer(i)) => cpp_double_literal(*i as f64),
            (_, DefaultValue::Integer(i)) => cpp_int_literal(*i as i128),
            (_, DefaultValue::Number(n)) => cpp_double_literal(*n),
            (TypeKind::String(kind), DefaultValue::String(s)) => match kind.abi() {
                AbiPrimitive::BunString => format!("Bun::toString(WTF::String({}_s))", string_literal(s)),
                _ => format!("WTF::String({}_s).releaseImpl().leakRef()", string_literal(s)),
            },
            (_, DefaultValue::Enum(variant)) => {
                let known = self
                    .ctx
                    .registry
                    .enum_variants(id)
                    .is_some_and(|variants| variants.iter().any(|v| &v.name == variant));
                if !known {
                    return Err(self.ctx.unsupported(
                        ty.origin(),
                        format!("`{variant}` is not a variant of this enum"),
                    ));
                }
                format!(
                    "{}::{}",
                    self.ctx.cpp_name(id)?,
                    crossbind_types::case::pascal(variant)
                )
            }
            (kind, _) => {
                return Err(self.ctx.unsupported(
                    ty.origin(),
                    format!("defaults are not supported for {}", kind.describe()),
                ))
            }
        };
        Ok(literal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals() {
        assert_eq!(cpp_int_literal(-5), "-5");
        assert_eq!(cpp_int_literal(u64::MAX as i128), "18446744073709551615ULL");
        assert_eq!(cpp_int_literal(i64::MIN as i128), "std::numeric_limits<int64_t>::min()");
        assert_eq!(cpp_double_literal(1.0), "1.0");
        assert_eq!(cpp_double_literal(0.25), "0.25");
        assert_eq!(cpp_double_literal(f64::NEG_INFINITY), "-std::numeric_limits<double>::infinity()");
    }

    #[test]
    fn subjects() {
        let arg = ExceptionContext::Argument { name: "path" };
        let prop = ExceptionContext::Property { key: "mode" };
        assert_eq!(arg.type_subject(), "\"path\" argument");
        assert_eq!(arg.value_subject(), "argument 'path'");
        assert_eq!(prop.type_subject(), "\"mode\" property");
        assert_eq!(prop.value_subject(), "property 'mode'");
    }
}
