//! The managed-runtime side: one C++ translation unit holding every host
//! function, the argument conversion glue and the communication structs.

mod convert;
mod types;

use crossbind_source::DefinitionFile;
use crossbind_types::case::cap;
use crossbind_types::{
    ArgStrategy, Function, GlobalObjectArg, ReturnStrategy, StringKind, TypeKind, Variant,
};
use rustc_hash::FxHashSet;

use crate::context::{GenerationContext, Headers};
use crate::dispatch::{DispatchPlan, Selection};
use crate::error::CodegenResult;
use crate::names;
use crate::writer::CodeWriter;

pub use convert::ExceptionContext;
pub(crate) use types::enum_trait_declarations;

const BASE_HEADERS: [&str; 9] = [
    "root.h",
    "IDLTypes.h",
    "JSDOMBinding.h",
    "JSDOMConvertBase.h",
    "JSDOMConvertBoolean.h",
    "JSDOMConvertNumbers.h",
    "JSDOMConvertStrings.h",
    "JSDOMExceptionHandling.h",
    "JSDOMOperation.h",
];

/// Whether a conversion introduces its target or assigns to existing storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decl {
    Declare,
    Assign,
}

pub struct ManagedEmitter<'a, 'ctx> {
    ctx: &'a GenerationContext<'ctx>,
    headers: Headers,
    /// Communication structs and validator declarations.
    internal: CodeWriter,
    /// Everything inside `namespace Generated`.
    body: CodeWriter,
    validators: FxHashSet<String>,
}

impl<'a, 'ctx> ManagedEmitter<'a, 'ctx> {
    pub fn new(ctx: &'a GenerationContext<'ctx>) -> Self {
        let mut headers = Headers::new();
        for header in BASE_HEADERS {
            headers.ensure(header, "");
        }
        let mut internal = CodeWriter::new();
        internal.line("// These definitions are for communication between C++ and Zig.");
        internal.line("// Field layout is decided by the binding generator and is not");
        internal.line("// intended for use outside generated binding code.");
        Self {
            ctx,
            headers,
            internal,
            body: CodeWriter::new(),
            validators: FxHashSet::default(),
        }
    }

    /// Emits the host function for `function` and everything it calls.
    ///
    /// `plan` is required when the function has more than one variant.
    pub fn emit_function(
        &mut self,
        file: &DefinitionFile,
        function: &Function,
        plan: Option<&DispatchPlan>,
    ) -> CodegenResult<()> {
        let mut w = CodeWriter::new();
        let namespace = &file.namespace;
        let overloaded = function.variants.len() > 1;
        w.line(format!(
            "// Dispatch for \"fn {}(...)\" in \"{}\"",
            names::zid(&function.name),
            file.native_path.display()
        ));

        for (index, variant) in function.variants.iter().enumerate() {
            let number = index + 1;
            let dispatch = names::dispatch_variant(namespace, &function.name, number);
            self.emit_dispatch_declaration(&mut w, variant, &dispatch)?;
            for arg in &variant.args {
                self.ensure_type_header(arg.ty);
            }
            if let Some(buffer) = &variant.communication_struct {
                self.emit_communication_struct(buffer)?;
            }

            if overloaded {
                let internal = names::internal_dispatch_variant(namespace, &function.name, number);
                w.line(format!(
                    "extern \"C\" SYSV_ABI JSC::EncodedJSValue {internal}(JSC::JSGlobalObject* global, JSC::CallFrame* callFrame)"
                ));
                w.line("{");
                {
                    let mut body = w.indent();
                    body.reset_temporaries();
                    self.emit_variant_call(&mut body, function, variant, &dispatch)?;
                }
                w.line("}");
            }
        }

        let host = names::js_function(namespace, &function.name);
        w.line(format!(
            "extern \"C\" SYSV_ABI JSC::EncodedJSValue {host}(JSC::JSGlobalObject* global, JSC::CallFrame* callFrame)"
        ));
        w.line("{");
        {
            let mut body = w.indent();
            body.reset_temporaries();
            match (function.variants.as_slice(), plan) {
                ([only], _) => {
                    let dispatch = names::dispatch_variant(namespace, &function.name, 1);
                    self.emit_variant_call(&mut body, function, only, &dispatch)?;
                }
                (_, Some(plan)) => self.emit_selector(&mut body, namespace, function, plan),
                (_, None) => {
                    return Err(self.ctx.unsupported(
                        function.origin,
                        format!("`{}` has no dispatch plan", function.name),
                    ))
                }
            }
        }
        w.line("}");
        w.blank();

        self.body.append(w.as_str());
        Ok(())
    }

    fn emit_dispatch_declaration(
        &mut self,
        w: &mut CodeWriter,
        variant: &Variant,
        dispatch: &str,
    ) -> CodegenResult<()> {
        let mut params = Vec::new();
        if variant.global_object_arg == Some(GlobalObjectArg::Hidden) {
            params.push("JSC::JSGlobalObject*".to_string());
        }
        for arg in &variant.args {
            match self.strategy(arg.strategy.as_ref(), arg.origin)? {
                ArgStrategy::Context => params.push("JSC::JSGlobalObject*".to_string()),
                ArgStrategy::Pointer(layout) => {
                    self.ensure_type_header(arg.ty);
                    params.push(format!("const {}*", layout.cpp_name()));
                }
                ArgStrategy::Value(layout) => {
                    self.ensure_type_header(arg.ty);
                    params.push(layout.cpp_name().to_string());
                }
                ArgStrategy::Ignored | ArgStrategy::Buffer { .. } => {}
            }
        }
        if let Some(buffer) = &variant.communication_struct {
            params.push(format!("{}*", buffer.name().unwrap_or_default()));
        }
        let ret = match self.return_strategy(variant)? {
            ReturnStrategy::Boxed => "JSC::EncodedJSValue",
            ReturnStrategy::OutParam(layout) => {
                self.ensure_type_header(variant.ret);
                params.push(format!("{}*", layout.cpp_name()));
                "bool"
            }
            ReturnStrategy::Void => "bool",
        };
        w.line(format!("extern \"C\" {ret} {dispatch}({});", params.join(", ")));
        Ok(())
    }

    /// Converts the call frame of one variant and calls its native entry point.
    fn emit_variant_call(
        &mut self,
        w: &mut CodeWriter,
        function: &Function,
        variant: &Variant,
        dispatch: &str,
    ) -> CodegenResult<()> {
        let registry = self.ctx.registry;
        w.line("auto& vm = JSC::getVM(global);");
        w.line("auto throwScope = DECLARE_THROW_SCOPE(vm);");
        if variant.min_required_args > 0 {
            w.line("size_t argumentCount = callFrame->argumentCount();");
            w.line(format!("if (argumentCount < {}) {{", variant.min_required_args));
            w.line("    return JSC::throwVMError(global, throwScope, createNotEnoughArgumentsError(global));");
            w.line("}");
        }
        if let Some(buffer) = &variant.communication_struct {
            w.line(format!("{} buf;", buffer.name().unwrap_or_default()));
        }
        if self.ctx.debug {
            self.emit_plan_comment(w, variant)?;
        }

        let mut position = 0;
        for arg in &variant.args {
            let ty = registry.get(arg.ty);
            let strategy = self.strategy(arg.strategy.as_ref(), arg.origin)?;
            let storage = match strategy {
                ArgStrategy::Context => continue,
                ArgStrategy::Ignored => {
                    position += 1;
                    continue;
                }
                ArgStrategy::Value(_) | ArgStrategy::Pointer(_) => format!("arg{}", cap(&arg.name)),
                ArgStrategy::Buffer { prefix, .. } => format!("buf.{prefix}"),
            };
            let in_buffer = matches!(strategy, ArgStrategy::Buffer { .. });

            let accessor = if variant.min_required_args > position {
                "uncheckedArgument"
            } else {
                "argument"
            };
            w.line(format!(
                "JSC::EnsureStillAliveScope arg{position} = callFrame->{accessor}({position});"
            ));
            let value = format!("arg{position}.value()");
            let context = ExceptionContext::Argument {
                name: &arg.name,
            };
            let flags = ty.flags();

            if flags.is_optional_to_user() {
                if !in_buffer {
                    self.ensure_type_header(arg.ty);
                    w.line(format!("{} {storage};", self.ctx.cpp_name(arg.ty)?));
                }
                let absent = if flags.non_null {
                    "isUndefined"
                } else {
                    "isUndefinedOrNull"
                };
                let target = if ty.is_nullable() {
                    w.line(format!("if (({storage}Set = !{value}.{absent}())) {{"));
                    format!("{storage}Value")
                } else {
                    w.line(format!("if (!{value}.{absent}()) {{"));
                    storage.clone()
                };
                {
                    let mut inner = w.indent();
                    self.convert_value(&mut inner, &target, arg.ty, &value, &context, true, Decl::Assign)?;
                }
                if flags.default.is_some() {
                    w.line("} else {");
                    let default = self.default_literal(arg.ty)?;
                    w.line(format!("    {target} = {default};"));
                }
                w.line("}");
            } else {
                let decl = if in_buffer { Decl::Assign } else { Decl::Declare };
                self.convert_value(w, &storage, arg.ty, &value, &context, false, decl)?;
            }
            position += 1;
        }

        let mut call_args = Vec::new();
        if variant.global_object_arg == Some(GlobalObjectArg::Hidden) {
            call_args.push("global".to_string());
        }
        for arg in &variant.args {
            match self.strategy(arg.strategy.as_ref(), arg.origin)? {
                ArgStrategy::Context => call_args.push("global".to_string()),
                ArgStrategy::Pointer(_) => call_args.push(format!("&arg{}", cap(&arg.name))),
                ArgStrategy::Value(_) => call_args.push(format!("arg{}", cap(&arg.name))),
                ArgStrategy::Ignored | ArgStrategy::Buffer { .. } => {}
            }
        }
        if variant.communication_struct.is_some() {
            call_args.push("&buf".to_string());
        }

        match self.return_strategy(variant)? {
            ReturnStrategy::Boxed => {
                emit_call(w, &format!("return {dispatch}("), &call_args, ");");
            }
            ReturnStrategy::Void => {
                emit_call(w, &format!("if (!{dispatch}("), &call_args, ")) {");
                w.line("    return {};");
                w.line("}");
                w.line("return JSC::JSValue::encode(JSC::jsUndefined());");
            }
            ReturnStrategy::OutParam(layout) => {
                w.line(format!("{} out;", layout.cpp_name()));
                call_args.push("&out".to_string());
                emit_call(w, &format!("if (!{dispatch}("), &call_args, ")) {");
                w.line("    return {};");
                w.line("}");
                self.emit_return_conversion(w, function, variant)?;
            }
        }
        Ok(())
    }

    fn emit_return_conversion(
        &mut self,
        w: &mut CodeWriter,
        function: &Function,
        variant: &Variant,
    ) -> CodegenResult<()> {
        if let Some(idl) = self.simple_idl(variant.ret)? {
            w.line(format!(
                "return JSC::JSValue::encode(WebCore::toJS<{idl}>(*global, out));"
            ));
            return Ok(());
        }
        match self.ctx.registry.get(variant.ret).kind() {
            TypeKind::String(StringKind::DomString) => {
                w.line("return JSC::JSValue::encode(WebCore::toJS<WebCore::IDLDOMString>(*global, out));");
            }
            TypeKind::String(StringKind::BunString) => {
                w.line("JSC::JSValue js = JSC::jsString(vm, out.toWTFString());");
                w.line("out.deref();");
                w.line("return JSC::JSValue::encode(js);");
            }
            kind => {
                return Err(self.ctx.unsupported(
                    variant.origin,
                    format!("`{}` cannot return {}", function.name, kind.describe()),
                ))
            }
        }
        Ok(())
    }

    /// Picks a variant from the argument count and, where needed, one argument's category.
    fn emit_selector(
        &mut self,
        w: &mut CodeWriter,
        namespace: &str,
        function: &Function,
        plan: &DispatchPlan,
    ) {
        w.line("auto& vm = JSC::getVM(global);");
        w.line("auto throwScope = DECLARE_THROW_SCOPE(vm);");
        if plan.needs_argument_count() {
            w.line(format!(
                "size_t argumentCount = std::min<size_t>(callFrame->argumentCount(), {});",
                plan.max_args
            ));
        }
        if plan.min_required_args > 0 {
            w.line(format!("if (argumentCount < {}) {{", plan.min_required_args));
            w.line("    return JSC::throwVMError(global, throwScope, createNotEnoughArgumentsError(global));");
            w.line("}");
        }

        let call = |index: usize| {
            format!(
                "return {}(global, callFrame);",
                names::internal_dispatch_variant(namespace, &function.name, index + 1)
            )
        };
        for group in &plan.groups {
            if group.check_count {
                w.line(format!("if (argumentCount >= {}) {{", group.arg_count));
                {
                    let mut inner = w.indent();
                    emit_selection(&mut inner, &group.selection, &call);
                }
                w.line("}");
            } else {
                emit_selection(w, &group.selection, &call);
            }
        }
    }

    fn emit_plan_comment(&self, w: &mut CodeWriter, variant: &Variant) -> CodegenResult<()> {
        w.line(format!("// global object: {:?}", variant.global_object_arg));
        for arg in &variant.args {
            let plan = match self.strategy(arg.strategy.as_ref(), arg.origin)? {
                ArgStrategy::Context => "context".to_string(),
                ArgStrategy::Ignored => "ignored".to_string(),
                ArgStrategy::Value(layout) => format!("by value as {}", layout.cpp_name()),
                ArgStrategy::Pointer(layout) => format!("by pointer to {}", layout.cpp_name()),
                ArgStrategy::Buffer { children, .. } => {
                    let fields: Vec<_> = children
                        .iter()
                        .map(|slot| format!("{}: {}", slot.field, slot.abi.cpp_name()))
                        .collect();
                    format!("buffer [{}]", fields.join(", "))
                }
            };
            w.line(format!("// {}: {plan}", arg.name));
        }
        let ret = match self.return_strategy(variant)? {
            ReturnStrategy::Void => "void".to_string(),
            ReturnStrategy::Boxed => "boxed value".to_string(),
            ReturnStrategy::OutParam(layout) => format!("out parameter {}", layout.cpp_name()),
        };
        w.line(format!("// returns: {ret}"));
        Ok(())
    }

    fn strategy<'s>(
        &self,
        strategy: Option<&'s ArgStrategy>,
        origin: crossbind_types::Origin,
    ) -> CodegenResult<&'s ArgStrategy> {
        strategy.ok_or_else(|| self.ctx.unsupported(origin, "argument has no lowering strategy"))
    }

    fn return_strategy<'v>(&self, variant: &'v Variant) -> CodegenResult<&'v ReturnStrategy> {
        variant
            .return_strategy
            .as_ref()
            .ok_or_else(|| self.ctx.unsupported(variant.origin, "variant has no return strategy"))
    }

    fn ensure_type_header(&mut self, id: crossbind_types::TypeId) {
        if let Some(header) = self.ctx.header_for(id) {
            self.headers.ensure(header, "");
        }
    }

    /// Assembles the translation unit.
    pub fn finish(mut self) -> CodegenResult<String> {
        let traits = self.emit_enum_traits()?;
        let mut out = self.headers.render();
        out.push('\n');
        out.push_str(self.internal.as_str());
        out.push('\n');
        out.push_str("namespace Generated {\n\n");
        out.push_str(self.body.as_str());
        out.push_str("} // namespace Generated\n\n");
        if !traits.is_empty() {
            out.push_str("namespace WebCore {\n\n");
            out.push_str(&traits);
            out.push_str("} // namespace WebCore\n\n");
        }
        Ok(out)
    }
}

/// `head` + one argument per line + `tail`; a call without arguments stays on one line.
fn emit_call(w: &mut CodeWriter, head: &str, args: &[String], tail: &str) {
    if args.is_empty() {
        w.line(format!("{head}{tail}"));
        return;
    }
    w.line(head);
    {
        let mut inner = w.indent();
        let last = args.len() - 1;
        for (i, arg) in args.iter().enumerate() {
            if i == last {
                inner.line(arg);
            } else {
                inner.line(format!("{arg},"));
            }
        }
    }
    w.line(tail);
}

fn emit_selection(w: &mut CodeWriter, selection: &Selection, call: &dyn Fn(usize) -> String) {
    match selection {
        Selection::Single(index) => w.line(call(*index)),
        Selection::ByCategory {
            arg_index,
            tests,
            fallback,
        } => {
            w.line(format!(
                "JSC::JSValue distinguishingValue = callFrame->uncheckedArgument({arg_index});"
            ));
            for (category, index) in tests {
                w.line(format!("if (distinguishingValue.{}()) {{", category.test_method()));
                w.line(format!("    {}", call(*index)));
                w.line("}");
            }
            w.line(call(*fallback));
        }
    }
}
