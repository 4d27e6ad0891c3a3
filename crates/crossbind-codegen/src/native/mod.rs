//! The native side: one Zig file with a public struct per namespace and the
//! exported dispatch functions the managed side calls into.

use crossbind_layout::ExternStruct;
use crossbind_source::DefinitionFile;
use crossbind_types::case::snake;
use crossbind_types::{
    ArgStrategy, Argument, CustomNative, FromJsReturn, Function, GlobalObjectArg, NativeArg,
    ReturnStrategy, StringKind, TypeId, TypeKind,
};
use rustc_hash::FxHashSet;

use crate::context::{Declaration, GenerationContext};
use crate::error::{CodegenError, CodegenResult};
use crate::names::{self, string_literal, zid};
use crate::writer::CodeWriter;

const PRELUDE: &str = "\
const bun = @import(\"root\").bun;
const JSC = bun.JSC;
const JSValue = JSC.JSValue;
const JSHostFunctionType = JSC.JSHostFunctionType;

";

pub struct NativeEmitter<'a, 'ctx> {
    ctx: &'a GenerationContext<'ctx>,
    /// Public per-namespace structs.
    public: CodeWriter,
    /// Contents of `binding_internals`.
    internals: CodeWriter,
    validators: FxHashSet<String>,
}

/// What the implementation call fails with, in the dispatch function's return type.
fn failure_value(strategy: &ReturnStrategy) -> &'static str {
    match strategy {
        ReturnStrategy::Boxed => ".zero",
        ReturnStrategy::Void | ReturnStrategy::OutParam(_) => "false",
    }
}

fn import_name(namespace: &str) -> String {
    format!("import_{namespace}")
}

/// Zig name of a call-site argument.
fn arg_name(arg: &Argument) -> String {
    format!("arg_{}", snake(&arg.name))
}

/// Arms of the `switch` that maps the fixed error set to `failure`, closing the switch.
fn emit_error_arms(w: &mut CodeWriter, failure: &str) {
    w.line(format!("    error.JSError => return {failure},"));
    w.line(format!(
        "    error.OutOfMemory => global.throwOutOfMemory() catch return {failure},"
    ));
    w.line("};");
}

impl<'a, 'ctx> NativeEmitter<'a, 'ctx> {
    pub fn new(ctx: &'a GenerationContext<'ctx>) -> Self {
        Self {
            ctx,
            public: CodeWriter::new(),
            internals: CodeWriter::with_level(1),
            validators: FxHashSet::default(),
        }
    }

    /// Emits the namespace struct of `file` and the dispatch functions of its functions.
    ///
    /// `functions` must already be resolved.
    pub fn emit_file(&mut self, file: &DefinitionFile, functions: &[Function]) -> CodegenResult<()> {
        let namespace = &file.namespace;
        let relative = names::relative_path(self.ctx.native_output_dir(), &file.native_path);
        self.internals.line(format!(
            "const {} = @import({});",
            import_name(namespace),
            string_literal(&relative)
        ));

        self.public.line(format!(
            "/// Generated for {}",
            string_literal(&file.native_path.display().to_string())
        ));
        self.public.line(format!("pub const {} = struct {{", zid(namespace)));
        {
            let mut w = self.public.indent();
            for function in functions {
                let js = names::js_function(namespace, &function.name);
                let local = format!("js{}", crossbind_types::case::cap(&function.name));
                w.line(format!(
                    "pub const {local} = @extern(*const JSHostFunctionType, .{{ .name = {} }});",
                    string_literal(&js)
                ));
                let length = function
                    .variants
                    .iter()
                    .map(|v| v.min_required_args)
                    .min()
                    .unwrap_or(0);
                w.line(format!(
                    "pub fn create{}Callback(global: *JSC.JSGlobalObject) callconv(JSC.conv) JSValue {{",
                    crossbind_types::case::cap(&function.name)
                ));
                w.line(format!(
                    "    return JSC.NewRuntimeFunction(global, JSC.ZigString.static({}), {length}, {local}, false, false, null);",
                    string_literal(&function.name)
                ));
                w.line("}");
            }
        }
        let declarations = self.ctx.declarations(file);
        for declaration in &declarations {
            self.emit_declaration(declaration)?;
        }
        self.public.line("};");
        self.public.blank();

        for function in functions {
            self.emit_function(file, function)?;
        }
        Ok(())
    }

    fn emit_declaration(&mut self, declaration: &Declaration) -> CodegenResult<()> {
        let registry = self.ctx.registry;
        let (name, id) = match declaration {
            Declaration::Alias { name, id } => {
                if let Ok(spelling) = self.zig_type(*id) {
                    self.public
                        .line(format!("    pub const {} = {spelling};", zid(name)));
                }
                return Ok(());
            }
            Declaration::Named { name, id, inline } => {
                if *inline {
                    let origin = registry.get(*id).origin();
                    self.public.line(format!(
                        "    // Inline type from {}",
                        self.ctx.sources.location(origin)
                    ));
                }
                (name, *id)
            }
        };
        let ty = registry.get(id);
        let mut w = CodeWriter::with_level(1);
        match ty.kind() {
            TypeKind::StringEnum(values) => {
                let tag = registry.enum_tag(id).map(|t| t.zig_name()).unwrap_or("u8");
                w.line(format!("pub const {} = enum({tag}) {{", zid(name)));
                for value in values {
                    w.line(format!("    {},", zid(&snake(value))));
                }
                w.line("};");
            }
            TypeKind::NativeEnum(native) => {
                let Some(path) = self.ctx.enum_files.get(&id) else {
                    return Err(self.ctx.unsupported(ty.origin(), "native enum file was never located"));
                };
                let relative = names::relative_path(self.ctx.native_output_dir(), path);
                w.line(format!(
                    "pub const {} = @import({}).{};",
                    zid(name),
                    string_literal(&relative),
                    native.name
                ));
            }
            TypeKind::Dictionary(fields) => {
                w.line(format!("pub const {} = extern struct {{", zid(name)));
                for field in fields {
                    let layout = self.ctx.layout(field.ty)?;
                    w.line(format!("    {}: {},", zid(&snake(&field.key)), layout.zig_name()));
                }
                w.line("};");
            }
            TypeKind::CustomNative(custom) => {
                w.line(format!("pub const {} = {};", zid(name), custom.native_type));
            }
            TypeKind::CustomManaged(custom) => {
                w.line(format!("pub const {} = {};", zid(name), custom.native_type));
            }
            _ => {
                let spelling = self.zig_type(id)?;
                w.line(format!("pub const {} = {spelling};", zid(name)));
            }
        }
        self.public.append(w.as_str());
        Ok(())
    }

    /// Zig spelling of a value of `id`, `?T` when nullable.
    fn zig_type(&self, id: TypeId) -> CodegenResult<String> {
        let base = self.ctx.zig_name(id)?;
        if self.ctx.registry.get(id).is_nullable() {
            Ok(format!("?{base}"))
        } else {
            Ok(base)
        }
    }

    fn emit_function(&mut self, file: &DefinitionFile, function: &Function) -> CodegenResult<()> {
        for (index, variant) in function.variants.iter().enumerate() {
            self.check_implementation(file, function, index)?;
            if let Some(buffer) = &variant.communication_struct {
                self.emit_communication_struct(buffer)?;
            }
            self.emit_variant(file, function, index)?;
        }
        Ok(())
    }

    fn check_implementation(
        &self,
        file: &DefinitionFile,
        function: &Function,
        index: usize,
    ) -> CodegenResult<()> {
        let Some(native) = &file.native else {
            return Ok(());
        };
        let implementation = function.implementation_name(index);
        if native.declares_function(&implementation) {
            return Ok(());
        }
        let variant = &function.variants[index];
        Err(CodegenError::MissingImplementation {
            symbol: format!("{}{implementation}", function.prefix),
            file: file.native_path.clone(),
            src: self.ctx.sources.named_source(variant.origin.file),
            span: variant.origin.span,
        })
    }

    fn emit_communication_struct(&mut self, buffer: &ExternStruct) -> CodegenResult<()> {
        let name = buffer.name().unwrap_or_default();
        let layout = buffer.compute_layout()?;
        let w = &mut self.internals;
        w.line(format!("const {name} = extern struct {{"));
        for field in buffer.fields() {
            w.line(format!("    {}: {},", zid(&snake(&field.name)), field.ty.zig_name()));
        }
        w.line("};");
        w.line("comptime {");
        w.line(format!(
            "    if (@sizeOf({name}) != {}) @compileError(\"{name} has incorrect size\");",
            layout.size_bytes
        ));
        w.line(format!(
            "    if (@alignOf({name}) != {}) @compileError(\"{name} has incorrect alignment\");",
            layout.align_bytes
        ));
        for field in &layout.fields {
            w.line(format!(
                "    if (@offsetOf({name}, \"{}\") != {}) @compileError(\"{name}.{} has incorrect offset\");",
                snake(&field.name),
                field.offset_bytes,
                field.name
            ));
        }
        w.line("}");
        Ok(())
    }

    fn strategy<'s>(&self, arg: &'s Argument) -> CodegenResult<&'s ArgStrategy> {
        arg.strategy
            .as_ref()
            .ok_or_else(|| self.ctx.unsupported(arg.origin, "argument has no lowering strategy"))
    }

    fn emit_variant(
        &mut self,
        file: &DefinitionFile,
        function: &Function,
        index: usize,
    ) -> CodegenResult<()> {
        let registry = self.ctx.registry;
        let variant = &function.variants[index];
        let return_strategy = variant
            .return_strategy
            .as_ref()
            .ok_or_else(|| self.ctx.unsupported(variant.origin, "variant has no return strategy"))?;
        let failure = failure_value(return_strategy);
        let context_index = match variant.global_object_arg {
            Some(GlobalObjectArg::Index(i)) => Some(i),
            _ => None,
        };

        let mut params = Vec::new();
        if variant.global_object_arg == Some(GlobalObjectArg::Hidden) {
            params.push("global: *JSC.JSGlobalObject".to_string());
        }
        for (position, arg) in variant.args.iter().enumerate() {
            match self.strategy(arg)? {
                ArgStrategy::Context if context_index == Some(position) => {
                    params.push("global: *JSC.JSGlobalObject".to_string());
                }
                ArgStrategy::Context => params.push(format!("{}: *JSC.JSGlobalObject", arg_name(arg))),
                ArgStrategy::Value(layout) => {
                    params.push(format!("{}: {}", arg_name(arg), layout.zig_name()))
                }
                ArgStrategy::Pointer(layout) => {
                    params.push(format!("{}: *const {}", arg_name(arg), layout.zig_name()))
                }
                ArgStrategy::Ignored | ArgStrategy::Buffer { .. } => {}
            }
        }
        if let Some(buffer) = &variant.communication_struct {
            params.push(format!("buf: *{}", buffer.name().unwrap_or_default()));
        }
        let ret = match return_strategy {
            ReturnStrategy::Boxed => "JSValue".to_string(),
            ReturnStrategy::OutParam(layout) => {
                params.push(format!("out: *{}", layout.zig_name()));
                "bool".to_string()
            }
            ReturnStrategy::Void => "bool".to_string(),
        };

        let dispatch = names::dispatch_variant(&file.namespace, &function.name, index + 1);
        let import = import_name(&file.namespace);
        let container = match function.prefix.trim_end_matches('.') {
            "" => import.clone(),
            prefix => format!("{import}.{prefix}"),
        };
        let implementation = function.implementation_name(index);

        let mut w = CodeWriter::new();
        w.line(format!("export fn {dispatch}({}) {ret} {{", params.join(", ")));
        {
            let mut body = w.indent();
            body.line(format!(
                "if (!@hasDecl({container}, {})) @compileError({});",
                string_literal(&implementation),
                string_literal(&format!(
                    "Missing binding declaration \"{}{implementation}\" in \"{}\"",
                    function.prefix,
                    file.native_path.display()
                ))
            ));

            let mut call_args = Vec::new();
            for (position, arg) in variant.args.iter().enumerate() {
                let ty = registry.get(arg.ty);
                let name = if context_index == Some(position) {
                    "global".to_string()
                } else {
                    arg_name(arg)
                };
                match self.strategy(arg)? {
                    ArgStrategy::Ignored => {}
                    ArgStrategy::Context => match ty.kind() {
                        TypeKind::VirtualMachine => call_args.push(format!("{name}.bunVM()")),
                        _ => call_args.push(name),
                    },
                    strategy @ (ArgStrategy::Value(_) | ArgStrategy::Pointer(_)) => {
                        let value = if matches!(strategy, ArgStrategy::Pointer(_)) {
                            format!("{name}.*")
                        } else {
                            name.clone()
                        };
                        if ty.kind() == &TypeKind::String(StringKind::Utf8String) {
                            body.line(format!(
                                "const {name}_utf8 = {value}.toUTF8(bun.default_allocator);"
                            ));
                            body.line(format!("defer {name}_utf8.deinit();"));
                            call_args.push(format!("{name}_utf8.slice()"));
                        } else {
                            call_args.push(value);
                        }
                    }
                    ArgStrategy::Buffer { children, .. } => {
                        let fields: Vec<String> = children
                            .iter()
                            .map(|slot| format!("buf.{}", zid(&snake(&slot.field))))
                            .collect();
                        let (set, value) = match fields.as_slice() {
                            [set, value] => (Some(set.as_str()), value.as_str()),
                            [value] => (None, value.as_str()),
                            _ => {
                                return Err(self.ctx.unsupported(
                                    arg.origin,
                                    format!("argument `{}` has an unexpected buffer shape", arg.name),
                                ))
                            }
                        };
                        if let TypeKind::CustomNative(custom) = ty.kind() {
                            self.emit_custom_decode(
                                &mut body, arg.ty, custom, &name, set, value, failure,
                            )?;
                            call_args.push(name);
                        } else if let Some(set) = set {
                            call_args.push(format!("if ({set}) {value} else null"));
                        } else {
                            call_args.push(value.to_string());
                        }
                    }
                }
            }

            let call = format!("{container}.{}(", zid(&implementation));
            match return_strategy {
                ReturnStrategy::Boxed => {
                    let head = format!("return JSC.toJSHostValue(global, {call}");
                    emit_zig_call(&mut body, &head, &call_args, "));");
                }
                ReturnStrategy::OutParam(layout) => {
                    let head = format!("out.* = @as(bun.JSError!{}, {call}", layout.zig_name());
                    emit_zig_call(&mut body, &head, &call_args, ")) catch |err| switch (err) {");
                    emit_error_arms(&mut body, failure);
                    body.line("return true;");
                }
                ReturnStrategy::Void => {
                    let head = format!("@as(bun.JSError!void, {call}");
                    emit_zig_call(&mut body, &head, &call_args, ")) catch |err| switch (err) {");
                    emit_error_arms(&mut body, failure);
                    body.line("return true;");
                }
            }
        }
        w.line("}");
        self.internals.append(&indent_block(w.as_str(), self.internals.level()));
        Ok(())
    }

    /// Decodes a custom native argument from its boxed value and schedules its release.
    #[allow(clippy::too_many_arguments)]
    fn emit_custom_decode(
        &mut self,
        w: &mut CodeWriter,
        id: TypeId,
        custom: &CustomNative,
        name: &str,
        set: Option<&str>,
        value: &str,
        failure: &str,
    ) -> CodegenResult<()> {
        let registry = self.ctx.registry;
        let namespace = registry.get(registry.definition(id)).namespace().to_string();
        let import = import_name(&namespace);
        if let Some(validate) = &custom.validate {
            self.emit_validator(&import, validate);
        }

        let hook_args = |args: &[NativeArg]| -> String {
            args.iter()
                .map(|arg| match arg {
                    NativeArg::Global => "global".to_string(),
                    NativeArg::Value => value.to_string(),
                    NativeArg::Allocator => "bun.default_allocator".to_string(),
                    NativeArg::Text(text) => text.clone(),
                })
                .collect::<Vec<_>>()
                .join(", ")
        };
        let decode = format!("{import}.{}({})", custom.from_js, hook_args(&custom.from_js_args));
        let native_type = &custom.native_type;

        match set {
            Some(set) => {
                w.line(format!("var {name}: ?{native_type} = null;"));
                w.line(format!("if ({set}) {{"));
                {
                    let mut inner = w.indent();
                    emit_decode(&mut inner, &format!("{name} = "), &decode, custom.from_js_return, failure);
                }
                w.line("}");
                if let Some(deinit) = &custom.deinit {
                    w.line(format!(
                        "defer if ({name}) |v| v.{deinit}({});",
                        hook_args(&custom.deinit_args)
                    ));
                }
            }
            None => {
                emit_decode(w, &format!("const {name} = "), &decode, custom.from_js_return, failure);
                if let Some(deinit) = &custom.deinit {
                    w.line(format!("defer {name}.{deinit}({});", hook_args(&custom.deinit_args)));
                }
            }
        }
        Ok(())
    }

    fn emit_validator(&mut self, import: &str, validate: &str) {
        let exported = names::custom_validator(validate);
        if !self.validators.insert(exported.clone()) {
            return;
        }
        self.internals.line(format!("pub export fn {exported}(value: JSValue) bool {{"));
        self.internals.line(format!("    return {import}.{validate}(value);"));
        self.internals.line("}");
    }

    /// Assembles the Zig file.
    pub fn finish(self) -> String {
        let mut out = String::from(PRELUDE);
        out.push_str(self.public.as_str());
        out.push_str("const binding_internals = struct {\n");
        out.push_str(self.internals.as_str());
        out.push_str("};\n\n");
        out.push_str("comptime {\n");
        out.push_str("    if (bun.Environment.export_cpp_apis) {\n");
        out.push_str("        for (@typeInfo(binding_internals).Struct.decls) |decl| {\n");
        out.push_str("            _ = &@field(binding_internals, decl.name);\n");
        out.push_str("        }\n");
        out.push_str("    }\n");
        out.push_str("}\n");
        out
    }
}

fn emit_decode(w: &mut CodeWriter, assign: &str, decode: &str, kind: FromJsReturn, failure: &str) {
    match kind {
        FromJsReturn::Value => w.line(format!("{assign}{decode};")),
        FromJsReturn::Optional => w.line(format!("{assign}{decode} orelse return {failure};")),
        FromJsReturn::Error => {
            w.line(format!("{assign}{decode} catch |err| switch (err) {{"));
            emit_error_arms(w, failure);
        }
    }
}

/// `head` + one argument per line, each followed by a comma, + `tail`.
fn emit_zig_call(w: &mut CodeWriter, head: &str, args: &[String], tail: &str) {
    if args.is_empty() {
        w.line(format!("{head}{tail}"));
        return;
    }
    w.line(head);
    {
        let mut inner = w.indent();
        for arg in args {
            inner.line(format!("{arg},"));
        }
    }
    w.line(tail);
}

/// Re-indents a block written at level zero to `level`.
fn indent_block(text: &str, level: usize) -> String {
    let prefix = "    ".repeat(level);
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        if !line.is_empty() {
            out.push_str(&prefix);
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_values() {
        assert_eq!(failure_value(&ReturnStrategy::Boxed), ".zero");
        assert_eq!(failure_value(&ReturnStrategy::Void), "false");
    }

    #[test]
    fn blocks_are_reindented() {
        assert_eq!(indent_block("a {\n    b;\n\n}\n", 1), "    a {\n        b;\n\n    }\n");
    }
}
