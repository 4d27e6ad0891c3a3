//! Per-variant lowering plans.
//!
//! Every argument of every variant gets an [`ArgStrategy`], every variant a
//! [`ReturnStrategy`] and, when any argument needs one, a communication
//! struct. Both emitters read these plans and never decide on their own.

use crossbind_layout::{AbiPrimitive, AbiType, ExternStruct};
use crossbind_source::SourceMap;
use crossbind_types::{
    ArgStrategy, Argument, BufferSlot, Function, GlobalObjectArg, ReturnStrategy, StringKind,
    TypeId, TypeKind, TypeRegistry, Variant,
};

use crate::error::{CodegenError, CodegenResult};
use crate::names;

/// Policy knobs for lowering decisions.
#[derive(Debug, Clone)]
pub struct StrategyResolver {
    /// Flat kinds passed by value instead of through a const pointer.
    pub value_pass: Vec<AbiPrimitive>,
    pub reorder_fields: bool,
}

impl Default for StrategyResolver {
    fn default() -> Self {
        Self {
            value_pass: vec![
                AbiPrimitive::OpaquePointer,
                AbiPrimitive::GlobalObjectPointer,
                AbiPrimitive::StringImplPointer,
            ],
            reorder_fields: true,
        }
    }
}

impl StrategyResolver {
    pub fn new(value_pass: Vec<AbiPrimitive>, reorder_fields: bool) -> Self {
        Self {
            value_pass,
            reorder_fields,
        }
    }

    pub fn resolve_function(
        &self,
        function: &mut Function,
        registry: &TypeRegistry,
        sources: &SourceMap,
    ) -> CodegenResult<()> {
        let count = function.variants.len();
        for (index, variant) in function.variants.iter_mut().enumerate() {
            let struct_name =
                names::communication_struct(&function.namespace, &function.name, index, count);
            self.resolve_variant(variant, &struct_name, registry, sources)?;
            log::debug!(
                "{}::{} variant {}: args {:?}, returns {:?}",
                function.namespace,
                function.name,
                index + 1,
                variant
                    .args
                    .iter()
                    .map(|a| a.strategy.as_ref())
                    .collect::<Vec<_>>(),
                variant.return_strategy
            );
        }
        Ok(())
    }

    pub fn resolve_variant(
        &self,
        variant: &mut Variant,
        struct_name: &str,
        registry: &TypeRegistry,
        sources: &SourceMap,
    ) -> CodegenResult<()> {
        let mut buffer = ExternStruct::new();
        let mut global = None;

        for (index, arg) in variant.args.iter_mut().enumerate() {
            let ty = registry.get(arg.ty);
            let strategy = if ty.is_context_argument() {
                global.get_or_insert(GlobalObjectArg::Index(index));
                ArgStrategy::Context
            } else if ty.is_ignorable() {
                ArgStrategy::Ignored
            } else if let Some(layout) = registry.flat_layout(arg.ty) {
                let passed_by_value = layout
                    .as_primitive()
                    .is_some_and(|prim| self.value_pass.contains(&prim));
                if passed_by_value {
                    ArgStrategy::Value(layout)
                } else {
                    ArgStrategy::Pointer(layout)
                }
            } else {
                self.buffer_strategy(arg, &mut buffer, registry, sources)?
            };
            arg.strategy = Some(strategy);
        }

        variant.global_object_arg = Some(global.unwrap_or(GlobalObjectArg::Hidden));
        variant.return_strategy = Some(self.return_strategy(variant.ret, registry, sources)?);

        if buffer.is_empty() {
            variant.communication_struct = None;
        } else {
            if self.reorder_fields {
                buffer.reorder_for_smallest_size();
            }
            buffer.assign_generated_name(struct_name);
            variant.communication_struct = Some(buffer);
        }
        Ok(())
    }

    /// Allocates the communication-struct fields owned by `arg`.
    fn buffer_strategy(
        &self,
        arg: &Argument,
        buffer: &mut ExternStruct,
        registry: &TypeRegistry,
        sources: &SourceMap,
    ) -> CodegenResult<ArgStrategy> {
        let ty = registry.get(arg.ty);
        let prefix = arg.name.clone();
        let mut children = Vec::new();

        let value_field = if ty.is_nullable() {
            if ty.kind() == &TypeKind::String(StringKind::Utf8String) {
                return Err(CodegenError::unsupported(
                    sources,
                    arg.origin,
                    format!("optional UTF8String argument `{}` needs a default", arg.name),
                ));
            }
            let set = format!("{prefix}Set");
            buffer.add(set.clone(), AbiPrimitive::Bool.into());
            children.push(BufferSlot {
                field: set,
                abi: AbiPrimitive::Bool.into(),
            });
            format!("{prefix}Value")
        } else {
            prefix.clone()
        };

        let abi = slot_layout(arg.ty, registry).ok_or_else(|| {
            CodegenError::unsupported(
                sources,
                arg.origin,
                format!(
                    "argument `{}` of kind {} cannot cross the boundary",
                    arg.name,
                    ty.kind().describe()
                ),
            )
        })?;
        buffer.add(value_field.clone(), abi.clone());
        children.push(BufferSlot {
            field: value_field,
            abi,
        });

        Ok(ArgStrategy::Buffer { prefix, children })
    }

    fn return_strategy(
        &self,
        ret: TypeId,
        registry: &TypeRegistry,
        sources: &SourceMap,
    ) -> CodegenResult<ReturnStrategy> {
        let ty = registry.get(ret);
        let convertible = match ty.kind() {
            TypeKind::Undefined => return Ok(ReturnStrategy::Void),
            TypeKind::Any => return Ok(ReturnStrategy::Boxed),
            TypeKind::Boolean
            | TypeKind::Integer(_)
            | TypeKind::F64
            | TypeKind::StringEnum(_)
            | TypeKind::NativeEnum(_) => true,
            TypeKind::String(kind) => {
                matches!(kind, StringKind::DomString | StringKind::BunString)
            }
            _ => false,
        };
        match registry.flat_layout(ret) {
            Some(layout) if convertible => Ok(ReturnStrategy::OutParam(layout)),
            _ => Err(CodegenError::unsupported(
                sources,
                ty.origin(),
                format!("returning {} is not supported", describe_type(ret, registry)),
            )),
        }
    }
}

/// What one buffer slot holds for a value of `id`.
fn slot_layout(id: TypeId, registry: &TypeRegistry) -> Option<AbiType> {
    match registry.get(id).kind() {
        TypeKind::CustomNative(_) => Some(AbiPrimitive::JsValue.into()),
        _ => registry.value_layout(id),
    }
}

/// Short label for a type in diagnostics, e.g. `DOMString` or `dictionary OpenOptions`.
pub fn describe_type(id: TypeId, registry: &TypeRegistry) -> String {
    let ty = registry.get(id);
    let base = match (ty.kind(), registry.name_of(id)) {
        (TypeKind::Integer(int), _) => int.key().to_string(),
        (TypeKind::String(kind), _) => kind.key().to_string(),
        (kind, Some(name)) => format!("{} {name}", kind.describe()),
        (kind, None) => kind.describe().to_string(),
    };
    if ty.flags().is_optional_to_user() {
        format!("{base}?")
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbind_source::Loader;

    fn resolve(contents: &str) -> CodegenResult<Vec<Function>> {
        let mut loader = Loader::new();
        loader.add_file("fs.bind.toml", contents).unwrap();
        let set = loader.finish().unwrap();
        let resolver = StrategyResolver::default();
        let mut functions = set.files.into_iter().next().unwrap().functions;
        for function in &mut functions {
            resolver.resolve_function(function, &set.registry, &set.sources)?;
        }
        Ok(functions)
    }

    #[test]
    fn flat_arguments_use_pointers_unless_value_passed() {
        let functions = resolve(
            r#"
[functions.open]
args = [
  { name = "global", type = "global-object" },
  { name = "path", type = "DOMString" },
  { name = "mode", type = "u32", default = 438 },
  { name = "unused", type = "undefined" },
]
returns = "boolean"
"#,
        )
        .unwrap();
        let variant = &functions[0].variants[0];
        let strategies: Vec<_> = variant
            .args
            .iter()
            .map(|a| a.strategy.clone().unwrap())
            .collect();
        assert_eq!(
            strategies,
            vec![
                ArgStrategy::Context,
                ArgStrategy::Value(AbiPrimitive::StringImplPointer.into()),
                ArgStrategy::Pointer(AbiPrimitive::U32.into()),
                ArgStrategy::Ignored,
            ]
        );
        assert_eq!(variant.global_object_arg, Some(GlobalObjectArg::Index(0)));
        assert_eq!(
            variant.return_strategy,
            Some(ReturnStrategy::OutParam(AbiPrimitive::Bool.into()))
        );
        assert!(variant.communication_struct.is_none());
    }

    #[test]
    fn nullable_arguments_get_a_presence_flag() {
        let functions = resolve(
            r#"
[functions.chmod]
args = [
  { name = "flag", type = "boolean", optional = true },
  { name = "mode", type = "u64", optional = true },
]
returns = "any"
"#,
        )
        .unwrap();
        let variant = &functions[0].variants[0];
        assert_eq!(variant.global_object_arg, Some(GlobalObjectArg::Hidden));
        assert_eq!(variant.return_strategy, Some(ReturnStrategy::Boxed));

        let buffer = variant.communication_struct.as_ref().unwrap();
        assert_eq!(buffer.name(), Some("FsChmodArguments"));
        let fields: Vec<_> = buffer.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(fields, ["modeValue", "flagSet", "flagValue", "modeSet"]);

        match variant.args[1].strategy.as_ref().unwrap() {
            ArgStrategy::Buffer { prefix, children } => {
                assert_eq!(prefix, "mode");
                assert_eq!(children[0].field, "modeSet");
                assert_eq!(children[1].abi, AbiPrimitive::U64.into());
            }
            other => panic!("expected a buffer strategy, got {other:?}"),
        }
    }

    #[test]
    fn overloaded_structs_are_numbered() {
        let functions = resolve(
            r#"
[[functions.write.variants]]
args = [{ name = "data", type = "DOMString", optional = true }]
[[functions.write.variants]]
args = [{ name = "fd", type = "i32", optional = true }]
"#,
        )
        .unwrap();
        let names: Vec<_> = functions[0]
            .variants
            .iter()
            .map(|v| v.communication_struct.as_ref().unwrap().name().unwrap().to_string())
            .collect();
        assert_eq!(names, ["FsWriteArguments1", "FsWriteArguments2"]);
    }

    #[test]
    fn unsupported_returns_are_fatal() {
        let err = resolve("[functions.f]\nreturns = \"UTF8String\"\n").unwrap_err();
        assert!(matches!(err, CodegenError::Unsupported { ref message, .. } if message.contains("UTF8String")));

        let err = resolve(
            "[functions.f]\nargs = [{ name = \"s\", type = \"UTF8String\", optional = true }]\n",
        )
        .unwrap_err();
        assert!(matches!(err, CodegenError::Unsupported { .. }));
    }

    #[test]
    fn value_pass_policy_is_configurable() {
        let mut loader = Loader::new();
        loader
            .add_file("fs.bind.toml", "[functions.f]\nargs = [{ name = \"n\", type = \"u32\" }]\n")
            .unwrap();
        let set = loader.finish().unwrap();
        let mut function = set.files[0].functions[0].clone();
        StrategyResolver::new(vec![AbiPrimitive::U32], false)
            .resolve_function(&mut function, &set.registry, &set.sources)
            .unwrap();
        assert_eq!(
            function.variants[0].args[0].strategy,
            Some(ArgStrategy::Value(AbiPrimitive::U32.into()))
        );
    }
}
