use crossbind_layout::ExternStruct;

use crate::origin::{FileId, Origin};
use crate::registry::{TypeId, TypeRegistry};
use crate::strategy::{ArgStrategy, GlobalObjectArg, ReturnStrategy};

#[derive(Debug, Clone)]
pub struct Argument {
    pub name: String,
    pub ty: TypeId,
    pub origin: Origin,
    /// Filled in by the strategy resolver.
    pub strategy: Option<ArgStrategy>,
}

impl Argument {
    pub fn new(name: impl Into<String>, ty: TypeId, origin: Origin) -> Self {
        Self {
            name: name.into(),
            ty,
            origin,
            strategy: None,
        }
    }
}

/// One overload of a [`Function`].
#[derive(Debug, Clone)]
pub struct Variant {
    pub args: Vec<Argument>,
    pub ret: TypeId,
    pub origin: Origin,
    /// Appended to the function name to find the native implementation.
    pub suffix: String,
    pub min_required_args: usize,
    pub global_object_arg: Option<GlobalObjectArg>,
    pub return_strategy: Option<ReturnStrategy>,
    pub communication_struct: Option<ExternStruct>,
}

impl Variant {
    pub fn new(args: Vec<Argument>, ret: TypeId, origin: Origin, registry: &TypeRegistry) -> Self {
        let mut variant = Self {
            args,
            ret,
            origin,
            suffix: String::new(),
            min_required_args: 0,
            global_object_arg: None,
            return_strategy: None,
            communication_struct: None,
        };
        variant.min_required_args = variant.compute_min_required_args(registry);
        variant
    }

    /// Arguments the caller supplies, context arguments excluded.
    pub fn real_args<'a>(
        &'a self,
        registry: &'a TypeRegistry,
    ) -> impl Iterator<Item = &'a Argument> + 'a {
        self.args
            .iter()
            .filter(move |arg| !registry.get(arg.ty).is_context_argument())
    }

    pub fn real_arg_count(&self, registry: &TypeRegistry) -> usize {
        self.real_args(registry).count()
    }

    /// One past the last real argument that may not be omitted.
    pub fn compute_min_required_args(&self, registry: &TypeRegistry) -> usize {
        self.real_args(registry)
            .enumerate()
            .filter(|(_, arg)| {
                let ty = registry.get(arg.ty);
                !ty.flags().is_optional_to_user() && !ty.is_ignorable()
            })
            .map(|(i, _)| i + 1)
            .last()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    /// Namespace of the definition file, shared by all its functions.
    pub namespace: String,
    pub file: FileId,
    /// Path inside the native source under which implementations live, e.g. `Bindings.`.
    pub prefix: String,
    /// Used in diagnostics raised by generated code.
    pub class_name: String,
    pub variants: Vec<Variant>,
    pub origin: Origin,
}

impl Function {
    /// Name of the native implementation for variant `index`.
    pub fn implementation_name(&self, index: usize) -> String {
        format!("{}{}", self.name, self.variants[index].suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{DefaultValue, TypeFlags};
    use crate::kind::{IntegerKind, StringKind, TypeKind};

    fn origin() -> Origin {
        Origin::new(FileId(0), (0, 0))
    }

    #[test]
    fn min_required_args_skip_context_and_trailing_optionals() {
        let mut reg = TypeRegistry::new();
        let global = reg.intern(TypeKind::GlobalObject, TypeFlags::default(), "fs", origin());
        let path = reg.intern(TypeKind::String(StringKind::BunString), TypeFlags::default(), "fs", origin());
        let mode = reg.intern(
            TypeKind::Integer(IntegerKind::U32),
            TypeFlags {
                default: Some(DefaultValue::Integer(0o666)),
                ..Default::default()
            },
            "fs",
            origin(),
        );
        let undefined = reg.intern(TypeKind::Undefined, TypeFlags::default(), "fs", origin());

        let variant = Variant::new(
            vec![
                Argument::new("global", global, origin()),
                Argument::new("path", path, origin()),
                Argument::new("mode", mode, origin()),
            ],
            undefined,
            origin(),
            &reg,
        );
        assert_eq!(variant.real_arg_count(&reg), 2);
        assert_eq!(variant.min_required_args, 1);

        let trailing_placeholder = Variant::new(
            vec![
                Argument::new("mode", mode, origin()),
                Argument::new("path", path, origin()),
                Argument::new("unused", undefined, origin()),
            ],
            undefined,
            origin(),
            &reg,
        );
        assert_eq!(trailing_placeholder.min_required_args, 2);
    }
}
