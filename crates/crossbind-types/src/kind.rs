use crossbind_layout::AbiPrimitive;

use crate::registry::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegerKind {
    U8,
    U16,
    U32,
    U64,
    Usize,
    I8,
    I16,
    I32,
    I64,
}

impl IntegerKind {
    pub const ALL: [IntegerKind; 9] = [
        IntegerKind::U8,
        IntegerKind::U16,
        IntegerKind::U32,
        IntegerKind::U64,
        IntegerKind::Usize,
        IntegerKind::I8,
        IntegerKind::I16,
        IntegerKind::I32,
        IntegerKind::I64,
    ];

    pub fn abi(self) -> AbiPrimitive {
        match self {
            IntegerKind::U8 => AbiPrimitive::U8,
            IntegerKind::U16 => AbiPrimitive::U16,
            IntegerKind::U32 => AbiPrimitive::U32,
            IntegerKind::U64 => AbiPrimitive::U64,
            IntegerKind::Usize => AbiPrimitive::Usize,
            IntegerKind::I8 => AbiPrimitive::I8,
            IntegerKind::I16 => AbiPrimitive::I16,
            IntegerKind::I32 => AbiPrimitive::I32,
            IntegerKind::I64 => AbiPrimitive::I64,
        }
    }

    pub fn key(self) -> &'static str {
        self.abi().key()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringKind {
    Utf8String,
    UsvString,
    DomString,
    ByteString,
    BunString,
}

impl StringKind {
    pub const ALL: [StringKind; 5] = [
        StringKind::Utf8String,
        StringKind::UsvString,
        StringKind::DomString,
        StringKind::ByteString,
        StringKind::BunString,
    ];

    pub fn key(self) -> &'static str {
        match self {
            StringKind::Utf8String => "UTF8String",
            StringKind::UsvString => "USVString",
            StringKind::DomString => "DOMString",
            StringKind::ByteString => "ByteString",
            StringKind::BunString => "BunString",
        }
    }

    /// How the materialized string is handed to native code.
    pub fn abi(self) -> AbiPrimitive {
        match self {
            StringKind::Utf8String | StringKind::BunString => AbiPrimitive::BunString,
            StringKind::UsvString | StringKind::DomString | StringKind::ByteString => {
                AbiPrimitive::StringImplPointer
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DictionaryField {
    pub key: String,
    pub ty: TypeId,
    pub required: bool,
}

/// An enum declared in native source; its variants come from the enum resolver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeEnumRef {
    /// Path suffix identifying the native source file.
    pub file: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumVariant {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedEnum {
    pub tag: AbiPrimitive,
    pub variants: Vec<EnumVariant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NativeArg {
    Global,
    Value,
    Allocator,
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FromJsReturn {
    #[default]
    Value,
    Error,
    Optional,
}

/// A type decoded on the native side from the boxed dynamic value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomNative {
    pub native_type: String,
    pub from_js: String,
    pub from_js_args: Vec<NativeArg>,
    pub from_js_return: FromJsReturn,
    pub validate: Option<String>,
    pub validate_error: Option<String>,
    pub deinit: Option<String>,
    pub deinit_args: Vec<NativeArg>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ManagedArg {
    Global,
    Value,
    EncodedValue,
    Out,
    Text(String),
}

/// A type converted on the managed side into a flat representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomManaged {
    pub managed_type: String,
    pub native_type: String,
    pub headers: Vec<String>,
    pub from_js: String,
    pub from_js_args: Vec<ManagedArg>,
    pub validate_error: String,
    pub abi: AbiPrimitive,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Boolean,
    Integer(IntegerKind),
    F64,
    String(StringKind),
    Undefined,
    Any,
    Dictionary(Vec<DictionaryField>),
    StringEnum(Vec<String>),
    NativeEnum(NativeEnumRef),
    CustomNative(CustomNative),
    CustomManaged(CustomManaged),
    GlobalObject,
    VirtualMachine,
}

impl TypeKind {
    /// Kinds that can be named by a plain string in a definition file.
    pub fn builtin(name: &str) -> Option<TypeKind> {
        let kind = match name {
            "boolean" => TypeKind::Boolean,
            "f64" => TypeKind::F64,
            "undefined" => TypeKind::Undefined,
            "any" => TypeKind::Any,
            "global-object" => TypeKind::GlobalObject,
            "virtual-machine" => TypeKind::VirtualMachine,
            other => {
                if let Some(int) = IntegerKind::ALL.into_iter().find(|k| k.key() == other) {
                    TypeKind::Integer(int)
                } else if let Some(s) = StringKind::ALL.into_iter().find(|k| k.key() == other) {
                    TypeKind::String(s)
                } else {
                    return None;
                }
            }
        };
        Some(kind)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            TypeKind::Boolean => "boolean",
            TypeKind::Integer(_) => "integer",
            TypeKind::F64 => "f64",
            TypeKind::String(_) => "string",
            TypeKind::Undefined => "undefined",
            TypeKind::Any => "any",
            TypeKind::Dictionary(_) => "dictionary",
            TypeKind::StringEnum(_) => "string enum",
            TypeKind::NativeEnum(_) => "native enum",
            TypeKind::CustomNative(_) => "custom native type",
            TypeKind::CustomManaged(_) => "custom managed type",
            TypeKind::GlobalObject => "global object",
            TypeKind::VirtualMachine => "virtual machine",
        }
    }

    /// Kinds that are emitted as a declaration of their own.
    pub fn lowers_to_named_type(&self) -> bool {
        matches!(
            self,
            TypeKind::Dictionary(_) | TypeKind::StringEnum(_) | TypeKind::NativeEnum(_)
        )
    }

    pub fn is_enum(&self) -> bool {
        matches!(self, TypeKind::StringEnum(_) | TypeKind::NativeEnum(_))
    }

    /// Runtime category a value of this kind always falls into.
    pub fn category(&self) -> Option<ValueCategory> {
        match self {
            TypeKind::Undefined => Some(ValueCategory::Undefined),
            TypeKind::Dictionary(_) => Some(ValueCategory::Object),
            TypeKind::String(_) | TypeKind::StringEnum(_) | TypeKind::NativeEnum(_) => {
                Some(ValueCategory::String)
            }
            TypeKind::Integer(_) | TypeKind::F64 => Some(ValueCategory::Number),
            TypeKind::Boolean => Some(ValueCategory::Boolean),
            TypeKind::Any
            | TypeKind::CustomNative(_)
            | TypeKind::CustomManaged(_)
            | TypeKind::GlobalObject
            | TypeKind::VirtualMachine => None,
        }
    }
}

/// Disjoint runtime categories an overloaded call can be dispatched on.
///
/// Declaration order is the order generated type tests run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueCategory {
    Undefined,
    Object,
    String,
    Number,
    Boolean,
}

impl ValueCategory {
    /// The managed-runtime predicate selecting this category.
    pub fn test_method(self) -> &'static str {
        match self {
            ValueCategory::Undefined => "isUndefined",
            ValueCategory::Object => "isObject",
            ValueCategory::String => "isString",
            ValueCategory::Number => "isNumber",
            ValueCategory::Boolean => "isBoolean",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueCategory::Undefined => "undefined",
            ValueCategory::Object => "object",
            ValueCategory::String => "string",
            ValueCategory::Number => "number",
            ValueCategory::Boolean => "boolean",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_names() {
        assert_eq!(TypeKind::builtin("u32"), Some(TypeKind::Integer(IntegerKind::U32)));
        assert_eq!(TypeKind::builtin("usize"), Some(TypeKind::Integer(IntegerKind::Usize)));
        assert_eq!(
            TypeKind::builtin("DOMString"),
            Some(TypeKind::String(StringKind::DomString))
        );
        assert_eq!(TypeKind::builtin("JSValue"), None);
        assert_eq!(TypeKind::builtin("u128"), None);
    }

    #[test]
    fn categories_sort_in_test_order() {
        let mut cats = vec![
            ValueCategory::Boolean,
            ValueCategory::String,
            ValueCategory::Undefined,
            ValueCategory::Number,
            ValueCategory::Object,
        ];
        cats.sort();
        let names: Vec<_> = cats.iter().map(|c| c.name()).collect();
        assert_eq!(names, ["undefined", "object", "string", "number", "boolean"]);
    }
}
