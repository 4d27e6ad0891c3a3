use std::fmt;

use crate::record::ExternField;

/// A scalar that both sides of the boundary can name directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AbiPrimitive {
    Bool,
    U8,
    U16,
    U32,
    U64,
    Usize,
    I8,
    I16,
    I32,
    I64,
    F64,
    /// An encoded dynamic value, boxed on the managed heap.
    JsValue,
    /// The runtime's tagged string representation.
    BunString,
    OpaquePointer,
    GlobalObjectPointer,
    StringImplPointer,
}

impl AbiPrimitive {
    pub const ALL: [AbiPrimitive; 16] = [
        AbiPrimitive::Bool,
        AbiPrimitive::U8,
        AbiPrimitive::U16,
        AbiPrimitive::U32,
        AbiPrimitive::U64,
        AbiPrimitive::Usize,
        AbiPrimitive::I8,
        AbiPrimitive::I16,
        AbiPrimitive::I32,
        AbiPrimitive::I64,
        AbiPrimitive::F64,
        AbiPrimitive::JsValue,
        AbiPrimitive::BunString,
        AbiPrimitive::OpaquePointer,
        AbiPrimitive::GlobalObjectPointer,
        AbiPrimitive::StringImplPointer,
    ];

    /// The spelling used in definition files and configuration.
    pub fn key(self) -> &'static str {
        match self {
            AbiPrimitive::Bool => "bool",
            AbiPrimitive::U8 => "u8",
            AbiPrimitive::U16 => "u16",
            AbiPrimitive::U32 => "u32",
            AbiPrimitive::U64 => "u64",
            AbiPrimitive::Usize => "usize",
            AbiPrimitive::I8 => "i8",
            AbiPrimitive::I16 => "i16",
            AbiPrimitive::I32 => "i32",
            AbiPrimitive::I64 => "i64",
            AbiPrimitive::F64 => "f64",
            AbiPrimitive::JsValue => "JSValue",
            AbiPrimitive::BunString => "BunString",
            AbiPrimitive::OpaquePointer => "*anyopaque",
            AbiPrimitive::GlobalObjectPointer => "*JSGlobalObject",
            AbiPrimitive::StringImplPointer => "*StringImpl",
        }
    }

    pub fn from_key(key: &str) -> Option<AbiPrimitive> {
        AbiPrimitive::ALL.into_iter().find(|p| p.key() == key)
    }

    pub fn cpp_name(self) -> &'static str {
        match self {
            AbiPrimitive::Bool => "bool",
            AbiPrimitive::U8 => "uint8_t",
            AbiPrimitive::U16 => "uint16_t",
            AbiPrimitive::U32 => "uint32_t",
            AbiPrimitive::U64 => "uint64_t",
            AbiPrimitive::Usize => "size_t",
            AbiPrimitive::I8 => "int8_t",
            AbiPrimitive::I16 => "int16_t",
            AbiPrimitive::I32 => "int32_t",
            AbiPrimitive::I64 => "int64_t",
            AbiPrimitive::F64 => "double",
            AbiPrimitive::JsValue => "JSC::EncodedJSValue",
            AbiPrimitive::BunString => "BunString",
            AbiPrimitive::OpaquePointer => "void*",
            AbiPrimitive::GlobalObjectPointer => "JSC::JSGlobalObject*",
            AbiPrimitive::StringImplPointer => "WTF::StringImpl*",
        }
    }

    pub fn zig_name(self) -> &'static str {
        match self {
            AbiPrimitive::Bool => "bool",
            AbiPrimitive::U8 => "u8",
            AbiPrimitive::U16 => "u16",
            AbiPrimitive::U32 => "u32",
            AbiPrimitive::U64 => "u64",
            AbiPrimitive::Usize => "usize",
            AbiPrimitive::I8 => "i8",
            AbiPrimitive::I16 => "i16",
            AbiPrimitive::I32 => "i32",
            AbiPrimitive::I64 => "i64",
            AbiPrimitive::F64 => "f64",
            AbiPrimitive::JsValue => "JSValue",
            AbiPrimitive::BunString => "bun.String",
            AbiPrimitive::OpaquePointer => "*anyopaque",
            AbiPrimitive::GlobalObjectPointer => "*JSC.JSGlobalObject",
            AbiPrimitive::StringImplPointer => "bun.WTF.StringImpl",
        }
    }

    pub fn size_bytes(self) -> u64 {
        match self {
            AbiPrimitive::Bool | AbiPrimitive::U8 | AbiPrimitive::I8 => 1,
            AbiPrimitive::U16 | AbiPrimitive::I16 => 2,
            AbiPrimitive::U32 | AbiPrimitive::I32 => 4,
            AbiPrimitive::U64
            | AbiPrimitive::Usize
            | AbiPrimitive::I64
            | AbiPrimitive::F64
            | AbiPrimitive::JsValue
            | AbiPrimitive::OpaquePointer
            | AbiPrimitive::GlobalObjectPointer
            | AbiPrimitive::StringImplPointer => 8,
            // u8 tag, then a two-word payload
            AbiPrimitive::BunString => 24,
        }
    }

    pub fn align_bytes(self) -> u64 {
        match self {
            AbiPrimitive::BunString => 8,
            other => other.size_bytes(),
        }
    }

    pub fn is_integer(self) -> bool {
        self.integer_limits().is_some()
    }

    /// Inclusive bounds of an integer primitive.
    pub fn integer_limits(self) -> Option<(i128, i128)> {
        let limits = match self {
            AbiPrimitive::U8 => (0, u8::MAX as i128),
            AbiPrimitive::U16 => (0, u16::MAX as i128),
            AbiPrimitive::U32 => (0, u32::MAX as i128),
            AbiPrimitive::U64 | AbiPrimitive::Usize => (0, u64::MAX as i128),
            AbiPrimitive::I8 => (i8::MIN as i128, i8::MAX as i128),
            AbiPrimitive::I16 => (i16::MIN as i128, i16::MAX as i128),
            AbiPrimitive::I32 => (i32::MIN as i128, i32::MAX as i128),
            AbiPrimitive::I64 => (i64::MIN as i128, i64::MAX as i128),
            _ => return None,
        };
        Some(limits)
    }

    /// Smallest unsigned tag able to number `count` variants.
    pub fn tag_for_count(count: usize) -> AbiPrimitive {
        if count <= u8::MAX as usize + 1 {
            AbiPrimitive::U8
        } else if count <= u16::MAX as usize + 1 {
            AbiPrimitive::U16
        } else {
            AbiPrimitive::U32
        }
    }
}

impl fmt::Display for AbiPrimitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A user-visible type with a fixed layout, declared once per namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedLayout {
    pub cpp_name: String,
    pub zig_name: String,
    pub shape: NamedShape,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NamedShape {
    /// Enums and custom types that are represented by a single scalar.
    Scalar(AbiPrimitive),
    /// A plain struct, fields in declaration order.
    Record(Vec<ExternField>),
}

/// The flat representation of a value that may cross the boundary without boxing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AbiType {
    Primitive(AbiPrimitive),
    Named(Box<NamedLayout>),
}

impl AbiType {
    pub fn named(cpp_name: impl Into<String>, zig_name: impl Into<String>, shape: NamedShape) -> Self {
        AbiType::Named(Box::new(NamedLayout {
            cpp_name: cpp_name.into(),
            zig_name: zig_name.into(),
            shape,
        }))
    }

    pub fn as_primitive(&self) -> Option<AbiPrimitive> {
        match self {
            AbiType::Primitive(p) => Some(*p),
            AbiType::Named(_) => None,
        }
    }

    pub fn cpp_name(&self) -> &str {
        match self {
            AbiType::Primitive(p) => p.cpp_name(),
            AbiType::Named(named) => &named.cpp_name,
        }
    }

    pub fn zig_name(&self) -> &str {
        match self {
            AbiType::Primitive(p) => p.zig_name(),
            AbiType::Named(named) => &named.zig_name,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        match self {
            AbiType::Primitive(p) => p.size_bytes(),
            AbiType::Named(named) => match &named.shape {
                NamedShape::Scalar(p) => p.size_bytes(),
                NamedShape::Record(fields) => {
                    let (size, _) = c_record_extent(fields);
                    size
                }
            },
        }
    }

    pub fn align_bytes(&self) -> u64 {
        match self {
            AbiType::Primitive(p) => p.align_bytes(),
            AbiType::Named(named) => match &named.shape {
                NamedShape::Scalar(p) => p.align_bytes(),
                NamedShape::Record(fields) => {
                    let (_, align) = c_record_extent(fields);
                    align
                }
            },
        }
    }
}

impl From<AbiPrimitive> for AbiType {
    fn from(p: AbiPrimitive) -> Self {
        AbiType::Primitive(p)
    }
}

/// Size and alignment of a struct under the usual C rules.
fn c_record_extent(fields: &[ExternField]) -> (u64, u64) {
    let mut offset = 0;
    let mut align = 1;
    for field in fields {
        let field_align = field.ty.align_bytes();
        offset = align_forward(offset, field_align) + field.ty.size_bytes();
        align = align.max(field_align);
    }
    (align_forward(offset, align), align)
}

pub(crate) fn align_forward(value: u64, align: u64) -> u64 {
    value.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip_through_lookup() {
        for p in AbiPrimitive::ALL {
            assert_eq!(AbiPrimitive::from_key(p.key()), Some(p));
        }
        assert_eq!(AbiPrimitive::from_key("u128"), None);
    }

    #[test]
    fn tag_width_follows_variant_count() {
        assert_eq!(AbiPrimitive::tag_for_count(3), AbiPrimitive::U8);
        assert_eq!(AbiPrimitive::tag_for_count(256), AbiPrimitive::U8);
        assert_eq!(AbiPrimitive::tag_for_count(257), AbiPrimitive::U16);
        assert_eq!(AbiPrimitive::tag_for_count(70_000), AbiPrimitive::U32);
    }

    #[test]
    fn record_extent_includes_tail_padding() {
        let ty = AbiType::named(
            "Generated::fs::Stat",
            "fs.Stat",
            NamedShape::Record(vec![
                ExternField::new("size", AbiPrimitive::U64.into()),
                ExternField::new("isFile", AbiPrimitive::Bool.into()),
            ]),
        );
        assert_eq!(ty.size_bytes(), 16);
        assert_eq!(ty.align_bytes(), 8);
    }
}
