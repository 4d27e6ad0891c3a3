//! Conversions from ABI descriptions into `repc` layout queries.

use repc::layout::{BuiltinType, Record, RecordField, RecordKind, Type, TypeVariant};

use crate::abi::{AbiPrimitive, AbiType, NamedShape};
use crate::record::ExternField;

fn builtin(ty: BuiltinType) -> Type<()> {
    Type {
        layout: (),
        annotations: vec![],
        variant: TypeVariant::Builtin(ty),
    }
}

/// Builds an unannotated C struct from already converted field types.
pub fn record<I>(fields: I) -> Type<()>
where
    I: IntoIterator<Item = Type<()>>,
{
    let fields = fields
        .into_iter()
        .map(|ty| RecordField {
            layout: None,
            annotations: vec![],
            named: true,
            bit_width: None,
            ty,
        })
        .collect();
    Type {
        layout: (),
        annotations: vec![],
        variant: TypeVariant::Record(Record {
            kind: RecordKind::Struct,
            fields,
        }),
    }
}

pub fn primitive_to_repc(prim: AbiPrimitive) -> Type<()> {
    match prim {
        AbiPrimitive::Bool | AbiPrimitive::U8 => builtin(BuiltinType::UnsignedChar),
        AbiPrimitive::I8 => builtin(BuiltinType::Char),
        AbiPrimitive::U16 => builtin(BuiltinType::UnsignedShort),
        AbiPrimitive::I16 => builtin(BuiltinType::Short),
        AbiPrimitive::U32 => builtin(BuiltinType::UnsignedInt),
        AbiPrimitive::I32 => builtin(BuiltinType::Int),
        AbiPrimitive::U64 | AbiPrimitive::Usize => builtin(BuiltinType::UnsignedLongLong),
        AbiPrimitive::I64 | AbiPrimitive::JsValue => builtin(BuiltinType::LongLong),
        AbiPrimitive::F64 => builtin(BuiltinType::Double),
        AbiPrimitive::OpaquePointer
        | AbiPrimitive::GlobalObjectPointer
        | AbiPrimitive::StringImplPointer => builtin(BuiltinType::Pointer),
        // tag, then the widest payload member (pointer + length)
        AbiPrimitive::BunString => record([
            builtin(BuiltinType::UnsignedChar),
            builtin(BuiltinType::Pointer),
            builtin(BuiltinType::UnsignedLongLong),
        ]),
    }
}

pub fn abi_to_repc(ty: &AbiType) -> Type<()> {
    match ty {
        AbiType::Primitive(prim) => primitive_to_repc(*prim),
        AbiType::Named(named) => match &named.shape {
            NamedShape::Scalar(prim) => primitive_to_repc(*prim),
            NamedShape::Record(fields) => fields_to_repc(fields),
        },
    }
}

pub fn fields_to_repc(fields: &[ExternField]) -> Type<()> {
    record(fields.iter().map(|field| abi_to_repc(&field.ty)))
}
