use repc::layout::TypeVariant;

use crate::abi::AbiType;
use crate::helpers::fields_to_repc;
use crate::{host_target, LayoutError, LayoutResult};

/// One named slot of an extern struct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternField {
    pub name: String,
    pub ty: AbiType,
}

impl ExternField {
    pub fn new(name: impl Into<String>, ty: AbiType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Memory shared verbatim between the managed and native side of one variant.
///
/// Field names are stored in the managed spelling (`camelCase`); the native
/// emitter derives its own spelling from them, never its own order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternStruct {
    name: Option<String>,
    fields: Vec<ExternField>,
}

/// Result of running the C layout rules over an [`ExternStruct`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    pub size_bytes: u64,
    pub align_bytes: u64,
    pub fields: Vec<FieldOffset>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOffset {
    pub name: String,
    pub offset_bytes: u64,
    pub size_bytes: u64,
}

impl ExternStruct {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, ty: AbiType) {
        self.fields.push(ExternField::new(name, ty));
    }

    pub fn fields(&self) -> &[ExternField] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Orders fields by descending size. Ties keep insertion order.
    pub fn reorder_for_smallest_size(&mut self) {
        self.fields
            .sort_by(|a, b| b.ty.size_bytes().cmp(&a.ty.size_bytes()));
    }

    pub fn assign_generated_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Runs the host's C layout rules over the current field order.
    pub fn compute_layout(&self) -> LayoutResult<StructLayout> {
        let target = host_target()?;
        let record_name = self.name().unwrap_or("<anonymous>").to_string();
        let computed = repc::compute_layout(target, &fields_to_repc(&self.fields))
            .map_err(LayoutError::RepcError)?;

        let record = match computed.variant {
            TypeVariant::Record(record) => record,
            _ => return Err(LayoutError::NotARecord(record_name)),
        };

        let mut fields = Vec::with_capacity(self.fields.len());
        for (field, computed_field) in self.fields.iter().zip(record.fields.iter()) {
            let layout = computed_field
                .layout
                .ok_or_else(|| LayoutError::MissingFieldLayout {
                    record: record_name.clone(),
                    field: field.name.clone(),
                })?;
            fields.push(FieldOffset {
                name: field.name.clone(),
                offset_bytes: layout.offset_bits / 8,
                size_bytes: layout.size_bits / 8,
            });
        }

        Ok(StructLayout {
            size_bytes: computed.layout.size_bits / 8,
            // `alignof` of the struct; `required_alignment_bits` only covers annotations
            align_bytes: computed.layout.pointer_alignment_bits / 8,
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{align_forward, AbiPrimitive};

    fn buffer() -> ExternStruct {
        let mut s = ExternStruct::new();
        s.add("flagSet", AbiPrimitive::Bool.into());
        s.add("flagValue", AbiPrimitive::U16.into());
        s.add("payload", AbiPrimitive::JsValue.into());
        s.add("countSet", AbiPrimitive::Bool.into());
        s.add("countValue", AbiPrimitive::U32.into());
        s
    }

    #[test]
    fn reorder_is_descending_and_stable() {
        let mut s = buffer();
        s.reorder_for_smallest_size();
        let names: Vec<_> = s.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            ["payload", "countValue", "flagValue", "flagSet", "countSet"]
        );
    }

    #[test]
    fn descending_order_only_pads_the_tail() {
        let mut s = buffer();
        s.reorder_for_smallest_size();
        let layout = s.compute_layout().unwrap();
        let sum: u64 = s.fields().iter().map(|f| f.ty.size_bytes()).sum();
        assert_eq!(layout.size_bytes, align_forward(sum, layout.align_bytes));
        assert_eq!(layout.size_bytes, 16);

        let mut expected_offset = 0;
        for field in &layout.fields {
            assert_eq!(field.offset_bytes, expected_offset);
            expected_offset += field.size_bytes;
        }
    }

    #[test]
    fn declaration_order_can_waste_space() {
        let layout = buffer().compute_layout().unwrap();
        assert_eq!(layout.size_bytes, 24);
        assert_eq!(layout.fields[2].offset_bytes, 8);
        assert_eq!(layout.fields[4].offset_bytes, 20);
    }

    #[test]
    fn alignment_is_the_widest_field() {
        let mut s = ExternStruct::new();
        s.add("limitValue", AbiPrimitive::U32.into());
        s.add("limitSet", AbiPrimitive::Bool.into());
        let layout = s.compute_layout().unwrap();
        assert_eq!(layout.align_bytes, 4);
        assert_eq!(layout.size_bytes, 8);

        let mut flags = ExternStruct::new();
        flags.add("a", AbiPrimitive::Bool.into());
        flags.add("b", AbiPrimitive::U8.into());
        assert_eq!(flags.compute_layout().unwrap().align_bytes, 1);
    }

    #[test]
    fn repc_agrees_with_primitive_table() {
        for prim in AbiPrimitive::ALL {
            let mut s = ExternStruct::new();
            s.add("value", prim.into());
            let layout = s.compute_layout().unwrap();
            assert_eq!(layout.fields[0].size_bytes, prim.size_bytes(), "{prim}");
            assert_eq!(layout.align_bytes, prim.align_bytes(), "{prim}");
        }
    }
}
