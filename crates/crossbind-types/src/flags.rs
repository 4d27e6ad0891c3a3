use std::hash::{Hash, Hasher};

use crossbind_layout::AbiPrimitive;

/// Modifiers applied to a type at its point of use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TypeFlags {
    pub optional: bool,
    /// Only `undefined` counts as absent; `null` is converted like any value.
    pub non_null: bool,
    pub default: Option<DefaultValue>,
    pub range: Option<RangeConstraint>,
    /// Rejects NaN and infinities for `f64`.
    pub finite: bool,
    pub node_validator: Option<NodeValidator>,
}

impl TypeFlags {
    /// Absence is a state of its own rather than a fallback to a default.
    pub fn is_nullable(&self) -> bool {
        self.optional && self.default.is_none()
    }

    /// Callers may omit the value.
    pub fn is_optional_to_user(&self) -> bool {
        self.optional || self.default.is_some()
    }
}

#[derive(Debug, Clone)]
pub enum DefaultValue {
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
    /// A variant of the enum the default belongs to.
    Enum(String),
}

impl PartialEq for DefaultValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DefaultValue::Boolean(a), DefaultValue::Boolean(b)) => a == b,
            (DefaultValue::Integer(a), DefaultValue::Integer(b)) => a == b,
            (DefaultValue::Number(a), DefaultValue::Number(b)) => a.to_bits() == b.to_bits(),
            (DefaultValue::String(a), DefaultValue::String(b)) => a == b,
            (DefaultValue::Enum(a), DefaultValue::Enum(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for DefaultValue {}

impl Hash for DefaultValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            DefaultValue::Boolean(v) => v.hash(state),
            DefaultValue::Integer(v) => v.hash(state),
            DefaultValue::Number(v) => v.to_bits().hash(state),
            DefaultValue::String(v) | DefaultValue::Enum(v) => v.hash(state),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeMode {
    Clamp,
    Enforce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeBound {
    /// The natural limit of the integer type.
    Abi,
    Value(i128),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeConstraint {
    pub mode: RangeMode,
    pub min: RangeBound,
    pub max: RangeBound,
}

impl RangeConstraint {
    pub fn uses_abi_bounds(&self) -> bool {
        self.min == RangeBound::Abi && self.max == RangeBound::Abi
    }

    /// Concrete bounds for `prim`, or `None` when `prim` is not an integer.
    pub fn bounds(&self, prim: AbiPrimitive) -> Option<(i128, i128)> {
        let (abi_min, abi_max) = prim.integer_limits()?;
        let min = match self.min {
            RangeBound::Abi => abi_min,
            RangeBound::Value(v) => v,
        };
        let max = match self.max {
            RangeBound::Abi => abi_max,
            RangeBound::Value(v) => v,
        };
        Some((min, max))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeValidator {
    ValidateInteger,
}

impl NodeValidator {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "validate-integer" => Some(NodeValidator::ValidateInteger),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nullable_requires_no_default() {
        let mut flags = TypeFlags {
            optional: true,
            ..Default::default()
        };
        assert!(flags.is_nullable());
        flags.default = Some(DefaultValue::Integer(3));
        assert!(!flags.is_nullable());
        assert!(flags.is_optional_to_user());
    }

    #[test]
    fn range_bounds_fill_in_abi_limits() {
        let range = RangeConstraint {
            mode: RangeMode::Enforce,
            min: RangeBound::Value(1),
            max: RangeBound::Abi,
        };
        assert_eq!(range.bounds(AbiPrimitive::U8), Some((1, 255)));
        assert_eq!(range.bounds(AbiPrimitive::F64), None);
        assert!(!range.uses_abi_bounds());
    }
}
