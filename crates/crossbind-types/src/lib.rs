//! Type model for binding definitions.
//!
//! Every value that can appear in a function signature is described by a
//! [`Type`] interned in a [`TypeRegistry`]. The registry is the single owner
//! of the type graph for one generation run: it deduplicates structurally
//! identical types, tracks which of them are reachable from exported
//! declarations, and answers the layout questions the resolver asks.
//!
//! [`Function`]s and their [`Variant`]s refer to types by [`TypeId`] and carry
//! the lowering plan once the strategy resolver has filled it in.

pub mod case;
mod flags;
mod function;
mod kind;
mod origin;
mod registry;
mod strategy;

pub use flags::{DefaultValue, NodeValidator, RangeBound, RangeConstraint, RangeMode, TypeFlags};
pub use function::{Argument, Function, Variant};
pub use kind::{
    CustomManaged, CustomNative, DictionaryField, EnumVariant, FromJsReturn, IntegerKind,
    ManagedArg, NativeArg, NativeEnumRef, ResolvedEnum, StringKind, TypeKind, ValueCategory,
};
pub use origin::{FileId, Origin};
pub use registry::{Type, TypeId, TypeRegistry};
pub use strategy::{ArgStrategy, BufferSlot, GlobalObjectArg, ReturnStrategy};
