use crossbind_layout::AbiType;

/// How one argument crosses the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgStrategy {
    /// Supplied from the call context rather than the argument list.
    Context,
    /// An `undefined` placeholder; occupies a position only.
    Ignored,
    /// Passed by value as a native parameter.
    Value(AbiType),
    /// Materialized on the managed side and passed by const pointer.
    Pointer(AbiType),
    /// Stored in the variant's communication struct under `prefix`.
    Buffer {
        prefix: String,
        children: Vec<BufferSlot>,
    },
}

/// A communication-struct field owned by one argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferSlot {
    pub field: String,
    pub abi: AbiType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnStrategy {
    Void,
    /// The native side returns an encoded dynamic value directly.
    Boxed,
    /// The native side writes into caller memory and reports success as `bool`.
    OutParam(AbiType),
}

/// Where the execution context comes from in the native signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalObjectArg {
    /// Passed as an implicit leading parameter.
    Hidden,
    /// Threaded through the declared argument at this index.
    Index(usize),
}
