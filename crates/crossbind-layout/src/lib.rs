//! C ABI layouts for values crossing the managed/native boundary.
//!
//! Both emitters describe the memory they share through the types in this
//! crate, so the field order, sizes and offsets of a communication struct
//! are decided in exactly one place. Offsets and total sizes are computed
//! with `repc`, which implements the C layout rules of the host target.

mod abi;
pub mod helpers;
mod record;

use miette::Diagnostic;
use thiserror::Error;

pub use abi::{AbiPrimitive, AbiType, NamedLayout, NamedShape};
pub use record::{ExternField, ExternStruct, FieldOffset, StructLayout};

/// Errors that can occur during layout computation.
#[derive(Error, Debug, Diagnostic)]
pub enum LayoutError {
    #[error("Layout computation failed: {0}")]
    #[diagnostic(code("LAYOUT-001"))]
    RepcError(#[from] repc::Error),

    #[error("No C layout rules are known for the host target")]
    #[diagnostic(
        code("LAYOUT-002"),
        help("Communication structs are checked against the host's C ABI; build on a supported target")
    )]
    UnsupportedHost,

    #[error("Expected a record layout for `{0}`")]
    #[diagnostic(code("LAYOUT-003"))]
    NotARecord(String),

    #[error("Field `{field}` of `{record}` has no computed offset")]
    #[diagnostic(code("LAYOUT-004"))]
    MissingFieldLayout { record: String, field: String },
}

pub type LayoutResult<T> = Result<T, LayoutError>;

/// The target whose C layout rules generated code is checked against.
pub fn host_target() -> LayoutResult<repc::Target> {
    repc::HOST_TARGET.ok_or(LayoutError::UnsupportedHost)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_carry_diagnostic_codes() {
        let err = LayoutError::MissingFieldLayout {
            record: "FsOpenArguments".to_string(),
            field: "modeValue".to_string(),
        };
        assert_eq!(err.code().map(|c| c.to_string()).as_deref(), Some("LAYOUT-004"));
        assert!(LayoutError::UnsupportedHost.help().is_some());
    }
}
