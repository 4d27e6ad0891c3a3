//! Glue generation for loaded binding definitions.
//!
//! The [`StrategyResolver`] decides how every argument and return value
//! crosses the boundary. The managed and native emitters then render the two
//! halves of each call from that one plan, and the [`HeaderAssembler`] writes
//! the declarations hand-written code includes. [`Generator`] runs the whole
//! sequence and writes only artifacts whose contents changed.

mod context;
pub mod dispatch;
pub mod enums;
mod error;
pub mod header;
mod managed;
pub mod names;
mod native;
pub mod output;
pub mod pipeline;
pub mod resolve;
mod writer;

pub use context::{Declaration, GenerationContext};
pub use dispatch::{plan_dispatch, DispatchPlan, Selection};
pub use enums::{EnumMetadata, EnumRequest, EnumResolver, StaticEnumResolver, ToolchainEnumResolver};
pub use error::{CodegenError, CodegenResult};
pub use header::{check_namespaces, HeaderAssembler};
pub use managed::ManagedEmitter;
pub use native::NativeEmitter;
pub use output::{write_if_changed, OutputSet, WriteSummary};
pub use pipeline::{
    GenerationSummary, Generator, GeneratorOptions, LogReporter, Rendered, StatusReporter,
    MANAGED_OUTPUT_NAME,
};
pub use resolve::StrategyResolver;
pub use writer::CodeWriter;
