//! Reading binding definitions.
//!
//! A source tree holds `*.bind.toml` definition files, each next to the
//! native source that implements it. This crate finds them, parses them, and
//! resolves every type reference into one [`crossbind_types::TypeRegistry`],
//! keeping the file contents around so later stages can point diagnostics at
//! the declaration they concern.

mod config;
mod discover;
mod error;
mod loader;
mod native_index;
pub mod schema;
mod source_map;

pub use config::{EnumConfig, GeneratorConfig, ProjectConfig, CONFIG_FILE_NAME};
pub use discover::{
    discover, namespace_for, native_source_for, Discovered, DEFINITION_SUFFIX, NATIVE_EXTENSION,
};
pub use error::{SourceError, SourceResult};
pub use loader::{load_definitions, load_definitions_with, DefinitionFile, DefinitionSet, Loader};
pub use native_index::NativeSource;
pub use source_map::{SourceFile, SourceMap};
