#![allow(clippy::new_without_default)]

pub mod binding;
pub mod codegen;
pub mod context;
pub mod decl;
pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod key;
pub mod metadata;
pub mod options;
pub mod processor;
pub mod registry;
pub mod scope;
pub mod types;

pub mod prelude {
    pub use crate::codegen::{CodeGenerator, GenerationError, ResolvedGraph};
    pub use crate::context::ResolutionContext;
    pub use crate::decl::{ClassIndex, GraphDecl};
    pub use crate::diagnostics::{
        CollectingReporter, DiagnosticKind, DiagnosticReporter, SourceLocation,
    };
    pub use crate::error::{GraphError, GraphErrors, StructuralError};
    pub use crate::graph::{BindingGraph, FieldReason};
    pub use crate::key::{self, ContextualTypeKey, TypeKey};
    pub use crate::metadata::{MetadataIndex, ModuleMetadata};
    pub use crate::options::Options;
    pub use crate::processor::{ProcessError, ProcessSummary, Processor};
    pub use crate::types::{ClassId, TypeRef};
}
