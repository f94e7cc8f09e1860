//! macrogen-core: semantic model and verification passes for macrogen
//!
//! This crate contains the pure semantic analysis with NO I/O:
//! - Declaration-tree types handed over by the front end
//! - Scope tree with chained name lookup
//! - Arena-backed template/param/signature model
//! - The verification passes: collection, resolution, signature
//!   computation, cycle detection, version compatibility, completeness
//! - Structured diagnostics for the driver to format
//!
//! Pass ordering matters and is the driver's responsibility: each pass
//! relies on state only the prior one completes (the signature pass needs
//! final auto-expand flags, the cycle detectors need resolved edges).

pub mod ast;
pub mod collect;
pub mod completeness;
pub mod cycles;
pub mod diagnostics;
pub mod model;
pub mod resolve;
pub mod scope;
pub mod session;
pub mod signatures;
pub mod versions;

// Re-export commonly used types
pub use ast::{Ident, SourceFileDecl, SourceSpan};
pub use diagnostics::{
    CompileError, InternalError, RelatedPosition, SemanticError, SemanticErrorCode, Warning,
};
pub use model::{
    Expand, ExpandId, ExpandSignature, OptionValue, Param, ParamId, ParamKind, ScopeId,
    SignatureId, Template, TemplateId, TemplateKind, Version, VersionId,
};
pub use scope::{Scope, ScopeKind, ScopeTree};
pub use session::CompileSession;
