//! Semantic Diagnostics
//!
//! Single structured error type used across all verification passes. Every
//! failure carries a message, a primary source position, and - for
//! duplicate/cycle/compatibility errors - one or two secondary positions
//! referencing the conflicting declaration. The front end is responsible
//! for formatting and exit-code mapping; nothing in this crate prints or
//! terminates the process.
//!
//! Internal invariant violations are a distinct, non-user-facing error
//! class: they signal a defect in an earlier pass, not malformed input.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::{Ident, SourceSpan};

// =============================================================================
// ERROR CODES
// =============================================================================

/// Codes categorizing semantic errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SemanticErrorCode {
    // Declaration errors
    DuplicateDeclaration,
    EndNameMismatch,
    DuplicateOption,
    UnknownOption,
    DuplicateTypeMember,
    DuplicateVersionMember,

    // Reference errors
    UnknownParameter,
    UnknownMacro,
    UnknownTextBlock,

    // Structural errors
    SelfReference,
    CyclicReference,
    CyclicTextBlockInsert,
    InvalidInsert,

    // Type errors
    IncompatibleParameterKind,
    MissingParameter,
    IncorrectParameterType,

    // Completeness errors (strict mode)
    UnusedParameter,
    UnusedTextBlock,
}

// =============================================================================
// SEMANTIC ERRORS
// =============================================================================

/// A secondary position attached to an error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedPosition {
    pub message: String,
    pub span: SourceSpan,
}

/// A user-facing semantic error with location context.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message} ({span})")]
pub struct SemanticError {
    pub code: SemanticErrorCode,
    pub message: String,
    pub span: SourceSpan,
    pub related: Vec<RelatedPosition>,
}

impl SemanticError {
    fn new(code: SemanticErrorCode, message: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            code,
            message: message.into(),
            span,
            related: Vec::new(),
        }
    }

    /// Attach a secondary position.
    pub fn with_related(mut self, message: impl Into<String>, span: SourceSpan) -> Self {
        self.related.push(RelatedPosition {
            message: message.into(),
            span,
        });
        self
    }

    pub fn duplicate_declaration(duplicate: &Ident, first: &Ident) -> Self {
        Self::new(
            SemanticErrorCode::DuplicateDeclaration,
            format!("duplicate declaration of '{}'", duplicate.text),
            duplicate.span,
        )
        .with_related(
            format!("'{}' first declared here", first.text),
            first.span,
        )
    }

    pub fn end_name_mismatch(name: &Ident, repeat_name: &Ident) -> Self {
        Self::new(
            SemanticErrorCode::EndNameMismatch,
            format!(
                "end name '{}' does not match '{}'",
                repeat_name.text, name.text
            ),
            repeat_name.span,
        )
        .with_related(format!("'{}' declared here", name.text), name.span)
    }

    pub fn duplicate_option(duplicate: &Ident, first: &Ident) -> Self {
        Self::new(
            SemanticErrorCode::DuplicateOption,
            format!("duplicate option '{}'", duplicate.text),
            duplicate.span,
        )
        .with_related("option first given here", first.span)
    }

    pub fn unknown_option(option: &Ident) -> Self {
        Self::new(
            SemanticErrorCode::UnknownOption,
            format!("unknown option '{}'", option.text),
            option.span,
        )
    }

    pub fn duplicate_type_member(member: &Ident, param: &Ident) -> Self {
        Self::new(
            SemanticErrorCode::DuplicateTypeMember,
            format!("duplicate macro '{}' in parameter type", member.text),
            member.span,
        )
        .with_related(
            format!("in the type of parameter '{}'", param.text),
            param.span,
        )
    }

    pub fn duplicate_version_member(member: &Ident, name: &Ident) -> Self {
        Self::new(
            SemanticErrorCode::DuplicateVersionMember,
            format!("duplicate version '{}'", member.text),
            member.span,
        )
        .with_related(
            format!("in the version list of '{}'", name.text),
            name.span,
        )
    }

    pub fn unknown_parameter(name: &Ident) -> Self {
        Self::new(
            SemanticErrorCode::UnknownParameter,
            format!("unknown parameter '{}'", name.text),
            name.span,
        )
    }

    pub fn unknown_macro(name: &Ident) -> Self {
        Self::new(
            SemanticErrorCode::UnknownMacro,
            format!("unknown macro '{}'", name.text),
            name.span,
        )
    }

    pub fn unknown_text_block(name: &Ident) -> Self {
        Self::new(
            SemanticErrorCode::UnknownTextBlock,
            format!("unknown text block '{}'", name.text),
            name.span,
        )
    }

    pub fn self_reference(reference: &Ident, declaration: &Ident) -> Self {
        Self::new(
            SemanticErrorCode::SelfReference,
            format!("parameter '{}' references itself", reference.text),
            reference.span,
        )
        .with_related("parameter declared here", declaration.span)
    }

    pub fn cyclic_reference(reference: &Ident, declaration: &Ident) -> Self {
        Self::new(
            SemanticErrorCode::CyclicReference,
            format!("cyclic reference through parameter '{}'", reference.text),
            reference.span,
        )
        .with_related("referencing parameter declared here", declaration.span)
    }

    pub fn cyclic_text_block_insert(reference: &Ident, block: &Ident) -> Self {
        Self::new(
            SemanticErrorCode::CyclicTextBlockInsert,
            format!("cyclic text block reference '{}'", reference.text),
            reference.span,
        )
        .with_related(
            format!("inserting text block '{}' declared here", block.text),
            block.span,
        )
    }

    pub fn invalid_insert(name: &Ident) -> Self {
        Self::new(
            SemanticErrorCode::InvalidInsert,
            format!("cannot insert '{}': it declares parameters", name.text),
            name.span,
        )
    }

    pub fn incompatible_parameter_kind(reference: &Ident, declaration: &Ident) -> Self {
        Self::new(
            SemanticErrorCode::IncompatibleParameterKind,
            format!(
                "parameter '{}' holds templates and cannot be used as a string value",
                reference.text
            ),
            reference.span,
        )
        .with_related("parameter declared here", declaration.span)
    }

    pub fn missing_parameter(param: &Ident, version: &str, other_declaration: &Ident) -> Self {
        Self::new(
            SemanticErrorCode::MissingParameter,
            format!(
                "missing parameter '{}' in version '{}'",
                param.text, version
            ),
            other_declaration.span,
        )
        .with_related("expected parameter declared here", param.span)
    }

    pub fn incorrect_parameter_type(param: &Ident, version: &str, expected: &[String]) -> Self {
        Self::new(
            SemanticErrorCode::IncorrectParameterType,
            format!(
                "incorrect type for parameter '{}' in version '{}': expected {}",
                param.text,
                version,
                expected.join(" | ")
            ),
            param.span,
        )
    }

    pub fn unused_parameter(name: &Ident) -> Self {
        Self::new(
            SemanticErrorCode::UnusedParameter,
            format!("unused parameter '{}'", name.text),
            name.span,
        )
    }

    pub fn unused_text_block(name: &Ident) -> Self {
        Self::new(
            SemanticErrorCode::UnusedTextBlock,
            format!("unused text block '{}'", name.text),
            name.span,
        )
    }
}

// =============================================================================
// WARNINGS
// =============================================================================

/// A non-fatal finding, reported when strict mode is off.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub code: SemanticErrorCode,
    pub message: String,
    pub span: SourceSpan,
}

impl Warning {
    pub fn new(code: SemanticErrorCode, message: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            code,
            message: message.into(),
            span,
        }
    }
}

// =============================================================================
// INTERNAL ERRORS
// =============================================================================

/// Violation of a pipeline invariant.
///
/// Never caused by malformed input; one of the earlier passes failed to
/// establish what a later pass assumed. The invariant text is diagnostic
/// context for defect reporting, not a user message.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("internal error: {invariant}")]
pub struct InternalError {
    pub invariant: String,
}

impl InternalError {
    pub fn new(invariant: impl Into<String>) -> Self {
        Self {
            invariant: invariant.into(),
        }
    }
}

/// Any failure surfaced by the compilation pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Semantic(#[from] SemanticError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl CompileError {
    pub fn is_semantic(&self) -> bool {
        matches!(self, CompileError::Semantic(_))
    }

    /// The semantic error, if this is one.
    pub fn as_semantic(&self) -> Option<&SemanticError> {
        match self {
            CompileError::Semantic(err) => Some(err),
            CompileError::Internal(_) => None,
        }
    }
}
