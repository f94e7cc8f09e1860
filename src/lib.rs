//! macrogen: macro-templating compiler pipeline
//!
//! Drives the semantic analysis of a parsed declaration tree through the
//! fixed pass order and hands the validated, deduplicated model to the
//! code generator:
//!
//! ```text
//! declaration tree -> collect -> resolve -> signatures -> cycles
//!                  -> version verify -> completeness -> CompiledModel
//! ```
//!
//! Parsing, text emission, and the CLI live outside this crate; the
//! pipeline neither reads nor writes files and reports every failure as a
//! structured [`CompileError`] for the front end to format.

use tracing::debug;

use macrogen_core::{collect, completeness, cycles, resolve, signatures, versions};

pub use macrogen_core::ast;
pub use macrogen_core::diagnostics::{
    CompileError, InternalError, RelatedPosition, SemanticError, SemanticErrorCode, Warning,
};
pub use macrogen_core::model::{
    Expand, ExpandSignature, OptionValue, Param, ParamId, ParamKind, SignatureId, Template,
    TemplateId, TemplateKind,
};
pub use macrogen_core::{CompileSession, Ident, SourceFileDecl, SourceSpan};

/// How hard to push back on incomplete input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Strictness {
    /// Unused declarations become warnings on the compiled model.
    #[default]
    Normal,
    /// Unused declarations abort the run like any other semantic error.
    Strict,
}

/// Front-end supplied configuration for one run.
#[derive(Clone, Debug, Default)]
pub struct CompileOptions {
    pub strictness: Strictness,
    /// Target package/namespace the generator will emit into.
    pub package_name: Option<String>,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict(mut self) -> Self {
        self.strictness = Strictness::Strict;
        self
    }

    pub fn with_package_name(mut self, name: impl Into<String>) -> Self {
        self.package_name = Some(name.into());
        self
    }
}

/// The fully verified model, ready for code generation.
///
/// Owns the session with every arena and registry; the accessors below
/// cover the generator's consumption contract.
#[derive(Debug)]
pub struct CompiledModel {
    session: CompileSession,
    pub warnings: Vec<Warning>,
    pub package_name: Option<String>,
}

impl CompiledModel {
    pub fn session(&self) -> &CompileSession {
        &self.session
    }

    pub fn templates(&self) -> &[Template] {
        self.session.templates()
    }

    pub fn template(&self, id: TemplateId) -> &Template {
        self.session.template(id)
    }

    /// Look a template up by name, using the root scope.
    pub fn template_by_name(&self, name: &str) -> Option<&Template> {
        let root = self.session.scopes.root();
        self.session
            .scopes
            .lookup_macro(root, name)
            .or_else(|| self.session.scopes.lookup_text_block(root, name))
            .map(|id| self.session.template(id))
    }

    /// The global signature list, ordered by generated name.
    pub fn signatures(&self) -> &[ExpandSignature] {
        self.session.signatures()
    }

    /// Expand statements in declaration order, with their options.
    pub fn expands(&self) -> &[Expand] {
        self.session.expands()
    }

    /// Params referenced from a template's body, deciding the accessor
    /// surface the generator must emit for it.
    pub fn referenced_params(&self, template: TemplateId) -> Vec<&Param> {
        let scope = self.session.template(template).scope;
        self.session
            .scopes
            .get(scope)
            .referenced_params()
            .iter()
            .map(|&id| self.session.param(id))
            .collect()
    }

    /// Text blocks referenced from a template's body.
    pub fn referenced_text_blocks(&self, template: TemplateId) -> Vec<&Template> {
        let scope = self.session.template(template).scope;
        self.session
            .scopes
            .get(scope)
            .referenced_text_blocks()
            .iter()
            .map(|&id| self.session.template(id))
            .collect()
    }
}

/// Run the full pipeline over one declaration tree.
///
/// Passes are strictly ordered and never interleave; the first error any
/// pass detects aborts the run.
pub fn compile(
    file: &SourceFileDecl,
    options: &CompileOptions,
) -> Result<CompiledModel, CompileError> {
    debug!(strictness = ?options.strictness, "starting compilation");
    let mut session = CompileSession::new();

    collect::run(&mut session, file)?;
    resolve::run(&mut session, file)?;
    signatures::run(&mut session, file)?;
    cycles::run(&session, file)?;
    versions::run(&session)?;
    let warnings = completeness::run(&session, options.strictness == Strictness::Strict)?;

    debug!(
        templates = session.templates().len(),
        signatures = session.signatures().len(),
        warnings = warnings.len(),
        "compilation complete"
    );
    Ok(CompiledModel {
        session,
        warnings,
        package_name: options.package_name.clone(),
    })
}
