//! Declaration Collection
//!
//! First pass: builds the scope tree and the template/param arenas from
//! the declaration tree. Detects duplicate declarations and end-name
//! mismatches, registers versions, and fixes the declaration ordinals
//! every later pass resolves through.

use tracing::debug;

use crate::ast::{MacroBodyPart, MacroDecl, SourceFileDecl, TextBlockDecl, TopLevelDecl};
use crate::diagnostics::SemanticError;
use crate::model::ScopeId;
use crate::session::CompileSession;

pub fn run(session: &mut CompileSession, file: &SourceFileDecl) -> Result<(), SemanticError> {
    debug!("collecting declarations");
    let root = session.scopes.root();
    for part in &file.parts {
        match part {
            TopLevelDecl::Macro(decl) => collect_macro(session, root, decl)?,
            TopLevelDecl::TextBlock(decl) => collect_text_block(session, root, decl)?,
        }
    }
    debug!(
        templates = session.decl_count(),
        versions = session.versions().len(),
        "declarations collected"
    );
    Ok(())
}

fn collect_macro(
    session: &mut CompileSession,
    parent: ScopeId,
    decl: &MacroDecl,
) -> Result<(), SemanticError> {
    if decl.repeat_name.text != decl.name.text {
        return Err(SemanticError::end_name_mismatch(&decl.name, &decl.repeat_name));
    }

    let id = session.declare_macro(parent, decl)?;
    for param in &decl.params {
        session.declare_param(id, param)?;
    }

    let scope = session.template(id).scope;
    for part in &decl.body {
        match part {
            MacroBodyPart::NestedMacro(nested) => collect_macro(session, scope, nested)?,
            MacroBodyPart::NestedTextBlock(nested) => collect_text_block(session, scope, nested)?,
            MacroBodyPart::Text(_)
            | MacroBodyPart::Eol(_)
            | MacroBodyPart::Escape(..)
            | MacroBodyPart::Var(_)
            | MacroBodyPart::TextInsert(_)
            | MacroBodyPart::Expand(_) => {}
        }
    }
    Ok(())
}

fn collect_text_block(
    session: &mut CompileSession,
    parent: ScopeId,
    decl: &TextBlockDecl,
) -> Result<(), SemanticError> {
    if decl.repeat_name.text != decl.name.text {
        return Err(SemanticError::end_name_mismatch(&decl.name, &decl.repeat_name));
    }

    let id = session.declare_text_block(parent, decl)?;
    for param in &decl.params {
        session.declare_param(id, param)?;
    }
    // text-block bodies host no nested declarations
    Ok(())
}
