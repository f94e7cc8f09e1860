//! Name Resolution
//!
//! Second pass: one depth-first walk binding every identifier use to its
//! declaring scope entry. Parameter uses and text-block references record
//! edges into the referencing scope's sets; macro references decide the
//! expansion policy - a reference from outside the target's own subtree
//! forces it to explicit expansion. Expand options are collected here
//! with duplicate and unknown-option detection; the signature sets
//! themselves are computed by the next pass.

use std::collections::HashSet;
use tracing::{debug, trace};

use crate::ast::{
    ExpandDecl, Ident, MacroBodyPart, MacroDecl, ParamDecl, ParamTypeDecl, SourceFileDecl,
    StaticValue, TextBlockDecl, TextBodyPart, TextInsert, TopLevelDecl, ValuePart,
};
use crate::diagnostics::{CompileError, SemanticError};
use crate::model::{ExpandOptions, OptionValue, ParamId, ParamKind, ScopeId, TemplateId};
use crate::session::CompileSession;

/// Whether a parameter use must produce a plain string.
#[derive(Clone, Copy, PartialEq, Eq)]
enum UseContext {
    /// Body substitution; any kind may be emitted.
    Body,
    /// Option values and default values build strings; a template-set
    /// parameter cannot appear here.
    StringOnly,
}

pub fn run(session: &mut CompileSession, file: &SourceFileDecl) -> Result<(), CompileError> {
    debug!("resolving names");
    let mut cursor = 0usize;
    for part in &file.parts {
        match part {
            TopLevelDecl::Macro(decl) => resolve_macro(session, decl, &mut cursor)?,
            TopLevelDecl::TextBlock(decl) => resolve_text_block(session, decl, &mut cursor)?,
        }
    }
    debug!("name resolution complete");
    Ok(())
}

fn resolve_macro(
    session: &mut CompileSession,
    decl: &MacroDecl,
    cursor: &mut usize,
) -> Result<(), CompileError> {
    let id = session.decl_template(*cursor)?;
    *cursor += 1;
    let scope = session.template(id).scope;

    resolve_params(session, scope, &decl.params, id)?;

    for part in &decl.body {
        match part {
            MacroBodyPart::Text(_) | MacroBodyPart::Eol(_) | MacroBodyPart::Escape(..) => {}
            MacroBodyPart::Var(ident) => {
                resolve_var(session, scope, ident, UseContext::Body)?;
            }
            MacroBodyPart::NestedMacro(nested) => resolve_macro(session, nested, cursor)?,
            MacroBodyPart::NestedTextBlock(nested) => {
                resolve_text_block(session, nested, cursor)?
            }
            MacroBodyPart::TextInsert(insert) => resolve_insert(session, scope, insert)?,
            MacroBodyPart::Expand(expand) => resolve_expand(session, scope, id, expand)?,
        }
    }
    Ok(())
}

fn resolve_text_block(
    session: &mut CompileSession,
    decl: &TextBlockDecl,
    cursor: &mut usize,
) -> Result<(), CompileError> {
    let id = session.decl_template(*cursor)?;
    *cursor += 1;
    let scope = session.template(id).scope;

    resolve_params(session, scope, &decl.params, id)?;

    for part in &decl.body {
        match part {
            TextBodyPart::Text(_) | TextBodyPart::Eol(_) | TextBodyPart::Escape(..) => {}
            TextBodyPart::Var(ident) => {
                resolve_var(session, scope, ident, UseContext::Body)?;
            }
            TextBodyPart::TextInsert(insert) => resolve_insert(session, scope, insert)?,
        }
    }
    Ok(())
}

/// Resolve all parameter types before any default value: defaults may
/// reference siblings declared later, whose kinds must already be known.
fn resolve_params(
    session: &mut CompileSession,
    scope: ScopeId,
    decls: &[ParamDecl],
    owner: TemplateId,
) -> Result<(), CompileError> {
    let params: Vec<ParamId> = session.template(owner).params.clone();

    for (decl, &id) in decls.iter().zip(&params) {
        resolve_param_type(session, decl, id)?;
    }
    for (decl, &id) in decls.iter().zip(&params) {
        resolve_param_value(session, scope, decl, id)?;
    }
    Ok(())
}

fn resolve_param_type(
    session: &mut CompileSession,
    decl: &ParamDecl,
    id: ParamId,
) -> Result<(), CompileError> {
    let members = match &decl.ty {
        // absent annotation means a plain string parameter
        None | Some(ParamTypeDecl::String) => return Ok(()),
        Some(ParamTypeDecl::Templates(members)) => members,
    };

    let mut seen = HashSet::new();
    let mut targets = Vec::with_capacity(members.len());
    for member in members {
        let target = session
            .lookup_global_macro(&member.text)
            .ok_or_else(|| SemanticError::unknown_macro(member))?;
        if !seen.insert(target) {
            return Err(SemanticError::duplicate_type_member(member, &decl.name).into());
        }
        targets.push(target);
    }
    session.param_mut(id).kind = ParamKind::TemplateSet(targets);
    Ok(())
}

fn resolve_param_value(
    session: &mut CompileSession,
    scope: ScopeId,
    decl: &ParamDecl,
    id: ParamId,
) -> Result<(), CompileError> {
    let Some(value) = &decl.value else {
        return Ok(());
    };
    for part in value {
        match part {
            ValuePart::Text(_) => {}
            ValuePart::Var(ident) => {
                let target = resolve_var(session, scope, ident, UseContext::StringOnly)?;
                session.param_mut(id).add_param_ref(target, ident.span);
            }
        }
    }
    Ok(())
}

fn resolve_var(
    session: &mut CompileSession,
    scope: ScopeId,
    ident: &Ident,
    context: UseContext,
) -> Result<ParamId, CompileError> {
    let Some(id) = session.scopes.lookup_param(scope, &ident.text) else {
        return Err(SemanticError::unknown_parameter(ident).into());
    };
    if context == UseContext::StringOnly && !session.param(id).kind.is_string() {
        return Err(
            SemanticError::incompatible_parameter_kind(ident, &session.param(id).name).into(),
        );
    }
    session.param_mut(id).mark_used();
    session.scopes.add_referenced_param(scope, id);
    trace!(param = %ident.text, "bound parameter use");
    Ok(id)
}

fn resolve_insert(
    session: &mut CompileSession,
    scope: ScopeId,
    insert: &TextInsert,
) -> Result<(), CompileError> {
    let Some(target) = session.scopes.lookup_text_block(scope, &insert.name.text) else {
        return Err(SemanticError::unknown_text_block(&insert.name).into());
    };
    session.template_mut(target).mark_used();
    session.scopes.add_referenced_text_block(scope, target);
    trace!(text_block = %insert.name.text, "bound text-block reference");
    Ok(())
}

fn resolve_expand(
    session: &mut CompileSession,
    scope: ScopeId,
    owner: TemplateId,
    decl: &ExpandDecl,
) -> Result<(), CompileError> {
    let mut seen = HashSet::new();
    let mut members = Vec::with_capacity(decl.macros.len());
    for name in &decl.macros {
        let Some(target) = session.scopes.lookup_macro(scope, &name.text) else {
            return Err(SemanticError::unknown_macro(name).into());
        };
        // a reference from outside the target's ancestor chain ends its
        // implicit expansion, permanently
        if !session.scopes.has_ancestor(scope, target) {
            if session.template(target).is_auto_expand() {
                trace!(target = %name.text, "auto-expand disabled by explicit reference");
            }
            session.template_mut(target).unset_auto_expand();
        }
        if seen.insert(target) {
            members.push(target);
        }
    }

    let mut options = ExpandOptions::default();
    for option in &decl.options {
        let value = match &option.value {
            StaticValue::Literal(chunk) => OptionValue::Literal(chunk.text.clone(), chunk.span),
            StaticValue::Var(ident) => {
                let param = resolve_var(session, scope, ident, UseContext::StringOnly)?;
                OptionValue::Param(param, ident.span)
            }
        };
        options.set(&option.name, value)?;
    }

    session.add_expand(owner, decl.span, members, options);
    Ok(())
}
