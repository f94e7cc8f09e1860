//! Cycle Detectors
//!
//! Fourth pass: two instances of the same eager algorithm over different
//! edge sets, both run after resolution so every edge points at a
//! concrete entity. Edges are validated one at a time in declaration
//! order; the first cycle introduced is the one reported, which keeps the
//! diagnostic stable under unrelated edits elsewhere in the file.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use tracing::debug;

use crate::ast::{
    Ident, MacroBodyPart, MacroDecl, SourceFileDecl, TextBlockDecl, TextBodyPart, TextInsert,
    TopLevelDecl,
};
use crate::diagnostics::{CompileError, InternalError, SemanticError};
use crate::model::{ParamId, ScopeId, TemplateId};
use crate::session::CompileSession;

pub fn run(session: &CompileSession, file: &SourceFileDecl) -> Result<(), CompileError> {
    debug!("checking text-block insert cycles");
    insert_cycles(session, file)?;
    debug!("checking parameter reference cycles");
    param_cycles(session)?;
    Ok(())
}

/// Can `start` reach `goal` through the edges validated so far?
fn reaches<T: Copy + Eq + Hash>(edges: &HashMap<T, Vec<T>>, start: T, goal: T) -> bool {
    let mut visited = HashSet::new();
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        if node == goal {
            return true;
        }
        if visited.insert(node) {
            if let Some(next) = edges.get(&node) {
                stack.extend(next.iter().copied());
            }
        }
    }
    false
}

// =============================================================================
// Text-block insert cycles
// =============================================================================

fn insert_cycles(session: &CompileSession, file: &SourceFileDecl) -> Result<(), CompileError> {
    let mut detector = InsertDetector {
        edges: HashMap::new(),
    };
    let mut cursor = 0usize;
    for part in &file.parts {
        match part {
            TopLevelDecl::Macro(decl) => visit_macro(session, &mut detector, decl, &mut cursor)?,
            TopLevelDecl::TextBlock(decl) => {
                visit_text_block(session, &mut detector, decl, &mut cursor)?
            }
        }
    }
    Ok(())
}

struct InsertDetector {
    /// Already-validated outgoing inserts per text block.
    edges: HashMap<TemplateId, Vec<TemplateId>>,
}

impl InsertDetector {
    /// Validate one insert. `source` is the text block performing it, if
    /// any; inserts from macro bodies are references, not insert edges.
    fn check(
        &mut self,
        session: &CompileSession,
        source: Option<TemplateId>,
        insert: &TextInsert,
        target: TemplateId,
    ) -> Result<(), SemanticError> {
        if !session.template(target).params.is_empty() {
            return Err(SemanticError::invalid_insert(&insert.name));
        }
        let Some(source) = source else {
            return Ok(());
        };

        let known = self
            .edges
            .get(&source)
            .is_some_and(|targets| targets.contains(&target));
        if known {
            return Ok(());
        }
        if reaches(&self.edges, target, source) {
            return Err(SemanticError::cyclic_text_block_insert(
                &insert.name,
                &session.template(source).name,
            ));
        }
        self.edges.entry(source).or_default().push(target);
        Ok(())
    }
}

fn visit_macro(
    session: &CompileSession,
    detector: &mut InsertDetector,
    decl: &MacroDecl,
    cursor: &mut usize,
) -> Result<(), CompileError> {
    let id = session.decl_template(*cursor)?;
    *cursor += 1;
    let scope = session.template(id).scope;

    for part in &decl.body {
        match part {
            MacroBodyPart::Text(_)
            | MacroBodyPart::Eol(_)
            | MacroBodyPart::Escape(..)
            | MacroBodyPart::Var(_)
            | MacroBodyPart::Expand(_) => {}
            MacroBodyPart::NestedMacro(nested) => {
                visit_macro(session, detector, nested, cursor)?
            }
            MacroBodyPart::NestedTextBlock(nested) => {
                visit_text_block(session, detector, nested, cursor)?
            }
            MacroBodyPart::TextInsert(insert) => {
                let target = lookup_insert_target(session, scope, insert)?;
                detector.check(session, None, insert, target)?;
            }
        }
    }
    Ok(())
}

fn visit_text_block(
    session: &CompileSession,
    detector: &mut InsertDetector,
    decl: &TextBlockDecl,
    cursor: &mut usize,
) -> Result<(), CompileError> {
    let id = session.decl_template(*cursor)?;
    *cursor += 1;
    let scope = session.template(id).scope;

    for part in &decl.body {
        match part {
            TextBodyPart::Text(_)
            | TextBodyPart::Eol(_)
            | TextBodyPart::Escape(..)
            | TextBodyPart::Var(_) => {}
            TextBodyPart::TextInsert(insert) => {
                let target = lookup_insert_target(session, scope, insert)?;
                detector.check(session, Some(id), insert, target)?;
            }
        }
    }
    Ok(())
}

fn lookup_insert_target(
    session: &CompileSession,
    scope: ScopeId,
    insert: &TextInsert,
) -> Result<TemplateId, InternalError> {
    session
        .scopes
        .lookup_text_block(scope, &insert.name.text)
        .ok_or_else(|| InternalError::new("text insert target vanished after resolution"))
}

// =============================================================================
// Parameter reference cycles
// =============================================================================

fn param_cycles(session: &CompileSession) -> Result<(), CompileError> {
    let mut edges: HashMap<ParamId, Vec<ParamId>> = HashMap::new();

    for ordinal in 0..session.decl_count() {
        let template = session.template(session.decl_template(ordinal)?);
        for &param_id in &template.params {
            let param = session.param(param_id);
            for &(target, span) in param.param_refs() {
                let reference = Ident::new(session.param(target).name.text.clone(), span);

                // a direct self-reference is its own, more specific error
                if target == param_id {
                    return Err(SemanticError::self_reference(&reference, &param.name).into());
                }
                let known = edges
                    .get(&param_id)
                    .is_some_and(|targets| targets.contains(&target));
                if known {
                    continue;
                }
                if reaches(&edges, target, param_id) {
                    return Err(SemanticError::cyclic_reference(&reference, &param.name).into());
                }
                edges.entry(param_id).or_default().push(target);
            }
        }
    }
    Ok(())
}
