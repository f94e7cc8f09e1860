//! Expansion Signatures
//!
//! Third pass: canonicalizes every expansion into a shared, deduplicated
//! signature keyed by the set of referenced templates. Runs only after
//! resolution so the auto-expand flags are final.
//!
//! Two origins feed the same registry: templates still implicitly
//! expanded receive a single-element `{self}` signature wired to their
//! parent, and each explicit expand statement looks up or creates the
//! signature of exactly its member set.

use tracing::debug;

use crate::ast::{MacroBodyPart, MacroDecl, SourceFileDecl, TextBlockDecl, TopLevelDecl};
use crate::diagnostics::{CompileError, InternalError};
use crate::model::{TemplateId, TemplateKind};
use crate::session::CompileSession;

struct Walk {
    decl: usize,
    expand: usize,
}

pub fn run(session: &mut CompileSession, file: &SourceFileDecl) -> Result<(), CompileError> {
    debug!("computing expand signatures");
    let mut walk = Walk { decl: 0, expand: 0 };
    for part in &file.parts {
        match part {
            TopLevelDecl::Macro(decl) => visit_macro(session, decl, &mut walk)?,
            TopLevelDecl::TextBlock(decl) => visit_text_block(session, decl, &mut walk)?,
        }
    }
    debug!(signatures = session.signatures().len(), "signatures computed");
    Ok(())
}

fn visit_macro(
    session: &mut CompileSession,
    decl: &MacroDecl,
    walk: &mut Walk,
) -> Result<(), CompileError> {
    let id = session.decl_template(walk.decl)?;
    walk.decl += 1;

    add_implicit(session, id)?;

    for part in &decl.body {
        match part {
            MacroBodyPart::Text(_)
            | MacroBodyPart::Eol(_)
            | MacroBodyPart::Escape(..)
            | MacroBodyPart::Var(_)
            | MacroBodyPart::TextInsert(_) => {}
            MacroBodyPart::NestedMacro(nested) => visit_macro(session, nested, walk)?,
            MacroBodyPart::NestedTextBlock(nested) => visit_text_block(session, nested, walk)?,
            MacroBodyPart::Expand(_) => {
                let expand = session.decl_expand(walk.expand)?;
                walk.expand += 1;

                let members = session.expand(expand).members.clone();
                let signature = session.intern_signature(members.clone());
                session.expand_mut(expand).signature = Some(signature);
                session.template_mut(id).add_signature(signature, &members);
            }
        }
    }
    Ok(())
}

fn visit_text_block(
    session: &mut CompileSession,
    _decl: &TextBlockDecl,
    walk: &mut Walk,
) -> Result<(), CompileError> {
    let id = session.decl_template(walk.decl)?;
    walk.decl += 1;
    add_implicit(session, id)
}

/// Wire a still-auto-expanding, non-top-level template into its parent:
/// the parent's generated constructor appends it without an explicit
/// expand statement.
fn add_implicit(session: &mut CompileSession, id: TemplateId) -> Result<(), CompileError> {
    let template = session.template(id);
    if !template.is_auto_expand() || template.top_level {
        return Ok(());
    }
    let parent_scope = template.parent_scope;
    let kind = template.kind;

    let Some(parent) = session.scopes.get(parent_scope).template else {
        return Err(
            InternalError::new("non-top-level template parented by the root scope").into(),
        );
    };

    let signature = session.intern_signature(vec![id]);
    session.template_mut(parent).add_signature(signature, &[id]);

    if kind == TemplateKind::TextBlock {
        // the parent emits the block, which counts as a use
        session.scopes.add_referenced_text_block(parent_scope, id);
        session.template_mut(id).mark_used();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ExpandDecl, Ident, SourceSpan};
    use crate::{collect, resolve};

    fn analyzed(file: &SourceFileDecl) -> CompileSession {
        let mut session = CompileSession::new();
        collect::run(&mut session, file).unwrap();
        resolve::run(&mut session, file).unwrap();
        run(&mut session, file).unwrap();
        session
    }

    fn expand(names: &[(&str, u32, u32)], line: u32, col: u32) -> MacroBodyPart {
        let mut decl = ExpandDecl::new(SourceSpan::new(line, col));
        for (name, l, c) in names {
            decl = decl.with_macro(Ident::at(*name, *l, *c));
        }
        MacroBodyPart::Expand(decl)
    }

    #[test]
    fn same_set_any_order_shares_one_signature() {
        let file = SourceFileDecl::new()
            .with_macro(MacroDecl::new(Ident::at("b", 1, 1)))
            .with_macro(MacroDecl::new(Ident::at("c", 2, 1)))
            .with_macro(
                MacroDecl::new(Ident::at("first", 3, 1))
                    .with_part(expand(&[("b", 4, 10), ("c", 4, 13)], 4, 3)),
            )
            .with_macro(
                MacroDecl::new(Ident::at("second", 6, 1))
                    .with_part(expand(&[("c", 7, 10), ("b", 7, 13)], 7, 3)),
            );
        let session = analyzed(&file);

        assert_eq!(session.signatures().len(), 1);
        let first = session.expands()[0].signature().unwrap();
        let second = session.expands()[1].signature().unwrap();
        assert_eq!(first, second);
        assert_eq!(session.signature(first).name(), "expand_0");
    }

    #[test]
    fn different_sets_get_distinct_signatures() {
        let file = SourceFileDecl::new()
            .with_macro(MacroDecl::new(Ident::at("b", 1, 1)))
            .with_macro(MacroDecl::new(Ident::at("c", 2, 1)))
            .with_macro(
                MacroDecl::new(Ident::at("m", 3, 1))
                    .with_part(expand(&[("b", 4, 10), ("c", 4, 13)], 4, 3))
                    .with_part(expand(&[("b", 5, 10)], 5, 3)),
            );
        let session = analyzed(&file);

        assert_eq!(session.signatures().len(), 2);
        let m = session.template(session.decl_template(2).unwrap());
        assert_eq!(m.signatures().len(), 2);
    }

    #[test]
    fn duplicates_within_one_expand_collapse() {
        let file = SourceFileDecl::new()
            .with_macro(MacroDecl::new(Ident::at("b", 1, 1)))
            .with_macro(
                MacroDecl::new(Ident::at("m", 2, 1))
                    .with_part(expand(&[("b", 3, 10), ("b", 3, 13)], 3, 3)),
            );
        let session = analyzed(&file);

        let signature = session.expands()[0].signature().unwrap();
        assert_eq!(session.signature(signature).members().len(), 1);
    }

    #[test]
    fn nested_auto_template_wires_parent() {
        let file = SourceFileDecl::new().with_macro(
            MacroDecl::new(Ident::at("outer", 1, 1)).with_part(MacroBodyPart::NestedMacro(
                MacroDecl::new(Ident::at("inner", 2, 3)),
            )),
        );
        let session = analyzed(&file);

        let outer_id = session.decl_template(0).unwrap();
        let inner_id = session.decl_template(1).unwrap();
        let outer = session.template(outer_id);
        assert_eq!(session.signatures().len(), 1);
        assert_eq!(outer.referenced_templates(), &[inner_id]);
        assert_eq!(outer.signatures_for(inner_id).len(), 1);
    }

    #[test]
    fn top_level_auto_template_gets_no_implicit_signature() {
        let file =
            SourceFileDecl::new().with_macro(MacroDecl::new(Ident::at("solo", 1, 1)));
        let session = analyzed(&file);
        assert!(session.signatures().is_empty());
    }

    #[test]
    fn flipped_nested_template_gets_no_implicit_signature() {
        // child_a is expanded explicitly by its sibling child_b, so only
        // the explicit signature exists for it; child_b keeps its implicit
        // wiring into outer
        let file = SourceFileDecl::new().with_macro(
            MacroDecl::new(Ident::at("outer", 1, 1))
                .with_part(MacroBodyPart::NestedMacro(MacroDecl::new(Ident::at(
                    "child_a", 2, 3,
                ))))
                .with_part(MacroBodyPart::NestedMacro(
                    MacroDecl::new(Ident::at("child_b", 4, 3))
                        .with_part(expand(&[("child_a", 5, 12)], 5, 5)),
                )),
        );
        let session = analyzed(&file);

        let outer_id = session.decl_template(0).unwrap();
        let child_a = session.decl_template(1).unwrap();
        let child_b = session.decl_template(2).unwrap();
        assert!(!session.template(child_a).is_auto_expand());
        assert!(session.template(child_b).is_auto_expand());

        // one implicit {child_b} on outer, one explicit {child_a} on child_b
        assert_eq!(session.signatures().len(), 2);
        let outer = session.template(outer_id);
        assert_eq!(outer.referenced_templates(), &[child_b]);
        assert_eq!(
            session.template(child_b).referenced_templates(),
            &[child_a]
        );
    }
}
