//! End-to-end pipeline tests: whole declaration trees through every pass.

use pretty_assertions::assert_eq;

use macrogen::ast::{
    ExpandDecl, MacroBodyPart, MacroDecl, OptionDecl, ParamDecl, StaticValue, TextBlockDecl,
    TextBodyPart, TextChunk, TextInsert,
};
use macrogen::{
    compile, CompileOptions, Ident, OptionValue, SemanticErrorCode, SourceFileDecl, SourceSpan,
    TemplateKind,
};

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn expand(span: SourceSpan, names: &[Ident]) -> ExpandDecl {
    let mut decl = ExpandDecl::new(span);
    for name in names {
        decl = decl.with_macro(name.clone());
    }
    decl
}

/// The canonical scenario: `A(x: TemplateSet{B, C})` whose body is
/// `expand(B, C) separator=", "`, with `B` and `C` as top-level siblings.
fn sibling_expand_file() -> SourceFileDecl {
    SourceFileDecl::new()
        .with_macro(
            MacroDecl::new(Ident::at("a", 1, 1))
                .with_param(ParamDecl::templates(
                    Ident::at("x", 1, 8),
                    vec![Ident::at("b", 1, 12), Ident::at("c", 1, 15)],
                ))
                .with_part(MacroBodyPart::Var(Ident::at("x", 2, 3)))
                .with_part(MacroBodyPart::Expand(
                    expand(
                        SourceSpan::new(3, 3),
                        &[Ident::at("b", 3, 10), Ident::at("c", 3, 13)],
                    )
                    .with_option(OptionDecl::new(
                        Ident::at("separator", 3, 17),
                        StaticValue::Literal(TextChunk::new(", ", SourceSpan::new(3, 27))),
                    )),
                )),
        )
        .with_macro(MacroDecl::new(Ident::at("b", 6, 1)))
        .with_macro(MacroDecl::new(Ident::at("c", 8, 1)))
}

#[test]
fn end_to_end_sibling_expand() {
    init_tracing();
    let model = compile(&sibling_expand_file(), &CompileOptions::new()).unwrap();

    // exactly one signature: {b, c}
    assert_eq!(model.signatures().len(), 1);
    let signature = &model.signatures()[0];
    assert_eq!(signature.name(), "expand_0");
    assert_eq!(signature.members().len(), 2);

    // the explicit reference from a flips both siblings
    let b = model.template_by_name("b").unwrap();
    let c = model.template_by_name("c").unwrap();
    assert!(!b.is_auto_expand());
    assert!(!c.is_auto_expand());

    // a drives both through the shared signature
    let a = model.template_by_name("a").unwrap();
    assert_eq!(a.referenced_templates(), &[b.id, c.id]);
    assert_eq!(a.signatures_for(b.id), &[signature.id]);
    assert_eq!(a.signatures_for(c.id), &[signature.id]);

    // the separator option survived resolution
    let statement = &model.expands()[0];
    assert_eq!(statement.signature(), Some(signature.id));
    match statement.options.separator.as_ref().unwrap() {
        OptionValue::Literal(text, _) => assert_eq!(text, ", "),
        OptionValue::Param(..) => panic!("separator should be a literal"),
    }
    assert!(statement.options.none.is_none());
}

#[test]
fn identical_sets_share_identity_across_the_program() {
    init_tracing();
    let file = SourceFileDecl::new()
        .with_macro(MacroDecl::new(Ident::at("b", 1, 1)))
        .with_macro(MacroDecl::new(Ident::at("c", 2, 1)))
        .with_macro(MacroDecl::new(Ident::at("first", 4, 1)).with_part(
            MacroBodyPart::Expand(expand(
                SourceSpan::new(5, 3),
                &[Ident::at("b", 5, 10), Ident::at("c", 5, 13)],
            )),
        ))
        .with_macro(MacroDecl::new(Ident::at("second", 8, 1)).with_part(
            MacroBodyPart::Expand(expand(
                SourceSpan::new(9, 3),
                &[Ident::at("c", 9, 10), Ident::at("b", 9, 13)],
            )),
        ))
        .with_macro(MacroDecl::new(Ident::at("third", 12, 1)).with_part(
            MacroBodyPart::Expand(expand(SourceSpan::new(13, 3), &[Ident::at("b", 13, 10)])),
        ));
    let model = compile(&file, &CompileOptions::new()).unwrap();

    // {b,c} twice shares one id; {b} is a different set and a new id
    assert_eq!(model.signatures().len(), 2);
    let expands = model.expands();
    assert_eq!(expands[0].signature(), expands[1].signature());
    assert_ne!(expands[0].signature(), expands[2].signature());
}

#[test]
fn compilation_is_idempotent() {
    init_tracing();
    let file = sibling_expand_file();
    let first = compile(&file, &CompileOptions::new()).unwrap();
    let second = compile(&file, &CompileOptions::new()).unwrap();

    let names = |model: &macrogen::CompiledModel| -> Vec<String> {
        model.signatures().iter().map(|s| s.name()).collect()
    };
    let flags = |model: &macrogen::CompiledModel| -> Vec<bool> {
        model
            .templates()
            .iter()
            .map(|t| t.is_auto_expand())
            .collect()
    };
    assert_eq!(names(&first), names(&second));
    assert_eq!(flags(&first), flags(&second));
    assert_eq!(first.signatures().len(), second.signatures().len());
}

#[test]
fn text_block_cycle_fails_on_the_closing_edge() {
    init_tracing();
    let block = |name: &str, line: u32, target: &str| {
        TextBlockDecl::new(Ident::at(name, line, 1)).with_part(TextBodyPart::TextInsert(
            TextInsert::new(Ident::at(target, line + 1, 3)),
        ))
    };
    let file = SourceFileDecl::new()
        .with_text_block(block("a", 1, "b"))
        .with_text_block(block("b", 4, "c"))
        .with_text_block(
            TextBlockDecl::new(Ident::at("c", 7, 1)).with_part(TextBodyPart::TextInsert(
                TextInsert::new(Ident::at("a", 8, 3)),
            )),
        );

    let err = compile(&file, &CompileOptions::new()).unwrap_err();
    let err = err.as_semantic().unwrap();
    assert_eq!(err.code, SemanticErrorCode::CyclicTextBlockInsert);
    assert_eq!(err.span, SourceSpan::new(8, 3));

    // the same chain without the closing edge is fine
    let open = SourceFileDecl::new()
        .with_text_block(block("a", 1, "b"))
        .with_text_block(block("b", 4, "c"))
        .with_text_block(TextBlockDecl::new(Ident::at("c", 7, 1)));
    // blocks b and c are referenced; a is not, so stay non-strict
    compile(&open, &CompileOptions::new()).unwrap();
}

#[test]
fn auto_expand_survives_subtree_references_only() {
    init_tracing();
    // "holder" is expanded from inside its own subtree: stays implicit
    let subtree_only = SourceFileDecl::new().with_macro(
        MacroDecl::new(Ident::at("holder", 1, 1)).with_part(MacroBodyPart::NestedMacro(
            MacroDecl::new(Ident::at("inner", 2, 3)).with_part(MacroBodyPart::Expand(expand(
                SourceSpan::new(3, 5),
                &[Ident::at("holder", 3, 12)],
            ))),
        )),
    );
    let model = compile(&subtree_only, &CompileOptions::new()).unwrap();
    assert!(model.template_by_name("holder").unwrap().is_auto_expand());

    // one additional reference from an unrelated sibling flips it for good
    let with_sibling = SourceFileDecl::new()
        .with_macro(
            MacroDecl::new(Ident::at("holder", 1, 1)).with_part(MacroBodyPart::NestedMacro(
                MacroDecl::new(Ident::at("inner", 2, 3)).with_part(MacroBodyPart::Expand(
                    expand(SourceSpan::new(3, 5), &[Ident::at("holder", 3, 12)]),
                )),
            )),
        )
        .with_macro(
            MacroDecl::new(Ident::at("driver", 6, 1)).with_part(MacroBodyPart::Expand(expand(
                SourceSpan::new(7, 3),
                &[Ident::at("holder", 7, 10)],
            ))),
        );
    let model = compile(&with_sibling, &CompileOptions::new()).unwrap();
    assert!(!model.template_by_name("holder").unwrap().is_auto_expand());
}

#[test]
fn version_widening_passes_and_narrowing_fails() {
    init_tracing();
    let file = |first: &[(&str, u32)], second: &[(&str, u32)]| {
        SourceFileDecl::new()
            .with_macro(MacroDecl::new(Ident::at("x", 1, 1)))
            .with_macro(MacroDecl::new(Ident::at("y", 2, 1)))
            .with_macro(MacroDecl::new(Ident::at("z", 3, 1)))
            .with_macro(
                MacroDecl::new(Ident::at("item", 5, 1))
                    .with_version(Ident::at("v1", 5, 10))
                    .with_param(ParamDecl::templates(
                        Ident::at("p", 5, 14),
                        first.iter().map(|(n, c)| Ident::at(*n, 5, *c)).collect(),
                    ))
                    .with_part(MacroBodyPart::Var(Ident::at("p", 6, 3))),
            )
            .with_macro(
                MacroDecl::new(Ident::at("item", 9, 1))
                    .with_version(Ident::at("v2", 9, 10))
                    .with_param(ParamDecl::templates(
                        Ident::at("p", 9, 14),
                        second.iter().map(|(n, c)| Ident::at(*n, 9, *c)).collect(),
                    ))
                    .with_part(MacroBodyPart::Var(Ident::at("p", 10, 3))),
            )
    };

    // reference {x,y}, other {x,y,z}: the other may accept more
    let widening = file(&[("x", 20), ("y", 23)], &[("x", 20), ("y", 23), ("z", 26)]);
    compile(&widening, &CompileOptions::new()).unwrap();

    // reference {x,y,z}, other {x,y}: never a strict subset
    let narrowing = file(&[("x", 20), ("y", 23), ("z", 26)], &[("x", 20), ("y", 23)]);
    let err = compile(&narrowing, &CompileOptions::new()).unwrap_err();
    assert_eq!(
        err.as_semantic().unwrap().code,
        SemanticErrorCode::IncorrectParameterType
    );
}

#[test]
fn strict_mode_turns_warnings_into_errors() {
    init_tracing();
    let file = SourceFileDecl::new().with_macro(
        MacroDecl::new(Ident::at("m", 1, 1))
            .with_param(ParamDecl::new(Ident::at("unused", 1, 8))),
    );

    let model = compile(&file, &CompileOptions::new()).unwrap();
    assert_eq!(model.warnings.len(), 1);
    assert_eq!(model.warnings[0].code, SemanticErrorCode::UnusedParameter);

    let err = compile(&file, &CompileOptions::new().strict()).unwrap_err();
    assert_eq!(
        err.as_semantic().unwrap().code,
        SemanticErrorCode::UnusedParameter
    );
}

#[test]
fn generator_contract_exposes_reference_sets() {
    init_tracing();
    let file = SourceFileDecl::new()
        .with_text_block(TextBlockDecl::new(Ident::at("license", 1, 1)))
        .with_macro(
            MacroDecl::new(Ident::at("file_header", 3, 1))
                .with_param(ParamDecl::new(Ident::at("year", 3, 14)))
                .with_part(MacroBodyPart::TextInsert(TextInsert::new(Ident::at(
                    "license", 4, 3,
                ))))
                .with_part(MacroBodyPart::Var(Ident::at("year", 5, 3))),
        );
    let model = compile(&file, &CompileOptions::new().with_package_name("gen")).unwrap();

    assert_eq!(model.package_name.as_deref(), Some("gen"));
    let header = model.template_by_name("file_header").unwrap();
    assert_eq!(header.kind, TemplateKind::Macro);
    assert_eq!(header.camel_case_name(), "FileHeader");

    let params = model.referenced_params(header.id);
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].name(), "year");

    let blocks = model.referenced_text_blocks(header.id);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].name(), "license");
}

#[test]
fn duplicate_declaration_reports_the_original_position() {
    init_tracing();
    let file = SourceFileDecl::new()
        .with_macro(MacroDecl::new(Ident::at("m", 1, 1)))
        .with_macro(MacroDecl::new(Ident::at("m", 7, 1)));
    let err = compile(&file, &CompileOptions::new()).unwrap_err();
    let err = err.as_semantic().unwrap();
    assert_eq!(err.code, SemanticErrorCode::DuplicateDeclaration);
    assert_eq!(err.related[0].span, SourceSpan::new(1, 1));
}

#[test]
fn self_reference_beats_generic_cycle() {
    init_tracing();
    let file = SourceFileDecl::new().with_macro(
        MacroDecl::new(Ident::at("m", 1, 1))
            .with_param(
                ParamDecl::new(Ident::at("p", 1, 8)).with_value(vec![
                    macrogen::ast::ValuePart::Var(Ident::at("p", 1, 14)),
                ]),
            )
            .with_part(MacroBodyPart::Var(Ident::at("p", 2, 3))),
    );
    let err = compile(&file, &CompileOptions::new()).unwrap_err();
    assert_eq!(
        err.as_semantic().unwrap().code,
        SemanticErrorCode::SelfReference
    );
}
