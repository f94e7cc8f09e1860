//! Declaration Tree
//!
//! Input contract from the front end: a fully parsed tree of macro and
//! text-block declarations, every node carrying a source position usable
//! verbatim in diagnostics. The tree is immutable once handed to the
//! pipeline; no pass starts before the whole tree is available.
//!
//! Body parts are tagged unions, matched exhaustively by every pass. The
//! split between [`MacroBodyPart`] and [`TextBodyPart`] is deliberate:
//! only macro bodies may host nested declarations and expand statements,
//! so the capability difference is structural rather than enforced with
//! runtime refusals.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source position carried by every declaration-tree node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub line: u32,
    pub column: u32,
}

impl SourceSpan {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// An identifier together with its source position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ident {
    pub text: String,
    pub span: SourceSpan,
}

impl Ident {
    pub fn new(text: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            text: text.into(),
            span,
        }
    }

    /// Shorthand used by front ends and tests alike.
    pub fn at(text: impl Into<String>, line: u32, column: u32) -> Self {
        Self::new(text, SourceSpan::new(line, column))
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A run of literal text inside a body or value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub text: String,
    pub span: SourceSpan,
}

impl TextChunk {
    pub fn new(text: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            text: text.into(),
            span,
        }
    }
}

/// Escaped character in literal text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscapeKind {
    /// A literal `$`.
    Dollar,
    /// A literal `\`.
    Backslash,
}

/// The root of one compilation's declaration tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFileDecl {
    pub parts: Vec<TopLevelDecl>,
}

impl SourceFileDecl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_macro(mut self, decl: MacroDecl) -> Self {
        self.parts.push(TopLevelDecl::Macro(decl));
        self
    }

    pub fn with_text_block(mut self, decl: TextBlockDecl) -> Self {
        self.parts.push(TopLevelDecl::TextBlock(decl));
        self
    }
}

/// One top-level declaration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopLevelDecl {
    Macro(MacroDecl),
    TextBlock(TextBlockDecl),
}

/// A macro declaration: named, parametrized, with a body that may nest
/// further declarations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroDecl {
    pub name: Ident,
    /// The name repeated at the end of the declaration (`end <name>`).
    pub repeat_name: Ident,
    /// Versions this declaration belongs to; empty means every version.
    pub versions: Vec<Ident>,
    pub params: Vec<ParamDecl>,
    pub body: Vec<MacroBodyPart>,
}

impl MacroDecl {
    /// New declaration with a matching end name; front ends that parsed a
    /// differing end name override it with [`MacroDecl::with_repeat_name`].
    pub fn new(name: Ident) -> Self {
        Self {
            repeat_name: name.clone(),
            name,
            versions: Vec::new(),
            params: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_repeat_name(mut self, repeat_name: Ident) -> Self {
        self.repeat_name = repeat_name;
        self
    }

    pub fn with_version(mut self, version: Ident) -> Self {
        self.versions.push(version);
        self
    }

    pub fn with_param(mut self, param: ParamDecl) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_part(mut self, part: MacroBodyPart) -> Self {
        self.body.push(part);
        self
    }
}

/// A text-block declaration: a parametrized body restricted to literal
/// text, parameter substitution, and inserts of other text blocks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlockDecl {
    pub name: Ident,
    /// The name repeated at the end of the declaration.
    pub repeat_name: Ident,
    pub params: Vec<ParamDecl>,
    pub body: Vec<TextBodyPart>,
}

impl TextBlockDecl {
    pub fn new(name: Ident) -> Self {
        Self {
            repeat_name: name.clone(),
            name,
            params: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_repeat_name(mut self, repeat_name: Ident) -> Self {
        self.repeat_name = repeat_name;
        self
    }

    pub fn with_param(mut self, param: ParamDecl) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_part(mut self, part: TextBodyPart) -> Self {
        self.body.push(part);
        self
    }
}

/// One part of a macro body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacroBodyPart {
    Text(TextChunk),
    Eol(SourceSpan),
    Escape(EscapeKind, SourceSpan),
    /// A parameter substitution (`$name$`).
    Var(Ident),
    NestedMacro(MacroDecl),
    NestedTextBlock(TextBlockDecl),
    /// Verbatim inclusion of a text block.
    TextInsert(TextInsert),
    Expand(ExpandDecl),
}

/// One part of a text-block body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextBodyPart {
    Text(TextChunk),
    Eol(SourceSpan),
    Escape(EscapeKind, SourceSpan),
    Var(Ident),
    TextInsert(TextInsert),
}

/// Verbatim inclusion of a text block by name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextInsert {
    pub name: Ident,
}

impl TextInsert {
    pub fn new(name: Ident) -> Self {
        Self { name }
    }
}

/// A parameter declaration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: Ident,
    /// Declared kind; absent means a plain string parameter.
    pub ty: Option<ParamTypeDecl>,
    /// Default/derivation value; its `Var` parts reference sibling or
    /// ancestor parameters.
    pub value: Option<Vec<ValuePart>>,
}

impl ParamDecl {
    pub fn new(name: Ident) -> Self {
        Self {
            name,
            ty: None,
            value: None,
        }
    }

    pub fn string(name: Ident) -> Self {
        Self {
            name,
            ty: Some(ParamTypeDecl::String),
            value: None,
        }
    }

    pub fn templates(name: Ident, members: Vec<Ident>) -> Self {
        Self {
            name,
            ty: Some(ParamTypeDecl::Templates(members)),
            value: None,
        }
    }

    pub fn with_value(mut self, value: Vec<ValuePart>) -> Self {
        self.value = Some(value);
        self
    }
}

/// Declared parameter kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamTypeDecl {
    /// Plain string value.
    String,
    /// The union of macro names that may be substituted for the parameter.
    Templates(Vec<Ident>),
}

/// One part of a parameter's default/derivation value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValuePart {
    Text(TextChunk),
    Var(Ident),
}

/// An explicit `expand` statement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandDecl {
    pub span: SourceSpan,
    /// Macro names to expand; duplicates within the set collapse.
    pub macros: Vec<Ident>,
    pub options: Vec<OptionDecl>,
}

impl ExpandDecl {
    pub fn new(span: SourceSpan) -> Self {
        Self {
            span,
            macros: Vec::new(),
            options: Vec::new(),
        }
    }

    pub fn with_macro(mut self, name: Ident) -> Self {
        self.macros.push(name);
        self
    }

    pub fn with_option(mut self, option: OptionDecl) -> Self {
        self.options.push(option);
        self
    }
}

/// One formatting option on an `expand` statement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDecl {
    pub name: Ident,
    pub value: StaticValue,
}

impl OptionDecl {
    pub fn new(name: Ident, value: StaticValue) -> Self {
        Self { name, value }
    }
}

/// A literal-or-parameter value, as used by expand options.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaticValue {
    Literal(TextChunk),
    Var(Ident),
}
