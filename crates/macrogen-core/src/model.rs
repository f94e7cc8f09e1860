//! Semantic Model
//!
//! Arena-allocated entities produced by the verification passes and
//! consumed by the code generator. Entities are addressed by index ids;
//! reference relations live in side tables on the owning entity rather
//! than as shared pointers, so the ownership graph stays acyclic.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::ast::{Ident, SourceSpan};
use crate::diagnostics::SemanticError;

// =============================================================================
// IDS
// =============================================================================

/// Index of a [`Template`] in the session arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateId(pub(crate) u32);

/// Index of a [`Param`] in the session arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParamId(pub(crate) u32);

/// Index of a scope in the scope tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeId(pub(crate) u32);

/// Index of an [`ExpandSignature`] in the session registry; doubles as the
/// monotone `n` in the generated `expand_<n>` name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignatureId(pub(crate) u32);

/// Index of an [`Expand`] statement in the session arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpandId(pub(crate) u32);

/// Index of a declared version in the session registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionId(pub(crate) u32);

impl TemplateId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ParamId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl SignatureId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ExpandId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl VersionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// =============================================================================
// TEMPLATES
// =============================================================================

/// What a template declaration is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateKind {
    Macro,
    TextBlock,
}

/// A named, parametrized unit of generated text. Unifies macros and text
/// blocks; `kind` records which one the declaration was.
#[derive(Clone, Debug)]
pub struct Template {
    pub id: TemplateId,
    pub kind: TemplateKind,
    pub name: Ident,
    /// The scope this template opens for its own params and nested
    /// declarations.
    pub scope: ScopeId,
    /// The scope the template is declared in.
    pub parent_scope: ScopeId,
    /// True iff the parent scope is the source-file root.
    pub top_level: bool,
    /// Ordered parameter list.
    pub params: Vec<ParamId>,
    /// Versions this declaration belongs to; empty means every version.
    pub versions: Vec<VersionId>,
    auto_expand: bool,
    used: bool,
    signatures: Vec<SignatureId>,
    signature_set: HashSet<SignatureId>,
    referenced_templates: Vec<TemplateId>,
    referenced_template_set: HashSet<TemplateId>,
    template_signatures: HashMap<TemplateId, Vec<SignatureId>>,
}

impl Template {
    pub(crate) fn new(
        id: TemplateId,
        kind: TemplateKind,
        name: Ident,
        scope: ScopeId,
        parent_scope: ScopeId,
        top_level: bool,
        versions: Vec<VersionId>,
    ) -> Self {
        Self {
            id,
            kind,
            name,
            scope,
            parent_scope,
            top_level,
            params: Vec::new(),
            versions,
            auto_expand: true,
            used: false,
            signatures: Vec::new(),
            signature_set: HashSet::new(),
            referenced_templates: Vec::new(),
            referenced_template_set: HashSet::new(),
            template_signatures: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name.text
    }

    /// Generated type name for the target language.
    pub fn camel_case_name(&self) -> String {
        to_camel_case(&self.name.text)
    }

    pub fn is_auto_expand(&self) -> bool {
        self.auto_expand
    }

    /// One-way transition: once a template requires an explicit expand it
    /// never becomes implicit again.
    pub(crate) fn unset_auto_expand(&mut self) {
        self.auto_expand = false;
    }

    pub fn is_used(&self) -> bool {
        self.used
    }

    pub(crate) fn mark_used(&mut self) {
        self.used = true;
    }

    /// Record that this template's body triggers `signature`, updating the
    /// referenced-template set and the per-template signature table the
    /// generator wires creator code from.
    pub(crate) fn add_signature(&mut self, signature: SignatureId, members: &[TemplateId]) {
        if !self.signature_set.insert(signature) {
            return;
        }
        self.signatures.push(signature);
        for &member in members {
            if self.referenced_template_set.insert(member) {
                self.referenced_templates.push(member);
            }
            self.template_signatures
                .entry(member)
                .or_default()
                .push(signature);
        }
    }

    /// Signatures triggered from this template's body, in first-sight order.
    pub fn signatures(&self) -> &[SignatureId] {
        &self.signatures
    }

    /// Templates this one can create/expand, in first-sight order.
    pub fn referenced_templates(&self) -> &[TemplateId] {
        &self.referenced_templates
    }

    /// The signatures relating this template to one it expands.
    pub fn signatures_for(&self, referenced: TemplateId) -> &[SignatureId] {
        self.template_signatures
            .get(&referenced)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

// =============================================================================
// PARAMS
// =============================================================================

/// Inferred parameter kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamKind {
    /// Plain string value. The kind of every parameter until a template
    /// set is observed for it.
    StringValue,
    /// The union of templates that may be substituted for the parameter,
    /// in declaration order.
    TemplateSet(Vec<TemplateId>),
}

impl ParamKind {
    pub fn is_string(&self) -> bool {
        matches!(self, ParamKind::StringValue)
    }
}

/// A parameter owned by exactly one template.
#[derive(Clone, Debug)]
pub struct Param {
    pub id: ParamId,
    pub name: Ident,
    pub owner: TemplateId,
    pub kind: ParamKind,
    used: bool,
    /// Direct param-to-param references from the default value, with the
    /// span of each referencing use, in declaration order.
    param_refs: Vec<(ParamId, SourceSpan)>,
}

impl Param {
    pub(crate) fn new(id: ParamId, name: Ident, owner: TemplateId) -> Self {
        Self {
            id,
            name,
            owner,
            kind: ParamKind::StringValue,
            used: false,
            param_refs: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name.text
    }

    pub fn is_used(&self) -> bool {
        self.used
    }

    pub(crate) fn mark_used(&mut self) {
        self.used = true;
    }

    pub(crate) fn add_param_ref(&mut self, target: ParamId, span: SourceSpan) {
        self.param_refs.push((target, span));
    }

    pub fn param_refs(&self) -> &[(ParamId, SourceSpan)] {
        &self.param_refs
    }
}

// =============================================================================
// EXPAND SIGNATURES
// =============================================================================

/// The deduplicated identity of "expanding exactly this set of templates".
///
/// Equality is defined over set membership: every expand site naming the
/// same template set, in any order, anywhere in the program, shares one
/// signature instance.
#[derive(Clone, Debug)]
pub struct ExpandSignature {
    pub id: SignatureId,
    /// Member templates in first-sight order; the set, not this order, is
    /// the signature's identity.
    members: Vec<TemplateId>,
    member_set: BTreeSet<TemplateId>,
}

impl ExpandSignature {
    pub(crate) fn new(id: SignatureId, members: Vec<TemplateId>) -> Self {
        let member_set = members.iter().copied().collect();
        Self {
            id,
            members,
            member_set,
        }
    }

    /// Globally unique generated name.
    pub fn name(&self) -> String {
        format!("expand_{}", self.id.0)
    }

    pub fn members(&self) -> &[TemplateId] {
        &self.members
    }

    pub fn member_set(&self) -> &BTreeSet<TemplateId> {
        &self.member_set
    }

    pub fn contains(&self, template: TemplateId) -> bool {
        self.member_set.contains(&template)
    }
}

// =============================================================================
// EXPAND STATEMENTS
// =============================================================================

/// A resolved literal-or-parameter value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OptionValue {
    Literal(String, SourceSpan),
    Param(ParamId, SourceSpan),
}

/// Formatting options of one `expand` statement; each may appear at most
/// once.
#[derive(Clone, Debug, Default)]
pub struct ExpandOptions {
    pub none: Option<OptionValue>,
    pub separator: Option<OptionValue>,
    pub before_first: Option<OptionValue>,
    pub after_last: Option<OptionValue>,
    spans: HashMap<&'static str, SourceSpan>,
}

impl ExpandOptions {
    pub(crate) fn set(&mut self, name: &Ident, value: OptionValue) -> Result<(), SemanticError> {
        let key: &'static str = match name.text.as_str() {
            "none" => "none",
            "separator" => "separator",
            "before_first" => "before_first",
            "after_last" => "after_last",
            _ => return Err(SemanticError::unknown_option(name)),
        };

        if let Some(&first) = self.spans.get(key) {
            return Err(SemanticError::duplicate_option(name, &Ident::new(key, first)));
        }
        self.spans.insert(key, name.span);

        let slot = match key {
            "none" => &mut self.none,
            "separator" => &mut self.separator,
            "before_first" => &mut self.before_first,
            _ => &mut self.after_last,
        };
        *slot = Some(value);
        Ok(())
    }
}

/// One explicit `expand` statement, resolved.
#[derive(Clone, Debug)]
pub struct Expand {
    pub id: ExpandId,
    /// The macro whose body contains the statement.
    pub owner: TemplateId,
    pub span: SourceSpan,
    /// Referenced templates, deduplicated, in encounter order.
    pub members: Vec<TemplateId>,
    pub options: ExpandOptions,
    /// Filled by the signature pass.
    pub(crate) signature: Option<SignatureId>,
}

impl Expand {
    pub(crate) fn new(
        id: ExpandId,
        owner: TemplateId,
        span: SourceSpan,
        members: Vec<TemplateId>,
        options: ExpandOptions,
    ) -> Self {
        Self {
            id,
            owner,
            span,
            members,
            options,
            signature: None,
        }
    }

    /// The signature this statement resolved to. Only valid after the
    /// signature pass has run.
    pub fn signature(&self) -> Option<SignatureId> {
        self.signature
    }
}

// =============================================================================
// VERSIONS
// =============================================================================

/// A declared version name.
#[derive(Clone, Debug)]
pub struct Version {
    pub id: VersionId,
    pub name: Ident,
}

/// Derive the generated camel-case type name from a declared identifier.
///
/// Splits on underscores and capitalizes each fragment, the way generated
/// target-language type names are formed.
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for fragment in name.split('_') {
        let mut chars = fragment.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}
