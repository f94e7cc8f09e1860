//! Scope Model
//!
//! Hierarchical namespace tree. Every template owns exactly one scope;
//! the root scope belongs to the source file. A name lookup that misses
//! in the local map recurses to the parent; a miss at the root is the
//! caller's unknown-reference error.
//!
//! What a scope may host is decided by its kind, not by refusing calls at
//! runtime: the source file hosts templates but no params, macros host
//! both, text blocks host only their own params.

use std::collections::{HashMap, HashSet};

use crate::model::{ParamId, ScopeId, TemplateId};

/// What kind of declaration a scope belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    SourceFile,
    Macro,
    TextBlock,
}

impl ScopeKind {
    pub fn can_host_templates(self) -> bool {
        matches!(self, ScopeKind::SourceFile | ScopeKind::Macro)
    }

    pub fn can_host_params(self) -> bool {
        !matches!(self, ScopeKind::SourceFile)
    }
}

/// One namespace node.
///
/// Macro and text-block names live in separate local maps, as do params;
/// a versioned name maps to its declaration instances in order, the first
/// being the reference version.
#[derive(Clone, Debug)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    /// The template this scope belongs to; `None` for the root.
    pub template: Option<TemplateId>,
    macros: HashMap<String, Vec<TemplateId>>,
    text_blocks: HashMap<String, Vec<TemplateId>>,
    params: HashMap<String, ParamId>,
    referenced_params: Vec<ParamId>,
    referenced_param_set: HashSet<ParamId>,
    referenced_text_blocks: Vec<TemplateId>,
    referenced_text_block_set: HashSet<TemplateId>,
}

impl Scope {
    fn new(id: ScopeId, kind: ScopeKind, parent: Option<ScopeId>, template: Option<TemplateId>) -> Self {
        Self {
            id,
            kind,
            parent,
            template,
            macros: HashMap::new(),
            text_blocks: HashMap::new(),
            params: HashMap::new(),
            referenced_params: Vec::new(),
            referenced_param_set: HashSet::new(),
            referenced_text_blocks: Vec::new(),
            referenced_text_block_set: HashSet::new(),
        }
    }

    pub(crate) fn insert_macro(&mut self, name: &str, template: TemplateId) {
        self.macros.entry(name.to_owned()).or_default().push(template);
    }

    pub(crate) fn insert_text_block(&mut self, name: &str, template: TemplateId) {
        self.text_blocks
            .entry(name.to_owned())
            .or_default()
            .push(template);
    }

    pub(crate) fn insert_param(&mut self, name: &str, param: ParamId) {
        self.params.insert(name.to_owned(), param);
    }

    fn local_macro(&self, name: &str) -> Option<TemplateId> {
        self.macros.get(name).and_then(|ids| ids.first().copied())
    }

    fn local_text_block(&self, name: &str) -> Option<TemplateId> {
        self.text_blocks.get(name).and_then(|ids| ids.first().copied())
    }

    fn local_param(&self, name: &str) -> Option<ParamId> {
        self.params.get(name).copied()
    }

    /// Params referenced from this scope's body, in first-reference order.
    /// Decides which accessor methods the generator must emit.
    pub fn referenced_params(&self) -> &[ParamId] {
        &self.referenced_params
    }

    /// Text blocks referenced from this scope's body, in first-reference
    /// order.
    pub fn referenced_text_blocks(&self) -> &[TemplateId] {
        &self.referenced_text_blocks
    }
}

/// Arena of scopes; index 0 is always the source-file root.
#[derive(Clone, Debug)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl ScopeTree {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(ScopeId(0), ScopeKind::SourceFile, None, None)],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub(crate) fn push(
        &mut self,
        kind: ScopeKind,
        parent: ScopeId,
        template: TemplateId,
    ) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes
            .push(Scope::new(id, kind, Some(parent), Some(template)));
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub(crate) fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    /// Chained macro lookup; for a versioned name the first declaration
    /// (the reference version) wins.
    pub fn lookup_macro(&self, from: ScopeId, name: &str) -> Option<TemplateId> {
        self.chain(from)
            .find_map(|scope| scope.local_macro(name))
    }

    /// Chained text-block lookup.
    pub fn lookup_text_block(&self, from: ScopeId, name: &str) -> Option<TemplateId> {
        self.chain(from)
            .find_map(|scope| scope.local_text_block(name))
    }

    /// Chained param lookup.
    pub fn lookup_param(&self, from: ScopeId, name: &str) -> Option<ParamId> {
        self.chain(from).find_map(|scope| scope.local_param(name))
    }

    /// Is `candidate` the template of `from` or of one of its lexical
    /// ancestors? Decides auto-expand eligibility: only references from
    /// outside a template's own subtree force it to explicit expansion.
    pub fn has_ancestor(&self, from: ScopeId, candidate: TemplateId) -> bool {
        self.chain(from)
            .any(|scope| scope.template == Some(candidate))
    }

    pub(crate) fn add_referenced_param(&mut self, scope: ScopeId, param: ParamId) {
        let scope = self.get_mut(scope);
        if scope.referenced_param_set.insert(param) {
            scope.referenced_params.push(param);
        }
    }

    pub(crate) fn add_referenced_text_block(&mut self, scope: ScopeId, block: TemplateId) {
        let scope = self.get_mut(scope);
        if scope.referenced_text_block_set.insert(block) {
            scope.referenced_text_blocks.push(block);
        }
    }

    fn chain(&self, from: ScopeId) -> impl Iterator<Item = &Scope> + '_ {
        let mut current = Some(from);
        std::iter::from_fn(move || {
            let scope = self.get(current?);
            current = scope.parent;
            Some(scope)
        })
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_recurses_to_parent() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        let outer = tree.push(ScopeKind::Macro, root, TemplateId(0));
        let inner = tree.push(ScopeKind::Macro, outer, TemplateId(1));

        tree.get_mut(outer).insert_param("p", ParamId(0));
        assert_eq!(tree.lookup_param(inner, "p"), Some(ParamId(0)));
        assert_eq!(tree.lookup_param(root, "p"), None);
    }

    #[test]
    fn lookup_miss_at_root_is_none() {
        let tree = ScopeTree::new();
        assert_eq!(tree.lookup_macro(tree.root(), "missing"), None);
    }

    #[test]
    fn local_shadows_parent() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        let outer = tree.push(ScopeKind::Macro, root, TemplateId(0));

        tree.get_mut(root).insert_macro("m", TemplateId(5));
        tree.get_mut(outer).insert_macro("m", TemplateId(7));
        assert_eq!(tree.lookup_macro(outer, "m"), Some(TemplateId(7)));
        assert_eq!(tree.lookup_macro(root, "m"), Some(TemplateId(5)));
    }

    #[test]
    fn ancestor_includes_self() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        let outer = tree.push(ScopeKind::Macro, root, TemplateId(0));
        let inner = tree.push(ScopeKind::Macro, outer, TemplateId(1));

        assert!(tree.has_ancestor(inner, TemplateId(0)));
        assert!(tree.has_ancestor(inner, TemplateId(1)));
        assert!(!tree.has_ancestor(outer, TemplateId(1)));
    }

    #[test]
    fn reference_sets_deduplicate_in_order() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        let scope = tree.push(ScopeKind::Macro, root, TemplateId(0));

        tree.add_referenced_param(scope, ParamId(1));
        tree.add_referenced_param(scope, ParamId(0));
        tree.add_referenced_param(scope, ParamId(1));
        assert_eq!(tree.get(scope).referenced_params(), &[ParamId(1), ParamId(0)]);
    }

    #[test]
    fn capability_by_kind() {
        assert!(ScopeKind::SourceFile.can_host_templates());
        assert!(!ScopeKind::SourceFile.can_host_params());
        assert!(ScopeKind::Macro.can_host_params());
        assert!(!ScopeKind::TextBlock.can_host_templates());
    }
}
