//! Compilation Session
//!
//! Owner of every registry one compilation needs: the scope tree, the
//! template/param/expand arenas, the version registry, the global name
//! table, and the macro-set to expand-signature map with its monotone id
//! counter. A session is created per run and passed by reference into
//! each pass; nothing here is static, so independent compilations can run
//! in one process and tests reset state by dropping the session.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::trace;

use crate::ast::{Ident, MacroDecl, ParamDecl, SourceSpan, TextBlockDecl};
use crate::diagnostics::{InternalError, SemanticError};
use crate::model::{
    Expand, ExpandId, ExpandOptions, ExpandSignature, Param, ParamId, ScopeId, SignatureId,
    Template, TemplateId, TemplateKind, Version, VersionId,
};
use crate::scope::{ScopeKind, ScopeTree};

/// One name in the global template namespace.
///
/// Template names become generated type names, so the namespace is global
/// rather than per-scope; a name may recur only when every pair of its
/// declarations is disjoint in versions.
#[derive(Clone, Debug)]
struct GlobalEntry {
    first: Ident,
    /// Declaration instances in order; the first is the reference version.
    instances: Vec<TemplateId>,
    /// Versions occupied so far; `None` means every version.
    versions: Option<HashSet<VersionId>>,
}

/// All mutable state of one compilation run.
#[derive(Clone, Debug)]
pub struct CompileSession {
    pub scopes: ScopeTree,
    templates: Vec<Template>,
    params: Vec<Param>,
    expands: Vec<Expand>,
    signatures: Vec<ExpandSignature>,
    signature_ids: HashMap<BTreeSet<TemplateId>, SignatureId>,
    versions: Vec<Version>,
    version_ids: HashMap<String, VersionId>,
    global_names: BTreeMap<String, GlobalEntry>,
    /// Templates in declaration (pre-order) order; the ordinal is the
    /// declaration-node identity later passes resolve through.
    decl_templates: Vec<TemplateId>,
}

impl CompileSession {
    pub fn new() -> Self {
        Self {
            scopes: ScopeTree::new(),
            templates: Vec::new(),
            params: Vec::new(),
            expands: Vec::new(),
            signatures: Vec::new(),
            signature_ids: HashMap::new(),
            versions: Vec::new(),
            version_ids: HashMap::new(),
            global_names: BTreeMap::new(),
            decl_templates: Vec::new(),
        }
    }

    // =========================================================================
    // Arena access
    // =========================================================================

    pub fn template(&self, id: TemplateId) -> &Template {
        &self.templates[id.index()]
    }

    pub(crate) fn template_mut(&mut self, id: TemplateId) -> &mut Template {
        &mut self.templates[id.index()]
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn param(&self, id: ParamId) -> &Param {
        &self.params[id.index()]
    }

    pub(crate) fn param_mut(&mut self, id: ParamId) -> &mut Param {
        &mut self.params[id.index()]
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn expand(&self, id: ExpandId) -> &Expand {
        &self.expands[id.index()]
    }

    pub(crate) fn expand_mut(&mut self, id: ExpandId) -> &mut Expand {
        &mut self.expands[id.index()]
    }

    /// Expand statements in declaration order.
    pub fn expands(&self) -> &[Expand] {
        &self.expands
    }

    pub fn signature(&self, id: SignatureId) -> &ExpandSignature {
        &self.signatures[id.index()]
    }

    /// The global signature list, ordered by allocation (and therefore by
    /// generated name).
    pub fn signatures(&self) -> &[ExpandSignature] {
        &self.signatures
    }

    pub fn version(&self, id: VersionId) -> &Version {
        &self.versions[id.index()]
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    // =========================================================================
    // Declaration ordinals
    // =========================================================================

    /// The template created for the `ordinal`-th declaration in pre-order.
    pub fn decl_template(&self, ordinal: usize) -> Result<TemplateId, InternalError> {
        self.decl_templates.get(ordinal).copied().ok_or_else(|| {
            InternalError::new("declaration ordinal out of range; passes walked different trees")
        })
    }

    pub fn decl_count(&self) -> usize {
        self.decl_templates.len()
    }

    /// The expand statement created for the `ordinal`-th `expand` in
    /// declaration order.
    pub fn decl_expand(&self, ordinal: usize) -> Result<ExpandId, InternalError> {
        if ordinal < self.expands.len() {
            Ok(ExpandId(ordinal as u32))
        } else {
            Err(InternalError::new(
                "expand ordinal out of range; the resolver did not visit this statement",
            ))
        }
    }

    // =========================================================================
    // Declaration
    // =========================================================================

    /// Register a version on first mention.
    pub fn declare_version(&mut self, name: &Ident) -> VersionId {
        if let Some(&id) = self.version_ids.get(&name.text) {
            return id;
        }
        let id = VersionId(self.versions.len() as u32);
        self.versions.push(Version {
            id,
            name: name.clone(),
        });
        self.version_ids.insert(name.text.clone(), id);
        trace!(version = %name.text, "registered version");
        id
    }

    /// Declare a macro in `parent`, creating its template and scope.
    pub fn declare_macro(
        &mut self,
        parent: ScopeId,
        decl: &MacroDecl,
    ) -> Result<TemplateId, SemanticError> {
        let versions = self.collect_versions(decl)?;
        self.register_global_name(&decl.name, &versions)?;

        let id = TemplateId(self.templates.len() as u32);
        let scope = self.scopes.push(ScopeKind::Macro, parent, id);
        let top_level = parent == self.scopes.root();
        self.templates.push(Template::new(
            id,
            TemplateKind::Macro,
            decl.name.clone(),
            scope,
            parent,
            top_level,
            versions,
        ));
        self.scopes.get_mut(parent).insert_macro(&decl.name.text, id);
        self.decl_templates.push(id);
        trace!(macro_name = %decl.name.text, top_level, "declared macro");
        Ok(id)
    }

    /// Declare a text block in `parent`, creating its template and scope.
    pub fn declare_text_block(
        &mut self,
        parent: ScopeId,
        decl: &TextBlockDecl,
    ) -> Result<TemplateId, SemanticError> {
        self.register_global_name(&decl.name, &[])?;

        let id = TemplateId(self.templates.len() as u32);
        let scope = self.scopes.push(ScopeKind::TextBlock, parent, id);
        let top_level = parent == self.scopes.root();
        self.templates.push(Template::new(
            id,
            TemplateKind::TextBlock,
            decl.name.clone(),
            scope,
            parent,
            top_level,
            Vec::new(),
        ));
        self.scopes
            .get_mut(parent)
            .insert_text_block(&decl.name.text, id);
        self.decl_templates.push(id);
        trace!(text_block = %decl.name.text, top_level, "declared text block");
        Ok(id)
    }

    /// Declare a parameter of `owner`. Duplicate detection searches the
    /// whole scope chain: a parameter may not shadow an ancestor's.
    pub fn declare_param(
        &mut self,
        owner: TemplateId,
        decl: &ParamDecl,
    ) -> Result<ParamId, SemanticError> {
        let scope = self.template(owner).scope;
        if let Some(first) = self.scopes.lookup_param(scope, &decl.name.text) {
            let first = self.param(first).name.clone();
            return Err(SemanticError::duplicate_declaration(&decl.name, &first));
        }

        let id = ParamId(self.params.len() as u32);
        self.params.push(Param::new(id, decl.name.clone(), owner));
        self.scopes.get_mut(scope).insert_param(&decl.name.text, id);
        self.template_mut(owner).params.push(id);
        Ok(id)
    }

    fn collect_versions(&mut self, decl: &MacroDecl) -> Result<Vec<VersionId>, SemanticError> {
        let mut seen = HashSet::new();
        let mut versions = Vec::with_capacity(decl.versions.len());
        for version in &decl.versions {
            if !seen.insert(version.text.as_str()) {
                return Err(SemanticError::duplicate_version_member(version, &decl.name));
            }
            versions.push(self.declare_version(version));
        }
        Ok(versions)
    }

    fn register_global_name(
        &mut self,
        name: &Ident,
        versions: &[VersionId],
    ) -> Result<(), SemanticError> {
        let occupied: Option<HashSet<VersionId>> = if versions.is_empty() {
            None
        } else {
            Some(versions.iter().copied().collect())
        };

        // the next template id, known before the arena push
        let instance = TemplateId(self.templates.len() as u32);

        match self.global_names.entry(name.text.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(GlobalEntry {
                    first: name.clone(),
                    instances: vec![instance],
                    versions: occupied,
                });
                Ok(())
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                let disjoint = match (&entry.versions, &occupied) {
                    (Some(have), Some(add)) => have.is_disjoint(add),
                    // an all-versions declaration overlaps everything
                    _ => false,
                };
                if !disjoint {
                    return Err(SemanticError::duplicate_declaration(name, &entry.first));
                }
                if let (Some(have), Some(add)) = (&mut entry.versions, &occupied) {
                    have.extend(add.iter().copied());
                }
                entry.instances.push(instance);
                Ok(())
            }
        }
    }

    // =========================================================================
    // Global lookups
    // =========================================================================

    /// Resolve a macro name in the global namespace, ignoring scope
    /// nesting. Used for parameter template-set types, which may name any
    /// macro in the program.
    pub fn lookup_global_macro(&self, name: &str) -> Option<TemplateId> {
        self.global_names.get(name).and_then(|entry| {
            entry
                .instances
                .iter()
                .copied()
                .find(|&id| self.template(id).kind == TemplateKind::Macro)
        })
    }

    /// Names declared more than once (under different versions), with
    /// their instances in declaration order. Deterministically ordered by
    /// name.
    pub fn versioned_names(&self) -> impl Iterator<Item = (&str, &[TemplateId])> + '_ {
        self.global_names
            .iter()
            .filter(|(_, entry)| entry.instances.len() > 1)
            .map(|(name, entry)| (name.as_str(), entry.instances.as_slice()))
    }

    // =========================================================================
    // Expand statements and signatures
    // =========================================================================

    pub(crate) fn add_expand(
        &mut self,
        owner: TemplateId,
        span: SourceSpan,
        members: Vec<TemplateId>,
        options: ExpandOptions,
    ) -> ExpandId {
        let id = ExpandId(self.expands.len() as u32);
        self.expands
            .push(Expand::new(id, owner, span, members, options));
        id
    }

    /// Canonical signature for a template set. Two sites naming the same
    /// set, in any order, receive the same id; a new set allocates the
    /// next sequential one.
    pub fn intern_signature(&mut self, members: Vec<TemplateId>) -> SignatureId {
        let key: BTreeSet<TemplateId> = members.iter().copied().collect();
        if let Some(&id) = self.signature_ids.get(&key) {
            return id;
        }
        let id = SignatureId(self.signatures.len() as u32);
        trace!(signature = id.0, size = members.len(), "new expand signature");
        self.signatures.push(ExpandSignature::new(id, members));
        self.signature_ids.insert(key, id);
        id
    }
}

impl Default for CompileSession {
    fn default() -> Self {
        Self::new()
    }
}
