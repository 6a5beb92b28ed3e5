use std::collections::HashMap;

use crate::arena::{Id, Identifiable, Repo};
use crate::source::SourceLocation;
use crate::syntax::NodeRef;

/// A weak reference to a [`Symbol`] owned by a [`Compilation`](super::compilation::Compilation).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SymbolRef(pub(crate) crate::arena::Entry);

impl SymbolRef {
    pub const fn nil() -> Self {
        Self(crate::arena::Entry::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

/// The closed set of semantic entity kinds a shallow elaboration can produce.
///
/// Mirrors §3's symbol taxonomy; a full elaborator's class hierarchy
/// (`Definition < Symbol`, `Instance < Symbol`, ...) collapses to one enum
/// dispatched by `match`, same as [`crate::syntax::SyntaxKind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Root,
    CompilationUnit,
    Definition,
    Instance,
    InstanceBody,
    InstanceArray,
    Port,
    Parameter,
    Value,
    Package,
    Type,
    TypeAlias,
    GenerateBlock,
    EnumValue,
    Subroutine,
}

/// One semantic entity produced by elaboration.
///
/// Fields not meaningful for a given `kind` are left at their default (empty
/// name, nil refs) rather than modeled as a per-kind struct — this mirrors the
/// base `Symbol` class's shared field set in the teacher's source material,
/// where kind-specific data lives behind a few optional slots instead of a
/// fresh type per kind.
pub struct Symbol {
    id: Id,
    pub kind: SymbolKind,
    pub name: String,
    pub declaration: SourceLocation,
    pub syntax: NodeRef,
    /// Identity of the [`SyntaxTree`](crate::syntax::SyntaxTree) `syntax` was
    /// allocated from. `NodeRef`/`TokenRef` handles are only unique within
    /// one tree's arenas, so any map keyed on them across multiple trees
    /// (primary plus dependencies) must key on `(tree_id, ref)`, not `ref`
    /// alone — two different trees can hand out numerically equal refs for
    /// unrelated nodes.
    pub tree_id: Id,
    pub scope: Option<SymbolRef>,
    pub members: Vec<SymbolRef>,
    /// For a `Port`: the symbol on the inside of the module boundary that the
    /// port's name aliases, if resolvable (§4.4.2 step 5).
    pub internal_symbol: Option<SymbolRef>,
    /// For an `Instance`/`InstanceArray`: the `Definition` symbol this
    /// instance was instantiated from.
    pub definition: Option<SymbolRef>,
    /// For an `Instance`: the `InstanceBody` carrying its elaborated ports,
    /// parameters, and members.
    pub body: Option<SymbolRef>,
    /// For a `TypeAlias`: the symbol it stands in for once resolved.
    pub aliased: Option<SymbolRef>,
    /// Human-readable type text, used for hover and inlay-hint rendering of
    /// ports and parameters.
    pub type_text: String,
    /// For a `Subroutine`: formal argument names in declaration order.
    pub argument_names: Vec<String>,
    /// For a `Definition`/`InstanceBody` reached via a named interface port
    /// header: the modport name, if any.
    pub modport: Option<String>,
}

impl Identifiable for Symbol {
    fn id(&self) -> Id {
        self.id
    }
}

impl Symbol {
    pub fn new(kind: SymbolKind, name: impl Into<String>, declaration: SourceLocation, syntax: NodeRef) -> Self {
        Self {
            id: Id::new(),
            kind,
            name: name.into(),
            declaration,
            syntax,
            tree_id: Id::nil(),
            scope: None,
            members: Vec::new(),
            internal_symbol: None,
            definition: None,
            body: None,
            aliased: None,
            type_text: String::new(),
            argument_names: Vec::new(),
            modport: None,
        }
    }

    pub fn with_tree(mut self, tree_id: Id) -> Self {
        self.tree_id = tree_id;
        self
    }
}

/// A read-only view over one symbol's member table, addressable by name.
///
/// Every scope-bearing [`SymbolKind`] (Root, CompilationUnit, Package,
/// Definition, InstanceBody, GenerateBlock) backs one of these; non-scope
/// kinds simply have no corresponding `Scope`.
pub struct Scope<'a> {
    symbols: &'a Repo<Symbol>,
    owner: SymbolRef,
}

impl<'a> Scope<'a> {
    pub fn new(symbols: &'a Repo<Symbol>, owner: SymbolRef) -> Self {
        Self { symbols, owner }
    }

    pub fn owner(&self) -> SymbolRef {
        self.owner
    }

    pub fn find(&self, name: &str) -> Option<SymbolRef> {
        let owner = self.symbols.get(&self.owner.0)?;

        owner
            .members
            .iter()
            .find(|member| self.symbols.get(&member.0).map(|s| s.name == name).unwrap_or(false))
            .copied()
    }

    /// Like `find`, but also finds ports, which share the same member list in
    /// this model (an `InstanceBody`'s `findPort` in the distilled spec).
    pub fn find_port(&self, name: &str) -> Option<SymbolRef> {
        let owner = self.symbols.get(&self.owner.0)?;

        owner
            .members
            .iter()
            .find(|member| {
                self.symbols
                    .get(&member.0)
                    .map(|s| s.kind == SymbolKind::Port && s.name == name)
                    .unwrap_or(false)
            })
            .copied()
    }

    /// `lookupName` in the distilled spec: `find` restricted to non-port
    /// members (parameters, values, types), used for named parameter
    /// assignments.
    pub fn lookup_name(&self, name: &str) -> Option<SymbolRef> {
        let owner = self.symbols.get(&self.owner.0)?;

        owner
            .members
            .iter()
            .find(|member| {
                self.symbols
                    .get(&member.0)
                    .map(|s| s.kind != SymbolKind::Port && s.name == name)
                    .unwrap_or(false)
            })
            .copied()
    }
}

/// Macro-name → `DefineDirective` node map, built once per primary tree in
/// `ShallowAnalysis::new` (§4.4.1 step 2).
pub type MacroTable = HashMap<String, NodeRef>;
