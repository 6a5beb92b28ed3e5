use std::collections::HashMap;

use crate::arena::Repo;
use crate::source::BufferId;

use super::symbol::{Scope, Symbol, SymbolKind, SymbolRef};

/// Elaboration flags configured once per [`ShallowAnalysis`](crate::analysis::ShallowAnalysis)
/// construction (§4.4.1 step 3).
#[derive(Clone, Copy, Debug, Default)]
pub struct CompilationOptions {
    pub allow_top_level_interface_ports: bool,
    pub untaken_generate_checks: bool,
    pub allow_invalid_top: bool,
    pub top_modules_cleared: bool,
}

/// The root-scope output of elaborating a primary [`SyntaxTree`](crate::syntax::SyntaxTree)
/// plus its dependency trees.
///
/// Owns every [`Symbol`] produced; all handles into it are [`SymbolRef`]s,
/// same pattern as [`crate::syntax::SyntaxTree`] owning nodes keyed by
/// [`crate::syntax::NodeRef`]. "Shallow" here means this never attempts full
/// hierarchical elaboration with a fixed top: every definition not
/// instantiated by another definition in the elaborated set is surfaced as a
/// top instance (§4.4.1's *top modules cleared* flag), and instance
/// recursion is capped at [`MAX_INSTANCE_DEPTH`].
pub struct Compilation {
    pub(super) symbols: Repo<Symbol>,
    pub(super) root: SymbolRef,
    pub(super) compilation_unit: SymbolRef,
    pub(super) packages: HashMap<String, SymbolRef>,
    pub(super) definitions: HashMap<String, SymbolRef>,
    pub(super) top_instances: Vec<SymbolRef>,
    pub(super) options: CompilationOptions,
    pub(super) primary_buffer: BufferId,
}

/// Instance-recursion depth cap shared by elaboration and the symbol indexer
/// (§9 "Cyclic/deep structures").
pub const MAX_INSTANCE_DEPTH: usize = 8;

impl Compilation {
    pub fn root(&self) -> SymbolRef {
        self.root
    }

    pub fn compilation_unit(&self) -> SymbolRef {
        self.compilation_unit
    }

    pub fn top_instances(&self) -> &[SymbolRef] {
        &self.top_instances
    }

    pub fn options(&self) -> CompilationOptions {
        self.options
    }

    pub fn symbol(&self, r: SymbolRef) -> Option<&Symbol> {
        self.symbols.get(&r.0)
    }

    pub fn scope_of(&self, owner: SymbolRef) -> Scope<'_> {
        Scope::new(&self.symbols, owner)
    }

    pub fn get_packages(&self) -> impl Iterator<Item = SymbolRef> + '_ {
        self.packages.values().copied()
    }

    pub fn get_package(&self, name: &str) -> Option<SymbolRef> {
        self.packages.get(name).copied()
    }

    /// `tryGetDefinition(name, scope)`: the distilled spec's scope parameter
    /// only matters for nested/scoped definition lookup, which this crate's
    /// shallow model does not support — definitions live in one flat,
    /// compilation-wide table (§4.4.2 step 7's fallback is exercised purely
    /// by name).
    pub fn try_get_definition(&self, name: &str, _scope: Option<SymbolRef>) -> Option<SymbolRef> {
        self.definitions.get(name).copied()
    }

    pub fn definition_symbol_kind(&self, r: SymbolRef) -> Option<SymbolKind> {
        self.symbols.get(&r.0).map(|s| s.kind)
    }
}
