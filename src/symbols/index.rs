use std::collections::HashMap;

use crate::arena::{Id, Identifiable};
use crate::lexis::{TokenKind, TokenRef};
use crate::source::BufferId;
use crate::syntax::{NodeRef, SyntaxKind, SyntaxTree};

use super::compilation::{Compilation, MAX_INSTANCE_DEPTH};
use super::symbol::{SymbolKind, SymbolRef};

/// Syntax-node/token → symbol maps built by one traversal of an elaborated
/// [`Compilation`].
///
/// Both maps are keyed on `(tree id, ref)` rather than a bare [`NodeRef`]/
/// [`TokenRef`], because those handles are only unique within the one
/// [`SyntaxTree`] that allocated them — a primary tree and a dependency tree
/// can otherwise hand out numerically identical refs for unrelated nodes.
pub struct SymbolIndexer {
    syntax_to_symbol: HashMap<(Id, NodeRef), SymbolRef>,
    token_to_symbol: HashMap<(Id, TokenRef), SymbolRef>,
}

impl SymbolIndexer {
    pub fn build(compilation: &Compilation, trees: &[&SyntaxTree], primary_buffer: BufferId) -> Self {
        let mut tree_map: HashMap<Id, &SyntaxTree> = HashMap::new();
        for tree in trees {
            tree_map.insert(tree.id(), *tree);
        }

        let mut indexer = Self {
            syntax_to_symbol: HashMap::new(),
            token_to_symbol: HashMap::new(),
        };

        indexer.visit(compilation, &tree_map, compilation.root(), primary_buffer, 0);

        // Top instances aren't reachable from `root`'s member list (they sit
        // beside the compilation-unit scope, not inside it); walk them too.
        for &top in compilation.top_instances() {
            indexer.visit(compilation, &tree_map, top, primary_buffer, 0);
        }

        indexer
    }

    pub fn get_symbol(&self, tree: &SyntaxTree, tok: TokenRef) -> Option<SymbolRef> {
        self.token_to_symbol.get(&(tree.id(), tok)).copied()
    }

    pub fn symbol_of_syntax(&self, tree: &SyntaxTree, node: NodeRef) -> Option<SymbolRef> {
        self.syntax_to_symbol.get(&(tree.id(), node)).copied()
    }

    /// Walks `node`'s parent chain; at each ancestor that has an indexed
    /// symbol, returns that symbol if it is itself scope-bearing, else its
    /// scope. `None` once the chain runs out without finding one.
    pub fn scope_for_syntax(&self, compilation: &Compilation, tree: &SyntaxTree, node: NodeRef) -> Option<SymbolRef> {
        let mut cur = node;

        loop {
            let node_data = tree.node(cur)?;
            let parent = node_data.parent();

            if parent.is_nil() {
                break;
            }

            if let Some(sym_ref) = self.symbol_of_syntax(tree, parent) {
                return Some(Self::nearest_scope(compilation, sym_ref));
            }

            cur = parent;
        }

        None
    }

    fn nearest_scope(compilation: &Compilation, sym_ref: SymbolRef) -> SymbolRef {
        match compilation.symbol(sym_ref).map(|s| s.kind) {
            Some(
                SymbolKind::Root
                | SymbolKind::CompilationUnit
                | SymbolKind::Package
                | SymbolKind::Definition
                | SymbolKind::InstanceBody
                | SymbolKind::GenerateBlock,
            ) => sym_ref,
            Some(_) => compilation
                .symbol(sym_ref)
                .and_then(|s| s.scope)
                .unwrap_or_else(|| compilation.root()),
            None => compilation.root(),
        }
    }

    fn visit(&mut self, compilation: &Compilation, tree_map: &HashMap<Id, &SyntaxTree>, sym_ref: SymbolRef, primary_buffer: BufferId, depth: usize) {
        let Some(sym) = compilation.symbol(sym_ref) else { return };
        let kind = sym.kind;
        let definition = sym.definition;
        let syntax = sym.syntax;
        let tree_id = sym.tree_id;

        // A root-level top instance reuses its Definition's own syntax node
        // (there is no real `HierarchicalInstance` backing it); indexing it
        // under the general rule would clobber the Definition's own mapping,
        // so it's skipped here and handled by the Definition's own visit.
        let is_top_synth_instance = kind == SymbolKind::Instance
            && !syntax.is_nil()
            && definition
                .and_then(|d| compilation.symbol(d))
                .map(|d| d.syntax == syntax && d.tree_id == tree_id)
                .unwrap_or(false);

        if !is_top_synth_instance {
            self.index_general(compilation, tree_map, sym_ref, primary_buffer);
        }

        match kind {
            SymbolKind::Instance => {
                self.visit_instance(compilation, tree_map, sym_ref, primary_buffer, depth, is_top_synth_instance);
            }
            SymbolKind::Package => {
                self.visit_package(compilation, tree_map, sym_ref, primary_buffer);
            }
            // Root/CompilationUnit aren't backed by any buffer; everything
            // else (Definition, InstanceBody, Port, Parameter, Value, Type,
            // Subroutine) just recurses into its members.
            _ => {
                self.visit_members(compilation, tree_map, sym_ref, primary_buffer, depth);
            }
        }
    }

    fn index_general(&mut self, compilation: &Compilation, tree_map: &HashMap<Id, &SyntaxTree>, sym_ref: SymbolRef, primary_buffer: BufferId) {
        let Some(sym) = compilation.symbol(sym_ref) else { return };

        if sym.syntax.is_nil() {
            return;
        }

        let Some(tree) = tree_map.get(&sym.tree_id).copied() else { return };

        self.syntax_to_symbol.insert((sym.tree_id, sym.syntax), sym_ref);

        if tree.primary_buffer() == primary_buffer && !sym.name.is_empty() {
            if let Some(tok) = find_first_identifier_token(tree, sym.syntax, &sym.name) {
                self.token_to_symbol.insert((sym.tree_id, tok), sym_ref);
            }
        }
    }

    fn visit_members(&mut self, compilation: &Compilation, tree_map: &HashMap<Id, &SyntaxTree>, sym_ref: SymbolRef, primary_buffer: BufferId, depth: usize) {
        let Some(sym) = compilation.symbol(sym_ref) else { return };
        let members = sym.members.clone();

        for member in members {
            self.visit(compilation, tree_map, member, primary_buffer, depth);
        }
    }

    /// Packages only recurse into their member list when the package body
    /// itself lives in the primary buffer, mirroring the Definition/instance
    /// rule that cross-buffer bodies aren't walked for navigation.
    fn visit_package(&mut self, compilation: &Compilation, tree_map: &HashMap<Id, &SyntaxTree>, sym_ref: SymbolRef, primary_buffer: BufferId) {
        let Some(sym) = compilation.symbol(sym_ref) else { return };
        let Some(tree) = tree_map.get(&sym.tree_id).copied() else { return };

        if tree.primary_buffer() != primary_buffer {
            return;
        }

        self.visit_members(compilation, tree_map, sym_ref, primary_buffer, 0);
    }

    fn visit_instance(
        &mut self,
        compilation: &Compilation,
        tree_map: &HashMap<Id, &SyntaxTree>,
        sym_ref: SymbolRef,
        primary_buffer: BufferId,
        depth: usize,
        is_top: bool,
    ) {
        let Some(sym) = compilation.symbol(sym_ref) else { return };
        let body_ref = sym.body;
        let def_ref = sym.definition;
        let syntax = sym.syntax;
        let tree_id = sym.tree_id;

        if !is_top {
            self.annotate_instance_connections(compilation, tree_map, tree_id, syntax, def_ref, body_ref);
        }

        let Some(body_ref) = body_ref else { return };

        let def_in_primary = def_ref
            .and_then(|d| compilation.symbol(d))
            .and_then(|d| tree_map.get(&d.tree_id).copied())
            .map(|t| t.primary_buffer() == primary_buffer)
            .unwrap_or(false);

        if def_in_primary && depth < MAX_INSTANCE_DEPTH {
            self.visit(compilation, tree_map, body_ref, primary_buffer, depth + 1);
        }
    }

    /// Cross-annotates a real (non-synthesized) instance's connection list:
    /// the surrounding `HierarchyInstantiation`'s module-type token against
    /// the Definition symbol, each named port connection against the
    /// matching port by `body.findPort`, and each named parameter assignment
    /// against the matching parameter by `body.lookupName`.
    fn annotate_instance_connections(
        &mut self,
        compilation: &Compilation,
        tree_map: &HashMap<Id, &SyntaxTree>,
        tree_id: Id,
        syntax: NodeRef,
        def_ref: Option<SymbolRef>,
        body_ref: Option<SymbolRef>,
    ) {
        let Some(tree) = tree_map.get(&tree_id).copied() else { return };
        let Some(node) = tree.node(syntax) else { return };

        if let Some(body_ref) = body_ref {
            let scope = compilation.scope_of(body_ref);

            for child in node.child_nodes() {
                let Some(child_node) = tree.node(child) else { continue };

                if child_node.kind != SyntaxKind::NamedPortConnection {
                    continue;
                }

                let Some(name_tok) = child_node.name_token else { continue };
                let Some(tok) = tree.token(name_tok) else { continue };

                if let Some(port_ref) = scope.find_port(&tok.value) {
                    self.token_to_symbol.insert((tree_id, name_tok), port_ref);
                }
            }
        }

        let parent = node.parent();
        if parent.is_nil() {
            return;
        }

        let Some(parent_node) = tree.node(parent) else { return };

        if parent_node.kind != SyntaxKind::HierarchyInstantiation {
            return;
        }

        if let (Some(def_ref), Some(type_tok)) = (def_ref, parent_node.name_token) {
            self.token_to_symbol.insert((tree_id, type_tok), def_ref);
        }

        if let Some(body_ref) = body_ref {
            let scope = compilation.scope_of(body_ref);

            for child in parent_node.child_nodes() {
                let Some(child_node) = tree.node(child) else { continue };

                if child_node.kind != SyntaxKind::NamedParamAssignment {
                    continue;
                }

                let Some(name_tok) = child_node.name_token else { continue };
                let Some(tok) = tree.token(name_tok) else { continue };

                if let Some(param_ref) = scope.lookup_name(&tok.value) {
                    self.token_to_symbol.insert((tree_id, name_tok), param_ref);
                }
            }
        }
    }
}

/// Depth-first (tokens before child nodes) search for the first `Identifier`
/// token within `node_ref`'s subtree whose value text equals `name`.
fn find_first_identifier_token(tree: &SyntaxTree, node_ref: NodeRef, name: &str) -> Option<TokenRef> {
    let node = tree.node(node_ref)?;

    for tok_ref in node.child_tokens() {
        if let Some(tok) = tree.token(tok_ref) {
            if tok.kind == TokenKind::Identifier && tok.value.as_ref() == name {
                return Some(tok_ref);
            }
        }
    }

    for child in node.child_nodes() {
        if let Some(found) = find_first_identifier_token(tree, child, name) {
            return Some(found);
        }
    }

    None
}
