use tracing::{debug, instrument, warn};

use crate::arena::Identifiable;
use crate::lexis::{TokenKind, TokenRef};
use crate::source::{BufferId, RetainGuard, SourceLocation, SourceManager};
use crate::symbols::{self, Compilation, CompilationOptions, MacroTable, Symbol, SymbolIndexer, SymbolKind, SymbolRef, MAX_INSTANCE_DEPTH};
use crate::syntax::{parse_name_expression, Child, NodeRef, SyntaxIndexer, SyntaxKind, SyntaxNode, SyntaxTree};

/// Plain in-memory configuration for one [`ShallowAnalysis`], supplied by the
/// host rather than read from a config file (§2.1's "Configuration" note —
/// file/workspace config loading is the host LSP layer's job).
#[derive(Clone, Copy, Debug, Default)]
pub struct AnalysisOptions {
    pub compilation: CompilationOptions,
}

/// Per-document façade over a primary [`SyntaxTree`] and its dependency
/// trees: owns the elaborated [`Compilation`], the [`SyntaxIndexer`], the
/// [`SymbolIndexer`], and a macro-name table, and answers every symbol-at-
/// location query a document needs.
///
/// Tied to one `(tree, deps)` snapshot: once any buffer it references goes
/// stale ([`has_valid_buffers`](Self::has_valid_buffers) turns false), the
/// owning [`crate::document::Document`] discards this and rebuilds.
pub struct ShallowAnalysis {
    primary_buffer: BufferId,
    syntax_index: SyntaxIndexer,
    compilation: Compilation,
    symbol_index: SymbolIndexer,
    macros: MacroTable,
    _retain: RetainGuard,
}

impl ShallowAnalysis {
    #[instrument(skip_all, fields(buffer = ?primary.primary_buffer()))]
    pub fn new(source_manager: &SourceManager, primary: &SyntaxTree, deps: &[&SyntaxTree], options: AnalysisOptions) -> Self {
        let primary_buffer = primary.primary_buffer();
        let syntax_index = SyntaxIndexer::build(primary);
        let macros = build_macro_table(primary);

        let compilation = symbols::elaborate(primary, deps, primary_buffer, options.compilation);

        let all_trees: Vec<&SyntaxTree> = std::iter::once(primary).chain(deps.iter().copied()).collect();
        let symbol_index = SymbolIndexer::build(&compilation, &all_trees, primary_buffer);

        let mut reachable_buffers: Vec<BufferId> = Vec::new();
        for tree in &all_trees {
            reachable_buffers.extend(tree.source_buffer_ids().iter().copied());
        }
        let retain = source_manager.retain_buffers(reachable_buffers);

        Self {
            primary_buffer,
            syntax_index,
            compilation,
            symbol_index,
            macros,
            _retain: retain,
        }
    }

    pub fn primary_buffer(&self) -> BufferId {
        self.primary_buffer
    }

    pub fn compilation(&self) -> &Compilation {
        &self.compilation
    }

    pub fn syntax_index(&self) -> &SyntaxIndexer {
        &self.syntax_index
    }

    pub fn symbol_index(&self) -> &SymbolIndexer {
        &self.symbol_index
    }

    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    /// §4.4.3 `getSymbolAt`: word token at `loc`, then [`get_symbol_at_token`](Self::get_symbol_at_token).
    pub fn get_symbol_at(&self, tree: &SyntaxTree, loc: SourceLocation) -> Option<SymbolRef> {
        let tok = self.syntax_index.get_word_token_at(tree, loc)?;
        self.get_symbol_at_token(tree, tok)
    }

    /// §4.4.3 `getScopeAt`: syntax at `loc`, then [`scope_for_syntax`](crate::symbols::SymbolIndexer::scope_for_syntax).
    pub fn get_scope_at(&self, tree: &SyntaxTree, loc: SourceLocation) -> Option<SymbolRef> {
        let syntax = self.syntax_index.get_syntax_at(tree, loc)?;
        self.symbol_index
            .scope_for_syntax(&self.compilation, tree, syntax)
            .or(Some(self.compilation.root()))
    }

    /// §4.4.2, the central lookup: resolves a token to the semantic symbol it
    /// names, declares, or connects to.
    #[instrument(skip_all)]
    pub fn get_symbol_at_token(&self, tree: &SyntaxTree, tok: TokenRef) -> Option<SymbolRef> {
        let syntax = self.syntax_index.token_to_parent(tok)?;
        let node = tree.node(syntax)?;

        if node.kind.blocks_lookup() {
            return None;
        }

        // The enclosing scope for a bare-name lookup in step 6 is read off
        // `tok`'s real position in `tree`, before any macro-argument reparse
        // below substitutes a throwaway tree that has no ancestry back to a
        // declared symbol.
        let base_scope = self
            .symbol_index
            .scope_for_syntax(&self.compilation, tree, syntax)
            .unwrap_or_else(|| self.compilation.root());

        // Step 3: a macro actual argument is parsed once as an opaque
        // balanced token list when the surrounding `` `M(...) `` is parsed,
        // because the macro's formal parameters (and therefore how the
        // argument should be parsed) aren't known at that point. Reparse its
        // original tokens in isolation here, now that we're resolving one
        // specific token inside it, and continue resolution against the
        // reparsed syntax instead.
        let reparsed_tree;
        let (tree, tok, syntax, node): (&SyntaxTree, TokenRef, NodeRef, &SyntaxNode) =
            if is_macro_argument_list(tree, syntax) {
                match reparse_macro_argument(tree, syntax, tok) {
                    Some((new_tree, new_syntax, new_tok)) => {
                        reparsed_tree = new_tree;
                        let new_node = reparsed_tree.node(new_syntax)?;
                        (&reparsed_tree, new_tok, new_syntax, new_node)
                    }
                    None => (tree, tok, syntax, node),
                }
            } else {
                (tree, tok, syntax, node)
            };

        // Step 4: package import/export directives resolve against the
        // imported package rather than any elaborated symbol in this buffer.
        if let Some(result) = self.resolve_package_import(tree, syntax, tok) {
            return Some(result);
        }

        // Step 5: an indexed symbol (declaration site, or a cross-annotated
        // connection name) takes priority and is normalized.
        if let Some(symbol) = self.symbol_index.get_symbol(tree, tok) {
            return Some(self.normalize_symbol(symbol));
        }

        // Step 6: scope resolution by name lookup. `syntax` may be the
        // reference itself (`IdentifierName`/`ScopedName`) or one link in a
        // selector chain (`MemberSelector`/`IndexSelector`); either way, climb
        // to the chain's outermost node before resolving so the walk starts
        // from the base name and applies each selector in turn.
        if is_name_chain_kind(node.kind) {
            if let Some(enclosing) = find_enclosing_name(tree, syntax) {
                if let Some(found) = self.resolve_name_syntax(tree, enclosing, base_scope) {
                    return Some(self.normalize_symbol(found));
                }
            }
        }

        // Step 7: fallbacks, only for plain identifier tokens (AttributeSpec
        // is already excluded by `blocks_lookup` above).
        if tree.token(tok).map(|t| t.kind) != Some(TokenKind::Identifier) {
            return None;
        }

        if node.kind == SyntaxKind::DotMemberClause {
            if let Some(result) = self.resolve_dot_member_clause(tree, node, tok) {
                return Some(result);
            }
        }

        let Some(name) = tree.token(tok).map(|t| t.value.to_string()) else { return None };

        if let Some(def_ref) = self.compilation.try_get_definition(&name, None) {
            return Some(def_ref);
        }

        if let Some(pkg_ref) = self.compilation.get_package(&name) {
            return Some(pkg_ref);
        }

        debug!(name, "getSymbolAtToken: no definition or package matched identifier");
        None
    }

    /// Resolves one `IdentifierName`/`ScopedName`/`MemberSelector`/
    /// `IndexSelector` node: the base name against `base_scope` (or, for a
    /// `ScopedName`, against the named package), then each selector in order
    /// against the symbol the previous step found.
    ///
    /// `IndexSelector` has no array-element-type model to follow here (this
    /// elaborator carries no type system at all, per the parameter-type
    /// simplification already noted in `DESIGN.md`), so it passes its base
    /// symbol through unchanged rather than descending into an element type.
    fn resolve_name_syntax(&self, tree: &SyntaxTree, node_ref: NodeRef, base_scope: SymbolRef) -> Option<SymbolRef> {
        let node = tree.node(node_ref)?;

        match node.kind {
            SyntaxKind::IdentifierName => {
                let name_tok = node.name_token?;
                let name = tree.token(name_tok)?.value.to_string();
                self.compilation.scope_of(base_scope).find(&name)
            }

            SyntaxKind::ScopedName => {
                let pkg_tok = match node.children.first() {
                    Some(Child::Token(t)) => *t,
                    _ => return None,
                };
                let pkg_name = tree.token(pkg_tok)?.value.to_string();
                let package = self.compilation.get_package(&pkg_name)?;

                let item_tok = node.name_token?;
                if item_tok == pkg_tok {
                    return Some(package);
                }

                let item_name = tree.token(item_tok)?.value.to_string();
                self.compilation.scope_of(package).find(&item_name)
            }

            SyntaxKind::MemberSelector => {
                let base_ref = node.child_nodes().next()?;
                let base = self.resolve_name_syntax(tree, base_ref, base_scope)?;

                let member_tok = node.name_token?;
                let member_name = tree.token(member_tok)?.value.to_string();
                self.compilation.scope_of(base).find(&member_name)
            }

            SyntaxKind::IndexSelector => {
                let base_ref = node.child_nodes().next()?;
                self.resolve_name_syntax(tree, base_ref, base_scope)
            }

            _ => None,
        }
    }

    /// §4.4.2 step 7's `DotMemberClause` fallback: `tok` is either the
    /// interface name (the clause's `name_token`) or the modport name beside
    /// it. The interface name resolves directly to its `Definition`; the
    /// modport name resolves by finding an already-elaborated instance of
    /// that interface and looking up the modport member in its body, falling
    /// back to the interface `Definition` itself when no instance exists to
    /// search (see `DESIGN.md` — this elaborator never parses `modport`
    /// blocks into member symbols, so no real default-instance fabrication is
    /// possible; this is the closest approximation the data model supports).
    fn resolve_dot_member_clause(&self, tree: &SyntaxTree, node: &SyntaxNode, tok: TokenRef) -> Option<SymbolRef> {
        let intf_tok = node.name_token?;
        let intf_name = tree.token(intf_tok)?.value.to_string();
        let def_ref = self.compilation.try_get_definition(&intf_name, None)?;

        if tok == intf_tok {
            return Some(def_ref);
        }

        let modport_name = tree.token(tok)?.value.to_string();

        if let Some(instance_ref) = self.find_instance_of(def_ref) {
            if let Some(body_ref) = self.compilation.symbol(instance_ref).and_then(|s| s.body) {
                if let Some(member) = self.compilation.scope_of(body_ref).find(&modport_name) {
                    return Some(member);
                }
            }
        }

        Some(def_ref)
    }

    /// Depth-first search (capped at [`MAX_INSTANCE_DEPTH`], matching the
    /// cap elaboration itself enforces) for any already-elaborated `Instance`
    /// of `def_ref` reachable from a top instance.
    fn find_instance_of(&self, def_ref: SymbolRef) -> Option<SymbolRef> {
        for &top in self.compilation.top_instances() {
            if let Some(found) = self.find_instance_of_rec(top, def_ref, 0) {
                return Some(found);
            }
        }
        None
    }

    fn find_instance_of_rec(&self, inst_ref: SymbolRef, def_ref: SymbolRef, depth: usize) -> Option<SymbolRef> {
        if depth > MAX_INSTANCE_DEPTH {
            return None;
        }

        let sym = self.compilation.symbol(inst_ref)?;

        if sym.definition == Some(def_ref) {
            return Some(inst_ref);
        }

        let body = self.compilation.symbol(sym.body?)?;

        for &member in &body.members {
            if self.compilation.symbol(member).map(|m| m.kind) == Some(SymbolKind::Instance) {
                if let Some(found) = self.find_instance_of_rec(member, def_ref, depth + 1) {
                    return Some(found);
                }
            }
        }

        None
    }

    fn normalize_symbol(&self, symbol: SymbolRef) -> SymbolRef {
        let Some(sym) = self.compilation.symbol(symbol) else { return symbol };

        match sym.kind {
            SymbolKind::InstanceBody => sym.definition.unwrap_or(symbol),
            SymbolKind::Port => sym.internal_symbol.unwrap_or(symbol),
            _ => symbol,
        }
    }

    fn resolve_package_import(&self, tree: &SyntaxTree, syntax: NodeRef, tok: TokenRef) -> Option<SymbolRef> {
        let node = tree.node(syntax)?;

        let item_ref = match node.kind {
            SyntaxKind::PackageImportItem => syntax,
            SyntaxKind::PackageImportDeclaration | SyntaxKind::PackageExportDeclaration => {
                node.child_nodes().find(|child| {
                    tree.node(*child).map(|n| n.kind == SyntaxKind::PackageImportItem).unwrap_or(false)
                })?
            }
            _ => return None,
        };

        let item = tree.node(item_ref)?;
        let name_tok = item.name_token?;

        if tok == name_tok {
            let name = tree.token(name_tok)?.value.to_string();
            return self.compilation.get_package(&name);
        }

        let pkg_name = tree.token(name_tok)?.value.to_string();
        let package = self.compilation.get_package(&pkg_name)?;

        let item_name = tree.token(tok)?.value.as_ref().to_string();
        self.compilation.scope_of(package).find(&item_name)
    }

    /// §4.4.3 `addLocalReferences`: one linear scan of `tokensInOrder` to
    /// collect every occurrence (within this document) of the symbol declared
    /// at `target_loc` with name `target_name`.
    pub fn add_local_references(&self, tree: &SyntaxTree, target_loc: SourceLocation, target_name: &str, out: &mut Vec<SourceLocation>) {
        let mut target: Option<SymbolRef> = None;

        for &tok_ref in self.syntax_index.tokens_in_order() {
            let Some(tok) = tree.token(tok_ref) else { continue };

            if tok.value.as_ref() != target_name {
                continue;
            }

            if target.is_none() {
                let Some(candidate) = self.get_symbol_at_token(tree, tok_ref) else { continue };
                let Some(candidate_sym) = self.compilation.symbol(candidate) else { continue };

                if candidate_sym.declaration == target_loc {
                    target = Some(candidate);
                    out.push(tok.range.start);
                }
                continue;
            }

            let Some(target_ref) = target else { continue };

            let Some(resolved) = self.get_symbol_at_token(tree, tok_ref) else { continue };

            let same = resolved == target_ref
                || self
                    .compilation
                    .symbol(resolved)
                    .zip(self.compilation.symbol(target_ref))
                    .map(|(a, b)| a.declaration == b.declaration)
                    .unwrap_or(false);

            if same {
                out.push(tok.range.start);
            }
        }
    }

    /// §4.4.3 `hasValidBuffers`: true iff every buffer id reachable from the
    /// trees this analysis was built over is still current in the source
    /// manager.
    pub fn has_valid_buffers(&self, source_manager: &SourceManager, trees: &[&SyntaxTree]) -> bool {
        for tree in trees {
            for buffer in tree.source_buffer_ids() {
                if !source_manager.is_current(*buffer) {
                    warn!(?buffer, "shallow analysis references a stale buffer");
                    return false;
                }
            }
        }
        true
    }

    /// §2.2 supplemented hover: one-line signature for the symbol at `loc`.
    pub fn get_hover(&self, tree: &SyntaxTree, loc: SourceLocation) -> Option<String> {
        let symbol_ref = self.get_symbol_at(tree, loc)?;
        let symbol = self.compilation.symbol(symbol_ref)?;
        Some(render_hover(symbol))
    }
}

/// True when `node_ref` is, or is nested inside, the `TokenList` payload of a
/// `MacroActualArgument` — the one shape §4.4.2 step 3 reparses in isolation.
fn is_macro_argument_list(tree: &SyntaxTree, node_ref: NodeRef) -> bool {
    macro_argument_ancestor(tree, node_ref).is_some()
}

fn macro_argument_ancestor(tree: &SyntaxTree, node_ref: NodeRef) -> Option<NodeRef> {
    let mut cur = node_ref;
    loop {
        let node = tree.node(cur)?;
        if node.kind == SyntaxKind::MacroActualArgument {
            return Some(cur);
        }
        let parent = node.parent();
        if parent.is_nil() {
            return None;
        }
        cur = parent;
    }
}

/// `IdentifierName`/`ScopedName`, or a `MemberSelector`/`IndexSelector` link
/// chained off one — the four kinds a scope-resolution-by-name walk handles.
fn is_name_chain_kind(kind: SyntaxKind) -> bool {
    matches!(
        kind,
        SyntaxKind::IdentifierName | SyntaxKind::ScopedName | SyntaxKind::MemberSelector | SyntaxKind::IndexSelector
    )
}

/// Climbs from `node_ref` to the outermost ancestor still within the name-
/// chain family, so a token found deep inside `a.b[c].d` resolves by walking
/// the whole chain from `a` rather than stopping at its own immediate parent.
fn find_enclosing_name(tree: &SyntaxTree, node_ref: NodeRef) -> Option<NodeRef> {
    let mut cur = node_ref;
    loop {
        let node = tree.node(cur)?;
        let parent = node.parent();

        if parent.is_nil() {
            return Some(cur);
        }

        match tree.node(parent) {
            Some(parent_node) if is_name_chain_kind(parent_node.kind) => cur = parent,
            _ => return Some(cur),
        }
    }
}

/// Flattens `node_ref`'s subtree into the token order it was parsed from,
/// walking `Child::Node` children recursively.
fn collect_tokens_ordered(tree: &SyntaxTree, node_ref: NodeRef, out: &mut Vec<TokenRef>) {
    let Some(node) = tree.node(node_ref) else { return };

    for child in &node.children {
        match child {
            Child::Token(t) => out.push(*t),
            Child::Node(n) => collect_tokens_ordered(tree, *n, out),
        }
    }
}

/// §4.4.2 step 3: reconstructs a macro actual argument's original token order,
/// rejoins it as approximate source text, and reparses that text in isolation
/// into a throwaway tree. `tok`'s position in the flattened token order is
/// preserved across the reparse (token order survives the space-joined
/// reconstruction even though byte offsets don't), so the matching token in
/// the new tree is found by index rather than by range.
fn reparse_macro_argument(tree: &SyntaxTree, syntax: NodeRef, tok: TokenRef) -> Option<(SyntaxTree, NodeRef, TokenRef)> {
    let arg_ref = macro_argument_ancestor(tree, syntax)?;
    let arg = tree.node(arg_ref)?;
    let list_ref = arg.child_nodes().next()?;

    let mut ordered = Vec::new();
    collect_tokens_ordered(tree, list_ref, &mut ordered);

    let index = ordered.iter().position(|t| *t == tok)?;

    let text = ordered
        .iter()
        .filter_map(|t| tree.token(*t).map(|token| token.raw.as_ref()))
        .collect::<Vec<_>>()
        .join(" ");

    if text.trim().is_empty() {
        return None;
    }

    let (new_tree, root) = parse_name_expression(BufferId::new(), &text);

    let mut new_ordered = Vec::new();
    collect_tokens_ordered(&new_tree, root, &mut new_ordered);

    let new_tok = *new_ordered.get(index)?;
    let indexer = SyntaxIndexer::build(&new_tree);
    let new_syntax = indexer.token_to_parent(new_tok)?;

    Some((new_tree, new_syntax, new_tok))
}

/// Builds the name→`DefineDirective` lookup table for `tree`'s own macro
/// definitions, shared by [`ShallowAnalysis::new`] and the standalone
/// document-symbols query (which needs macro names without a full
/// compilation).
pub(crate) fn build_macro_table(tree: &SyntaxTree) -> MacroTable {
    let mut macros = MacroTable::new();

    for define_ref in tree.defined_macros() {
        if let Some(node) = tree.node(*define_ref) {
            if let Some(name_tok) = node.name_token {
                if let Some(tok) = tree.token(name_tok) {
                    macros.insert(tok.value.to_string(), *define_ref);
                }
            }
        }
    }

    macros
}

fn render_hover(symbol: &Symbol) -> String {
    match symbol.kind {
        SymbolKind::Definition => format!("module {}", symbol.name),
        SymbolKind::Instance => format!("instance {}", symbol.name),
        SymbolKind::InstanceBody => format!("module {}", symbol.name),
        SymbolKind::Port if !symbol.type_text.is_empty() => format!("port {}: {}", symbol.name, symbol.type_text),
        SymbolKind::Port => format!("port {}", symbol.name),
        SymbolKind::Parameter if !symbol.type_text.is_empty() => format!("parameter {}: {}", symbol.name, symbol.type_text),
        SymbolKind::Parameter => format!("parameter {}", symbol.name),
        SymbolKind::Value => format!("variable {}", symbol.name),
        SymbolKind::Package => format!("package {}", symbol.name),
        SymbolKind::Type => format!("type {}", symbol.name),
        SymbolKind::Subroutine => format!("function {}", symbol.name),
        _ => symbol.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse;

    fn analyze(source_manager: &SourceManager, text: &str) -> (SyntaxTree, ShallowAnalysis) {
        let buffer = source_manager.assign_text("top.sv", text);
        let tree = parse(buffer, text, Some(source_manager), std::path::PathBuf::from("."));
        let analysis = ShallowAnalysis::new(source_manager, &tree, &[], AnalysisOptions::default());
        (tree, analysis)
    }

    #[test]
    fn resolves_instance_type_token_to_definition() {
        let source_manager = SourceManager::new();
        let text = "module leaf(); endmodule\nmodule top(); leaf u_leaf(); endmodule\n";
        let (tree, analysis) = analyze(&source_manager, text);

        let type_offset = text.rfind("leaf u_leaf").unwrap();
        let loc = SourceLocation::new(tree.primary_buffer(), type_offset);

        let symbol = analysis.get_symbol_at(&tree, loc).expect("symbol at instance type token");
        let sym = analysis.compilation().symbol(symbol).unwrap();
        assert_eq!(sym.kind, SymbolKind::Definition);
        assert_eq!(sym.name, "leaf");
    }

    #[test]
    fn top_level_definition_surfaces_as_top_instance() {
        let source_manager = SourceManager::new();
        let (_, analysis) = analyze(&source_manager, "module solo(); endmodule\n");

        assert_eq!(analysis.compilation().top_instances().len(), 1);
    }
}
