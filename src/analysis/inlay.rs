use std::collections::HashSet;

use crate::arena::Identifiable;
use crate::lexis::{TokenKind, TokenRef};
use crate::source::{SourceLocation, SourceManager, SourceRange};
use crate::symbols::{Compilation, SymbolKind, SymbolRef};
use crate::syntax::{Child, NodeRef, SyntaxKind, SyntaxNode, SyntaxTree};

use super::shallow::ShallowAnalysis;

/// The extra column width, beyond the module-type token's own column, that a
/// wildcard-port-connection expansion is reindented to.
const WILDCARD_INDENT: usize = 4;

/// §4.5's five boolean/integer knobs.
#[derive(Clone, Copy, Debug)]
pub struct InlayHintConfig {
    pub port_types: bool,
    pub ordered_instance_names: bool,
    pub wildcard_names: bool,
    pub func_arg_names: usize,
    pub macro_arg_names: usize,
}

impl Default for InlayHintConfig {
    fn default() -> Self {
        Self {
            port_types: true,
            ordered_instance_names: true,
            wildcard_names: true,
            func_arg_names: 0,
            macro_arg_names: 0,
        }
    }
}

/// A single text replacement, as produced by the wildcard-port-connection hint.
pub struct TextEdit {
    pub range: SourceRange,
    pub replacement: String,
}

pub struct InlayHint {
    pub offset: usize,
    pub label: String,
    pub tooltip: Option<String>,
    pub edit: Option<TextEdit>,
}

/// §4.5: collects inlay hints over `[lo, hi]` in `tree`'s primary buffer.
pub fn collect_inlay_hints(
    analysis: &ShallowAnalysis,
    source_manager: &SourceManager,
    tree: &SyntaxTree,
    lo: usize,
    hi: usize,
    config: &InlayHintConfig,
) -> Vec<InlayHint> {
    let mut out = Vec::new();

    for node_ref in select_candidates(analysis, tree, lo, hi) {
        let Some(node) = tree.node(node_ref) else { continue };

        match node.kind {
            SyntaxKind::HierarchyInstantiation => {
                collect_instantiation_hints(analysis, source_manager, tree, node_ref, config, &mut out);
            }
            SyntaxKind::InvocationExpression => {
                collect_invocation_hints(analysis, tree, node_ref, config, &mut out);
            }
            SyntaxKind::MacroUsage => {
                collect_macro_hints(analysis, tree, node_ref, config, &mut out);
            }
            SyntaxKind::ClassName => {
                collect_class_name_hints(analysis, tree, node_ref, &mut out);
            }
            _ => {}
        }
    }

    out
}

fn select_candidates(analysis: &ShallowAnalysis, tree: &SyntaxTree, lo: usize, hi: usize) -> Vec<NodeRef> {
    let candidates = analysis.syntax_index().hint_candidates();
    let mut begin = candidates.partition_point(|(offset, _)| *offset < lo);

    if begin > 0 {
        let (_, prev_ref) = candidates[begin - 1];
        if let Some(prev_node) = tree.node(prev_ref) {
            if prev_node.range.start.offset < lo && prev_node.range.end.offset > lo {
                begin -= 1;
            }
        }
    }

    candidates[begin..]
        .iter()
        .take_while(|(offset, _)| *offset <= hi)
        .map(|(_, node_ref)| *node_ref)
        .collect()
}

fn collect_instantiation_hints(
    analysis: &ShallowAnalysis,
    source_manager: &SourceManager,
    tree: &SyntaxTree,
    node_ref: NodeRef,
    config: &InlayHintConfig,
    out: &mut Vec<InlayHint>,
) {
    let Some(node) = tree.node(node_ref) else { return };
    let Some(type_tok) = node.name_token else { return };

    let Some(def_ref) = analysis.get_symbol_at_token(tree, type_tok) else { return };
    let Some(def_sym) = analysis.compilation().symbol(def_ref) else { return };
    if def_sym.kind != SymbolKind::Definition {
        return;
    }

    let instances: Vec<NodeRef> = node
        .child_nodes()
        .filter(|c| tree.node(*c).map(|n| n.kind == SyntaxKind::HierarchicalInstance).unwrap_or(false))
        .collect();

    if config.ordered_instance_names {
        if let Some(&first) = instances.first() {
            if let Some(body_ref) = instance_body(analysis, tree, first) {
                let param_names = ordered_member_names(analysis.compilation(), body_ref, SymbolKind::Parameter);
                let mut idx = 0usize;

                for child in node.child_nodes() {
                    let Some(child_node) = tree.node(child) else { continue };

                    match child_node.kind {
                        SyntaxKind::OrderedParamAssignment => {
                            if let Some(name) = param_names.get(idx) {
                                emit_prefix_hint(tree, child, name, out);
                            }
                            idx += 1;
                        }
                        SyntaxKind::NamedParamAssignment => idx += 1,
                        _ => {}
                    }
                }
            }
        }
    }

    for instance_ref in instances {
        collect_instance_port_hints(analysis, source_manager, tree, instance_ref, type_tok, config, out);
    }
}

fn instance_body(analysis: &ShallowAnalysis, tree: &SyntaxTree, instance_node_ref: NodeRef) -> Option<SymbolRef> {
    let instance_sym_ref = analysis.symbol_index().symbol_of_syntax(tree, instance_node_ref)?;
    analysis.compilation().symbol(instance_sym_ref)?.body
}

fn collect_instance_port_hints(
    analysis: &ShallowAnalysis,
    source_manager: &SourceManager,
    tree: &SyntaxTree,
    instance_node_ref: NodeRef,
    type_tok: TokenRef,
    config: &InlayHintConfig,
    out: &mut Vec<InlayHint>,
) {
    let Some(body_ref) = instance_body(analysis, tree, instance_node_ref) else { return };
    let ports = ordered_member_refs(analysis.compilation(), body_ref, SymbolKind::Port);
    let Some(node) = tree.node(instance_node_ref) else { return };

    let mut ordered_idx = 0usize;
    let mut type_candidates: Vec<(usize, usize, String)> = Vec::new();

    for child in node.child_nodes() {
        let Some(child_node) = tree.node(child) else { continue };

        match child_node.kind {
            SyntaxKind::OrderedPortConnection => {
                if let Some(&port_ref) = ports.get(ordered_idx) {
                    if let Some(port_sym) = analysis.compilation().symbol(port_ref) {
                        emit_prefix_hint(tree, child, &port_sym.name, out);
                    }
                }
                ordered_idx += 1;
            }

            SyntaxKind::NamedPortConnection => {
                ordered_idx += 1;

                if !config.port_types {
                    continue;
                }

                let Some(name_tok) = child_node.name_token else { continue };
                let Some(port_ref) = analysis.symbol_index().get_symbol(tree, name_tok) else { continue };
                let Some(port_sym) = analysis.compilation().symbol(port_ref) else { continue };

                if port_sym.type_text.is_empty() {
                    continue;
                }

                let offset = child_node.range.end.offset;
                let loc = SourceLocation::new(tree.primary_buffer(), offset);

                let Ok(line) = source_manager.get_line_number(loc) else { continue };
                type_candidates.push((offset, line, port_sym.type_text.clone()));
            }

            SyntaxKind::WildcardPortConnection => {
                ordered_idx += 1;

                if config.wildcard_names {
                    emit_wildcard_hint(tree, source_manager, analysis.compilation(), type_tok, child, &ports, out);
                }
            }

            _ => {}
        }
    }

    emit_aligned_type_hints(type_candidates, out);
}

fn emit_aligned_type_hints(candidates: Vec<(usize, usize, String)>, out: &mut Vec<InlayHint>) {
    if candidates.is_empty() {
        return;
    }

    let mut seen_lines = HashSet::new();
    let collides = candidates.iter().any(|(_, line, _)| !seen_lines.insert(*line));

    if collides {
        return;
    }

    let max_len = candidates.iter().map(|(_, _, label)| label.len()).max().unwrap_or(0);

    for (offset, _, label) in candidates {
        out.push(InlayHint {
            offset,
            label: format!("{label:<max_len$}"),
            tooltip: None,
            edit: None,
        });
    }
}

fn emit_wildcard_hint(
    tree: &SyntaxTree,
    source_manager: &SourceManager,
    compilation: &Compilation,
    type_tok: TokenRef,
    wildcard_ref: NodeRef,
    ports: &[SymbolRef],
    out: &mut Vec<InlayHint>,
) {
    let Some(wildcard_node) = tree.node(wildcard_ref) else { return };
    let Some(type_token) = tree.token(type_tok) else { return };

    let port_syms: Vec<_> = ports.iter().filter_map(|p| compilation.symbol(*p)).collect();
    if port_syms.is_empty() {
        return;
    }

    let label = port_syms.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(", ");

    let tooltip = port_syms
        .iter()
        .map(|s| if s.type_text.is_empty() { s.name.clone() } else { format!("{} {}", s.type_text, s.name) })
        .collect::<Vec<_>>()
        .join(", ");

    let base_loc = SourceLocation::new(tree.primary_buffer(), type_token.range.start.offset);
    let Ok(column) = source_manager.get_column_number(base_loc) else { return };
    let indent = " ".repeat(column.saturating_sub(1) + WILDCARD_INDENT);

    let replacement = port_syms
        .iter()
        .map(|s| format!(".{}({})", s.name, s.name))
        .collect::<Vec<_>>()
        .join(&format!(",\n{indent}"));

    out.push(InlayHint {
        offset: wildcard_node.range.start.offset,
        label,
        tooltip: Some(tooltip),
        edit: Some(TextEdit { range: wildcard_node.range, replacement }),
    });
}

fn collect_invocation_hints(
    analysis: &ShallowAnalysis,
    tree: &SyntaxTree,
    node_ref: NodeRef,
    config: &InlayHintConfig,
    out: &mut Vec<InlayHint>,
) {
    let Some(node) = tree.node(node_ref) else { return };
    let Some(name_tok) = node.name_token else { return };

    let Some(sub_ref) = analysis.get_symbol_at_token(tree, name_tok) else { return };
    let Some(sub_sym) = analysis.compilation().symbol(sub_ref) else { return };
    if sub_sym.kind != SymbolKind::Subroutine {
        return;
    }

    let args: Vec<NodeRef> = node
        .child_nodes()
        .filter(|c| tree.node(*c).map(|n| n.kind == SyntaxKind::TokenList).unwrap_or(false))
        .collect();

    if args.len() < config.func_arg_names {
        return;
    }

    for (i, arg_ref) in args.iter().enumerate() {
        let Some(name) = sub_sym.argument_names.get(i) else { continue };
        emit_prefix_hint(tree, *arg_ref, name, out);
    }
}

fn collect_macro_hints(
    analysis: &ShallowAnalysis,
    tree: &SyntaxTree,
    node_ref: NodeRef,
    config: &InlayHintConfig,
    out: &mut Vec<InlayHint>,
) {
    let Some(node) = tree.node(node_ref) else { return };
    let Some(name_tok) = node.name_token else { return };
    let Some(tok) = tree.token(name_tok) else { return };

    let Some(&define_ref) = analysis.macros().get(tok.value.as_ref()) else { return };
    let Some(define_node) = tree.node(define_ref) else { return };

    let formal_names = macro_formal_names(tree, define_node);
    if formal_names.is_empty() {
        return;
    }

    let actuals: Vec<NodeRef> = node
        .child_nodes()
        .filter(|c| tree.node(*c).map(|n| n.kind == SyntaxKind::MacroActualArgument).unwrap_or(false))
        .collect();

    if actuals.len() < config.macro_arg_names {
        return;
    }

    for (i, actual_ref) in actuals.iter().enumerate() {
        let Some(name) = formal_names.get(i) else { continue };
        emit_prefix_hint(tree, *actual_ref, name, out);
    }
}

fn macro_formal_names(tree: &SyntaxTree, define_node: &SyntaxNode) -> Vec<String> {
    let mut names = Vec::new();
    let mut in_args = false;

    for tok_ref in define_node.child_tokens() {
        let Some(tok) = tree.token(tok_ref) else { continue };

        if !in_args {
            if tok.kind == TokenKind::Operator && tok.raw.as_ref() == "(" {
                in_args = true;
            }
            continue;
        }

        if tok.kind == TokenKind::Operator && tok.raw.as_ref() == ")" {
            break;
        }

        if tok.kind == TokenKind::Identifier {
            names.push(tok.value.to_string());
        }
    }

    names
}

fn collect_class_name_hints(analysis: &ShallowAnalysis, tree: &SyntaxTree, node_ref: NodeRef, out: &mut Vec<InlayHint>) {
    let Some(node) = tree.node(node_ref) else { return };
    let Some(type_tok) = node.name_token else { return };

    let Some(type_ref) = analysis.get_symbol_at_token(tree, type_tok) else { return };
    let Some(type_sym) = analysis.compilation().symbol(type_ref) else { return };

    if type_sym.kind != SymbolKind::Type || type_sym.tree_id != tree.id() {
        return;
    }

    let param_names = class_parameter_names(tree, type_sym.syntax);
    if param_names.is_empty() {
        return;
    }

    let mut idx = 0usize;
    for child in node.child_nodes() {
        let Some(child_node) = tree.node(child) else { continue };

        match child_node.kind {
            SyntaxKind::OrderedParamAssignment => {
                if let Some(name) = param_names.get(idx) {
                    emit_prefix_hint(tree, child, name, out);
                }
                idx += 1;
            }
            SyntaxKind::NamedParamAssignment => idx += 1,
            _ => {}
        }
    }
}

/// A class's own generic parameter-port list is a flat run of
/// `ParameterDeclaration` nodes directly under `ClassDeclaration`, the same
/// shape `parse_parameter_declaration_item` produces for module headers.
fn class_parameter_names(tree: &SyntaxTree, class_decl_ref: NodeRef) -> Vec<String> {
    let Some(node) = tree.node(class_decl_ref) else { return Vec::new() };

    node.child_nodes()
        .filter_map(|child| tree.node(child))
        .filter(|n| n.kind == SyntaxKind::ParameterDeclaration)
        .filter_map(|n| n.child_nodes().find_map(|c| tree.node(c)).and_then(|decl| decl.name_token))
        .filter_map(|tok| tree.token(tok))
        .map(|tok| tok.value.to_string())
        .collect()
}

fn ordered_member_refs(compilation: &Compilation, owner: SymbolRef, kind: SymbolKind) -> Vec<SymbolRef> {
    let Some(sym) = compilation.symbol(owner) else { return Vec::new() };

    sym.members
        .iter()
        .filter(|m| compilation.symbol(**m).map(|s| s.kind == kind).unwrap_or(false))
        .copied()
        .collect()
}

fn ordered_member_names(compilation: &Compilation, owner: SymbolRef, kind: SymbolKind) -> Vec<String> {
    ordered_member_refs(compilation, owner, kind)
        .into_iter()
        .filter_map(|m| compilation.symbol(m))
        .map(|s| s.name.clone())
        .collect()
}

fn emit_prefix_hint(tree: &SyntaxTree, node_ref: NodeRef, name: &str, out: &mut Vec<InlayHint>) {
    let Some(tok) = first_token(tree, node_ref) else { return };
    let Some(tok_data) = tree.token(tok) else { return };

    out.push(InlayHint {
        offset: tok_data.range.start.offset,
        label: format!("{name}:"),
        tooltip: None,
        edit: None,
    });
}

fn first_token(tree: &SyntaxTree, node_ref: NodeRef) -> Option<TokenRef> {
    let node = tree.node(node_ref)?;

    for child in &node.children {
        match child {
            Child::Token(tok_ref) => return Some(*tok_ref),
            Child::Node(child_ref) => {
                if let Some(found) = first_token(tree, *child_ref) {
                    return Some(found);
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::shallow::AnalysisOptions;
    use crate::syntax::parse;

    fn analyze(source_manager: &SourceManager, text: &str) -> (SyntaxTree, ShallowAnalysis) {
        let buffer = source_manager.assign_text("top.sv", text);
        let tree = parse(buffer, text, Some(source_manager), std::path::PathBuf::from("."));
        let analysis = ShallowAnalysis::new(source_manager, &tree, &[], AnalysisOptions::default());
        (tree, analysis)
    }

    #[test]
    fn named_port_connection_gets_type_hint() {
        let source_manager = SourceManager::new();
        let text = "module leaf(input logic clk); endmodule\nmodule top(); leaf u_leaf(.clk(sys_clk)); endmodule\n";
        let (tree, analysis) = analyze(&source_manager, text);

        let hints = collect_inlay_hints(&analysis, &source_manager, &tree, 0, text.len(), &InlayHintConfig::default());

        assert!(hints.iter().any(|h| h.label.trim() == "input logic"));
    }

    #[test]
    fn ordered_port_connection_gets_name_hint() {
        let source_manager = SourceManager::new();
        let text = "module leaf(input logic clk); endmodule\nmodule top(); leaf u_leaf(sys_clk); endmodule\n";
        let (tree, analysis) = analyze(&source_manager, text);

        let hints = collect_inlay_hints(&analysis, &source_manager, &tree, 0, text.len(), &InlayHintConfig::default());

        assert!(hints.iter().any(|h| h.label == "clk:"));
    }

    #[test]
    fn wildcard_connection_emits_expansion_edit() {
        let source_manager = SourceManager::new();
        let text = "module leaf(input logic clk, output logic q); endmodule\nmodule top(); leaf u_leaf(.*); endmodule\n";
        let (tree, analysis) = analyze(&source_manager, text);

        let hints = collect_inlay_hints(&analysis, &source_manager, &tree, 0, text.len(), &InlayHintConfig::default());

        let wildcard_hint = hints.iter().find(|h| h.edit.is_some()).expect("wildcard hint with edit");
        assert_eq!(wildcard_hint.label, "clk, q");
        let edit = wildcard_hint.edit.as_ref().unwrap();
        assert!(edit.replacement.contains(".clk(clk)"));
        assert!(edit.replacement.contains(".q(q)"));
    }
}
