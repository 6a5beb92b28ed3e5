use crate::source::SourceRange;
use crate::symbols::MacroTable;
use crate::syntax::{NodeRef, SyntaxKind, SyntaxTree};

/// The outline kind a document-symbol entry is rendered as, mirroring an
/// editor's "symbol kind" enumeration closely enough to map onto one
/// one-for-one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutlineKind {
    Module,
    Class,
    Function,
    Object,
    Struct,
    Variable,
    Interface,
    TypeParameter,
    Constant,
}

/// One entry in the hierarchical outline produced by [`collect_document_symbols`].
pub struct OutlineEntry {
    pub name: String,
    pub detail: String,
    pub kind: OutlineKind,
    pub range: SourceRange,
    pub children: Vec<OutlineEntry>,
}

/// §4.4.4: a separate syntax visitor (distinct from the symbol indexer) that
/// produces a hierarchical outline directly from the concrete syntax tree.
pub fn collect_document_symbols(tree: &SyntaxTree, macros: &MacroTable, include_macros: bool) -> Vec<OutlineEntry> {
    let mut out = Vec::new();
    visit(tree, tree.root(), &mut out);

    if include_macros {
        for (name, define_ref) in macros {
            let Some(node) = tree.node(*define_ref) else { continue };
            let Some(name_tok) = node.name_token else { continue };
            let Some(tok) = tree.token(name_tok) else { continue };

            if tok.range.buffer() != tree.primary_buffer() {
                continue;
            }

            if name.is_empty() {
                continue;
            }

            out.push(OutlineEntry {
                name: name.clone(),
                detail: String::new(),
                kind: OutlineKind::Constant,
                range: tok.range,
                children: Vec::new(),
            });
        }
    }

    out
}

fn visit(tree: &SyntaxTree, node_ref: NodeRef, out: &mut Vec<OutlineEntry>) {
    let Some(node) = tree.node(node_ref) else { return };

    match node.kind {
        SyntaxKind::ModuleDeclaration | SyntaxKind::InterfaceDeclaration | SyntaxKind::ExternModuleDecl => {
            if let Some(entry) = name_entry(tree, node_ref, OutlineKind::Module, String::new()) {
                let mut children = Vec::new();
                for child in node.child_nodes() {
                    visit(tree, child, &mut children);
                }
                out.push(OutlineEntry { children, ..entry });
                return;
            }
        }

        SyntaxKind::ClassDeclaration => {
            if let Some(entry) = name_entry(tree, node_ref, OutlineKind::Class, String::new()) {
                let mut children = Vec::new();
                for child in node.child_nodes() {
                    visit(tree, child, &mut children);
                }
                out.push(OutlineEntry { children, ..entry });
                return;
            }
        }

        SyntaxKind::FunctionDeclaration | SyntaxKind::TaskDeclaration => {
            if let Some(entry) = name_entry(tree, node_ref, OutlineKind::Function, String::new()) {
                out.push(entry);
                return;
            }
        }

        SyntaxKind::HierarchyInstantiation => {
            let type_name = node.name_token.and_then(|t| tree.token(t)).map(|t| t.value.to_string()).unwrap_or_default();

            for child in node.child_nodes() {
                let Some(child_node) = tree.node(child) else { continue };
                if child_node.kind != SyntaxKind::HierarchicalInstance {
                    continue;
                }

                if let Some(entry) = name_entry(tree, child, OutlineKind::Object, type_name.clone()) {
                    out.push(entry);
                }
            }
            return;
        }

        SyntaxKind::GenerateBlock => {
            let label = node
                .name_token
                .and_then(|t| tree.token(t))
                .map(|t| t.value.to_string())
                .unwrap_or_else(|| "<anonymous>".to_string());

            let mut children = Vec::new();
            for child in node.child_nodes() {
                visit(tree, child, &mut children);
            }

            out.push(OutlineEntry {
                name: label,
                detail: String::new(),
                kind: OutlineKind::Struct,
                range: node.range,
                children,
            });
            return;
        }

        SyntaxKind::NetDeclaration | SyntaxKind::LocalVariableDeclaration | SyntaxKind::DataDeclaration => {
            for child in node.child_nodes() {
                let Some(decl_node) = tree.node(child) else { continue };
                if decl_node.kind != SyntaxKind::Declarator {
                    continue;
                }

                if let Some(entry) = name_entry(tree, child, OutlineKind::Variable, String::new()) {
                    out.push(entry);
                }
            }
            return;
        }

        SyntaxKind::PortDeclaration | SyntaxKind::ImplicitAnsiPort => {
            let detail = port_header_text(tree, node_ref);
            if let Some(entry) = name_entry(tree, node_ref, OutlineKind::Interface, detail) {
                out.push(entry);
            }
            return;
        }

        SyntaxKind::ParameterDeclaration => {
            for child in node.child_nodes() {
                let Some(decl_node) = tree.node(child) else { continue };
                if decl_node.kind != SyntaxKind::ParameterDeclarator {
                    continue;
                }

                if let Some(entry) = name_entry(tree, child, OutlineKind::TypeParameter, String::new()) {
                    out.push(entry);
                }
            }
            return;
        }

        _ => {}
    }

    for child in node.child_nodes() {
        visit(tree, child, out);
    }
}

fn name_entry(tree: &SyntaxTree, node_ref: NodeRef, kind: OutlineKind, detail: String) -> Option<OutlineEntry> {
    let node = tree.node(node_ref)?;
    let name_tok = node.name_token?;
    let tok = tree.token(name_tok)?;

    if tok.range.buffer() != tree.primary_buffer() {
        return None;
    }

    if tok.value.is_empty() {
        return None;
    }

    Some(OutlineEntry {
        name: tok.value.to_string(),
        detail,
        kind,
        range: node.range,
        children: Vec::new(),
    })
}

fn port_header_text(tree: &SyntaxTree, port_ref: NodeRef) -> String {
    let Some(node) = tree.node(port_ref) else { return String::new() };
    let mut parts = Vec::new();

    for tok_ref in node.child_tokens() {
        if let Some(tok) = tree.token(tok_ref) {
            if tok.raw.as_ref() == "=" {
                break;
            }
            parts.push(tok.raw.to_string());
        }
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceManager;
    use crate::syntax::parse;

    #[test]
    fn module_with_instance_and_port_outline() {
        let source_manager = SourceManager::new();
        let text = "module leaf(); endmodule\nmodule top(input logic clk); leaf u_leaf(); endmodule\n";
        let buffer = source_manager.assign_text("top.sv", text);
        let tree = parse(buffer, text, Some(&source_manager), std::path::PathBuf::from("."));

        let outline = collect_document_symbols(&tree, &MacroTable::new(), false);

        assert_eq!(outline.len(), 2);
        assert_eq!(outline[0].name, "leaf");
        assert_eq!(outline[1].name, "top");

        let top_children = &outline[1].children;
        assert!(top_children.iter().any(|c| c.kind == OutlineKind::Interface && c.name == "clk"));
        assert!(top_children.iter().any(|c| c.kind == OutlineKind::Object && c.name == "u_leaf"));
    }
}
