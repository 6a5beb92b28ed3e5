use std::collections::HashMap;

use crate::arena::{Identifiable, Repo};
use crate::source::{BufferId, SourceLocation};
use crate::syntax::{Child, NodeRef, SyntaxKind, SyntaxTree};

use super::compilation::{Compilation, CompilationOptions, MAX_INSTANCE_DEPTH};
use super::symbol::{Symbol, SymbolKind, SymbolRef};

/// Per-definition shape computed once and reused by every instance of that
/// definition, rather than re-walked per instantiation.
struct DefinitionTemplate {
    tree_index: usize,
    ports: Vec<(String, String, NodeRef)>,
    parameters: Vec<(String, NodeRef)>,
    locals: Vec<(String, NodeRef)>,
    instantiations: Vec<NodeRef>,
}

/// Builds a shallow [`Compilation`] from `primary` and its dependency trees.
///
/// This is the in-crate stand-in for §4.0's "elaborator" boundary and
/// implements §4.4.1's construction steps 3-5 (step 1/2/6 are the syntax
/// indexer and macro table, built by the caller around this).
pub(crate) fn elaborate(
    primary: &SyntaxTree,
    deps: &[&SyntaxTree],
    primary_buffer: BufferId,
    options: CompilationOptions,
) -> Compilation {
    let mut symbols = Repo::new();

    let root = SymbolRef(symbols.insert(Symbol::new(SymbolKind::Root, "", SourceLocation::nil(), NodeRef::nil())));
    let compilation_unit = SymbolRef(symbols.insert(Symbol::new(
        SymbolKind::CompilationUnit,
        "",
        SourceLocation::nil(),
        NodeRef::nil(),
    )));

    if let Some(root_sym) = symbols.get_mut(&root.0) {
        root_sym.members.push(compilation_unit);
    }

    let all_trees: Vec<&SyntaxTree> = std::iter::once(primary).chain(deps.iter().copied()).collect();

    let mut packages = HashMap::new();
    let mut definitions = HashMap::new();
    let mut templates: HashMap<String, DefinitionTemplate> = HashMap::new();

    for (tree_index, tree) in all_trees.iter().enumerate() {
        let Some(root_node) = tree.node(tree.root()) else { continue };

        for child in &root_node.children {
            let Child::Node(item_ref) = child else { continue };
            let Some(item) = tree.node(*item_ref) else { continue };

            match item.kind {
                SyntaxKind::ModuleDeclaration | SyntaxKind::InterfaceDeclaration | SyntaxKind::ExternModuleDecl => {
                    let Some(name_tok) = item.name_token else { continue };
                    let Some(name) = tree.token(name_tok).map(|t| t.value.to_string()) else { continue };

                    if definitions.contains_key(&name) {
                        continue;
                    }

                    let declaration = SourceLocation::new(tree.primary_buffer(), tree.token(name_tok).unwrap().range.start.offset);
                    let def_ref = SymbolRef(symbols.insert(
                        Symbol::new(SymbolKind::Definition, name.clone(), declaration, *item_ref).with_tree(tree.id()),
                    ));

                    if let Some(cu) = symbols.get_mut(&compilation_unit.0) {
                        cu.members.push(def_ref);
                    }

                    definitions.insert(name.clone(), def_ref);

                    if item.kind != SyntaxKind::ExternModuleDecl {
                        templates.insert(name, build_template(tree, *item_ref, tree_index));
                    }
                }

                SyntaxKind::PackageDeclaration => {
                    let name = item
                        .name_token
                        .and_then(|t| tree.token(t))
                        .map(|t| t.value.to_string())
                        .unwrap_or_default();

                    if name.is_empty() || packages.contains_key(&name) {
                        continue;
                    }

                    let declaration = item
                        .name_token
                        .and_then(|t| tree.token(t))
                        .map(|t| SourceLocation::new(tree.primary_buffer(), t.range.start.offset))
                        .unwrap_or(SourceLocation::nil());

                    let pkg_ref = SymbolRef(symbols.insert(
                        Symbol::new(SymbolKind::Package, name.clone(), declaration, *item_ref).with_tree(tree.id()),
                    ));

                    for member in &item.children {
                        let Child::Node(member_ref) = member else { continue };
                        let Some(member_node) = tree.node(*member_ref) else { continue };

                        let member_kind = match member_node.kind {
                            SyntaxKind::ClassDeclaration => Some(SymbolKind::Type),
                            SyntaxKind::FunctionDeclaration | SyntaxKind::TaskDeclaration => Some(SymbolKind::Subroutine),
                            SyntaxKind::ParameterDeclaration => Some(SymbolKind::Parameter),
                            _ => None,
                        };

                        let Some(kind) = member_kind else { continue };
                        let Some(member_name_tok) = member_node.name_token else { continue };
                        let Some(member_tok) = tree.token(member_name_tok) else { continue };

                        let mut member_sym = Symbol::new(
                            kind,
                            member_tok.value.to_string(),
                            SourceLocation::new(tree.primary_buffer(), member_tok.range.start.offset),
                            *member_ref,
                        )
                        .with_tree(tree.id());

                        if kind == SymbolKind::Subroutine {
                            member_sym.argument_names = formal_argument_names(tree, *member_ref);
                        }

                        let member_symref = SymbolRef(symbols.insert(member_sym));
                        if let Some(pkg) = symbols.get_mut(&pkg_ref.0) {
                            pkg.members.push(member_symref);
                        }
                    }

                    if let Some(cu) = symbols.get_mut(&compilation_unit.0) {
                        cu.members.push(pkg_ref);
                    }

                    packages.insert(name, pkg_ref);
                }

                _ => {}
            }
        }
    }

    let mut instantiated: std::collections::HashSet<String> = std::collections::HashSet::new();
    for template in templates.values() {
        let tree = all_trees[template.tree_index];

        for inst_list_ref in &template.instantiations {
            if let Some(name) = instantiation_type_name(tree, *inst_list_ref) {
                instantiated.insert(name);
            }
        }
    }

    let mut top_instances = Vec::new();

    let definition_names: Vec<String> = definitions.keys().cloned().collect();
    for name in definition_names {
        if instantiated.contains(&name) {
            continue;
        }

        let Some(&def_ref) = definitions.get(&name) else { continue };
        let Some(template) = templates.get(&name) else { continue };

        let body_ref = elaborate_body(&mut symbols, &all_trees, &templates, &definitions, def_ref, template, 0);

        let inst_sym = {
            let def = symbols.get(&def_ref.0).unwrap();
            let mut s = Symbol::new(SymbolKind::Instance, def.name.clone(), def.declaration, def.syntax).with_tree(def.tree_id);
            s.definition = Some(def_ref);
            s.body = Some(body_ref);
            s
        };

        let inst_ref = SymbolRef(symbols.insert(inst_sym));
        top_instances.push(inst_ref);
    }

    Compilation {
        symbols,
        root,
        compilation_unit,
        packages,
        definitions,
        top_instances,
        options,
        primary_buffer,
    }
}

fn build_template(tree: &SyntaxTree, module_ref: NodeRef, tree_index: usize) -> DefinitionTemplate {
    let mut ports = Vec::new();
    let mut parameters = Vec::new();
    let mut locals = Vec::new();
    let mut instantiations = Vec::new();

    collect_body(tree, module_ref, &mut ports, &mut parameters, &mut locals, &mut instantiations);

    DefinitionTemplate {
        tree_index,
        ports,
        parameters,
        locals,
        instantiations,
    }
}

fn collect_body(
    tree: &SyntaxTree,
    node_ref: NodeRef,
    ports: &mut Vec<(String, String, NodeRef)>,
    parameters: &mut Vec<(String, NodeRef)>,
    locals: &mut Vec<(String, NodeRef)>,
    instantiations: &mut Vec<NodeRef>,
) {
    let Some(node) = tree.node(node_ref) else { return };

    for child in &node.children {
        let Child::Node(child_ref) = child else { continue };
        let Some(child_node) = tree.node(*child_ref) else { continue };

        match child_node.kind {
            SyntaxKind::PortDeclaration | SyntaxKind::ImplicitAnsiPort => {
                if let Some(name_tok) = child_node.name_token {
                    if let Some(tok) = tree.token(name_tok) {
                        ports.push((tok.value.to_string(), port_type_text(tree, *child_ref), *child_ref));
                    }
                }
            }

            SyntaxKind::ParameterDeclaration => {
                for decl_child in &child_node.children {
                    let Child::Node(decl_ref) = decl_child else { continue };
                    let Some(decl_node) = tree.node(*decl_ref) else { continue };

                    if decl_node.kind != SyntaxKind::ParameterDeclarator {
                        continue;
                    }

                    if let Some(name_tok) = decl_node.name_token {
                        if let Some(tok) = tree.token(name_tok) {
                            parameters.push((tok.value.to_string(), *decl_ref));
                        }
                    }
                }
            }

            SyntaxKind::NetDeclaration | SyntaxKind::DataDeclaration | SyntaxKind::LocalVariableDeclaration => {
                for decl_child in &child_node.children {
                    let Child::Node(decl_ref) = decl_child else { continue };
                    let Some(decl_node) = tree.node(*decl_ref) else { continue };

                    if decl_node.kind != SyntaxKind::ParameterDeclarator && decl_node.kind != SyntaxKind::Declarator {
                        continue;
                    }

                    if let Some(name_tok) = decl_node.name_token {
                        if let Some(tok) = tree.token(name_tok) {
                            locals.push((tok.value.to_string(), *decl_ref));
                        }
                    }
                }
            }

            SyntaxKind::HierarchyInstantiation => {
                instantiations.push(*child_ref);
            }

            SyntaxKind::GenerateBlock => {
                collect_body(tree, *child_ref, ports, parameters, locals, instantiations);
            }

            SyntaxKind::ModuleDeclaration
            | SyntaxKind::InterfaceDeclaration
            | SyntaxKind::FunctionDeclaration
            | SyntaxKind::TaskDeclaration
            | SyntaxKind::ClassDeclaration
            | SyntaxKind::PackageDeclaration => {
                // Separate scopes: do not fold their members into this body.
            }

            _ => {}
        }
    }
}

fn port_type_text(tree: &SyntaxTree, port_ref: NodeRef) -> String {
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

fn instantiation_type_name(tree: &SyntaxTree, inst_ref: NodeRef) -> Option<String> {
    let node = tree.node(inst_ref)?;
    let name_tok = node.name_token?;
    tree.token(name_tok).map(|t| t.value.to_string())
}

/// Formal argument names, in declaration order, for a `FunctionDeclaration`
/// or `TaskDeclaration` node (used for inlay-hint argument names).
fn formal_argument_names(tree: &SyntaxTree, decl_ref: NodeRef) -> Vec<String> {
    let Some(node) = tree.node(decl_ref) else { return Vec::new() };

    let Some(list_ref) = node.child_nodes().find(|c| tree.node(*c).map(|n| n.kind == SyntaxKind::FormalArgumentList).unwrap_or(false))
    else {
        return Vec::new();
    };

    let Some(list_node) = tree.node(list_ref) else { return Vec::new() };

    list_node
        .child_nodes()
        .filter_map(|arg_ref| tree.node(arg_ref))
        .filter_map(|arg_node| arg_node.name_token)
        .filter_map(|tok| tree.token(tok))
        .map(|tok| tok.value.to_string())
        .collect()
}

fn elaborate_body(
    symbols: &mut Repo<Symbol>,
    all_trees: &[&SyntaxTree],
    templates: &HashMap<String, DefinitionTemplate>,
    definitions: &HashMap<String, SymbolRef>,
    def_ref: SymbolRef,
    template: &DefinitionTemplate,
    depth: usize,
) -> SymbolRef {
    let tree = all_trees[template.tree_index];
    let def = symbols.get(&def_ref.0).unwrap();
    let body_sym = Symbol::new(SymbolKind::InstanceBody, def.name.clone(), def.declaration, def.syntax).with_tree(tree.id());
    let body_ref = SymbolRef(symbols.insert(body_sym));

    for (name, type_text, syntax) in &template.ports {
        let declaration = tree
            .node(*syntax)
            .and_then(|n| n.name_token)
            .and_then(|t| tree.token(t))
            .map(|t| SourceLocation::new(tree.primary_buffer(), t.range.start.offset))
            .unwrap_or(SourceLocation::nil());

        let mut port_sym = Symbol::new(SymbolKind::Port, name.clone(), declaration, *syntax).with_tree(tree.id());
        port_sym.type_text = type_text.clone();
        let port_ref = SymbolRef(symbols.insert(port_sym));

        if let Some(body) = symbols.get_mut(&body_ref.0) {
            body.members.push(port_ref);
        }
    }

    for (name, syntax) in &template.parameters {
        let declaration = tree
            .node(*syntax)
            .and_then(|n| n.name_token)
            .and_then(|t| tree.token(t))
            .map(|t| SourceLocation::new(tree.primary_buffer(), t.range.start.offset))
            .unwrap_or(SourceLocation::nil());

        let param_sym = Symbol::new(SymbolKind::Parameter, name.clone(), declaration, *syntax).with_tree(tree.id());
        let param_ref = SymbolRef(symbols.insert(param_sym));

        if let Some(body) = symbols.get_mut(&body_ref.0) {
            body.members.push(param_ref);
        }
    }

    for (name, syntax) in &template.locals {
        let declaration = tree
            .node(*syntax)
            .and_then(|n| n.name_token)
            .and_then(|t| tree.token(t))
            .map(|t| SourceLocation::new(tree.primary_buffer(), t.range.start.offset))
            .unwrap_or(SourceLocation::nil());

        let value_sym = Symbol::new(SymbolKind::Value, name.clone(), declaration, *syntax).with_tree(tree.id());
        let value_ref = SymbolRef(symbols.insert(value_sym));

        if let Some(body) = symbols.get_mut(&body_ref.0) {
            body.members.push(value_ref);
        }
    }

    if depth < MAX_INSTANCE_DEPTH {
        for inst_list_ref in &template.instantiations {
            let Some(type_name) = instantiation_type_name(tree, *inst_list_ref) else { continue };
            let Some(&child_def_ref) = definitions.get(&type_name) else { continue };
            let Some(child_template) = templates.get(&type_name) else { continue };

            for hier_instance_ref in child_hierarchical_instances(tree, *inst_list_ref) {
                let Some(instance_name) = hier_instance_name(tree, hier_instance_ref) else { continue };

                let child_body_ref =
                    elaborate_body(symbols, all_trees, templates, definitions, child_def_ref, child_template, depth + 1);

                let instance_declaration = tree
                    .node(hier_instance_ref)
                    .and_then(|n| n.name_token)
                    .and_then(|t| tree.token(t))
                    .map(|t| SourceLocation::new(tree.primary_buffer(), t.range.start.offset))
                    .unwrap_or(SourceLocation::nil());

                let mut inst_sym =
                    Symbol::new(SymbolKind::Instance, instance_name, instance_declaration, hier_instance_ref).with_tree(tree.id());
                inst_sym.definition = Some(child_def_ref);
                inst_sym.body = Some(child_body_ref);
                let inst_ref = SymbolRef(symbols.insert(inst_sym));

                if let Some(body) = symbols.get_mut(&body_ref.0) {
                    body.members.push(inst_ref);
                }
            }
        }
    }

    body_ref
}

fn child_hierarchical_instances(tree: &SyntaxTree, inst_list_ref: NodeRef) -> Vec<NodeRef> {
    let Some(node) = tree.node(inst_list_ref) else { return Vec::new() };

    node.children
        .iter()
        .filter_map(|c| match c {
            Child::Node(n) => tree.node(*n).filter(|nd| nd.kind == SyntaxKind::HierarchicalInstance).map(|_| *n),
            Child::Token(_) => None,
        })
        .collect()
}

fn hier_instance_name(tree: &SyntaxTree, hier_instance_ref: NodeRef) -> Option<String> {
    let node = tree.node(hier_instance_ref)?;
    let name_tok = node.name_token?;
    tree.token(name_tok).map(|t| t.value.to_string())
}
