use tracing::warn;

use crate::lexis::{TokenKind, TokenRef};
use crate::source::SourceLocation;

use super::node::{Child, NodeRef, SyntaxKind};
use super::tree::SyntaxTree;

/// Per-buffer token and hint-candidate index over one [`SyntaxTree`].
///
/// Built once by a single pre-order walk of the tree and then queried
/// read-only; this is the seam a hover/definition/inlay-hints request goes
/// through to get from a byte offset to a token, and from a token to the node
/// that contains it.
pub struct SyntaxIndexer {
    tokens_in_order: Vec<TokenRef>,
    token_to_parent: std::collections::HashMap<TokenRef, NodeRef>,
    hint_candidates: Vec<(usize, NodeRef)>,
}

impl SyntaxIndexer {
    pub fn build(tree: &SyntaxTree) -> Self {
        let mut tokens_in_order = Vec::new();
        let mut token_to_parent = std::collections::HashMap::new();
        let mut hint_candidates = Vec::new();

        Self::walk(tree, tree.root(), &mut tokens_in_order, &mut token_to_parent, &mut hint_candidates);

        tokens_in_order.sort_by_key(|t| tree.token(*t).map(|tok| tok.range.start.offset).unwrap_or(usize::MAX));
        hint_candidates.sort_by_key(|(offset, _)| *offset);

        let mut last_end = None;
        for tok_ref in &tokens_in_order {
            let Some(tok) = tree.token(*tok_ref) else { continue };

            if let Some(prev_end) = last_end {
                if tok.range.start.offset < prev_end {
                    warn!(
                        offset = tok.range.start.offset,
                        "overlapping tokens detected while building syntax index"
                    );
                }
            }

            last_end = Some(tok.range.end.offset);
        }

        Self {
            tokens_in_order,
            token_to_parent,
            hint_candidates,
        }
    }

    fn walk(
        tree: &SyntaxTree,
        node_ref: NodeRef,
        tokens_in_order: &mut Vec<TokenRef>,
        token_to_parent: &mut std::collections::HashMap<TokenRef, NodeRef>,
        hint_candidates: &mut Vec<(usize, NodeRef)>,
    ) {
        let Some(node) = tree.node(node_ref) else { return };

        if node.kind.is_hint_candidate() {
            if let Some(start_offset) = Self::first_token_offset(tree, node_ref) {
                hint_candidates.push((start_offset, node_ref));
            }
        }

        for child in &node.children {
            match child {
                Child::Token(tok_ref) => {
                    let Some(tok) = tree.token(*tok_ref) else { continue };

                    if tok.kind == TokenKind::Placeholder {
                        continue;
                    }
                    if tok.range.buffer() != tree.primary_buffer() {
                        continue;
                    }

                    tokens_in_order.push(*tok_ref);
                    token_to_parent.insert(*tok_ref, node_ref);

                    // Directive trivia: walk its own syntax and rewrite parent
                    // pointers to this node, so a scoped lookup starting from a
                    // macro-argument token lands in the surrounding statement
                    // rather than the directive itself.
                    if tok.kind == TokenKind::Directive || tok.kind == TokenKind::MacroUsage {
                        Self::rewrite_directive_parents(tree, node_ref, token_to_parent);
                    }
                }

                Child::Node(child_ref) => {
                    Self::walk(tree, *child_ref, tokens_in_order, token_to_parent, hint_candidates);
                }
            }
        }
    }

    fn rewrite_directive_parents(
        tree: &SyntaxTree,
        decorated_by: NodeRef,
        token_to_parent: &mut std::collections::HashMap<TokenRef, NodeRef>,
    ) {
        let Some(node) = tree.node(decorated_by) else { return };

        if !matches!(
            node.kind,
            SyntaxKind::IncludeDirective | SyntaxKind::DefineDirective | SyntaxKind::UndefDirective | SyntaxKind::MacroUsage
        ) {
            return;
        }

        for tok in node.child_tokens() {
            token_to_parent.insert(tok, decorated_by);
        }
    }

    fn first_token_offset(tree: &SyntaxTree, node_ref: NodeRef) -> Option<usize> {
        let node = tree.node(node_ref)?;

        for child in &node.children {
            match child {
                Child::Token(tok_ref) => return tree.token(*tok_ref).map(|t| t.range.start.offset),
                Child::Node(child_ref) => {
                    if let Some(offset) = Self::first_token_offset(tree, *child_ref) {
                        return Some(offset);
                    }
                }
            }
        }

        None
    }

    pub fn tokens_in_order(&self) -> &[TokenRef] {
        &self.tokens_in_order
    }

    pub fn token_to_parent(&self, tok: TokenRef) -> Option<NodeRef> {
        self.token_to_parent.get(&tok).copied()
    }

    pub fn hint_candidates(&self) -> &[(usize, NodeRef)] {
        &self.hint_candidates
    }

    /// Largest index `i` such that `tokens_in_order[i]`'s start offset is `<=
    /// loc`'s offset, or `None` if `loc` precedes every token or names a
    /// different buffer than the one this index was built over.
    pub fn token_index_before(&self, tree: &SyntaxTree, loc: SourceLocation) -> Option<usize> {
        if loc.buffer != tree.primary_buffer() {
            return None;
        }

        let mut lo = 0usize;
        let mut hi = self.tokens_in_order.len();

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let start = tree.token(self.tokens_in_order[mid]).map(|t| t.range.start.offset).unwrap_or(0);

            if start <= loc.offset {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }

        if lo == 0 {
            None
        } else {
            Some(lo - 1)
        }
    }

    pub fn get_token_at(&self, tree: &SyntaxTree, loc: SourceLocation) -> Option<TokenRef> {
        let idx = self.token_index_before(tree, loc)?;
        let tok_ref = self.tokens_in_order[idx];
        let tok = tree.token(tok_ref)?;

        if tok.range.contains(&loc) {
            Some(tok_ref)
        } else {
            None
        }
    }

    /// The nearest word-like token (Identifier, SystemIdentifier, Directive,
    /// MacroUsage) whose range contains `loc`. If `loc` sits exactly at the end
    /// boundary of an identifier and the following token is not itself a word,
    /// the identifier is returned anyway — editor cursors live between
    /// characters, not on top of them.
    pub fn get_word_token_at(&self, tree: &SyntaxTree, loc: SourceLocation) -> Option<TokenRef> {
        let idx = self.token_index_before(tree, loc)?;
        let tok_ref = self.tokens_in_order[idx];
        let tok = tree.token(tok_ref)?;

        if tok.kind.is_word() && tok.range.contains_inclusive(&loc) {
            return Some(tok_ref);
        }

        if idx + 1 < self.tokens_in_order.len() {
            let next_ref = self.tokens_in_order[idx + 1];
            if let Some(next) = tree.token(next_ref) {
                if next.kind.is_word() && next.range.contains(&loc) {
                    return Some(next_ref);
                }
            }
        }

        None
    }

    /// If `loc` falls inside a token, that token's parent node. If `loc` falls
    /// between two tokens, the lowest common ancestor of both tokens' parent
    /// chains. `None` at or past the end of the last token.
    pub fn get_syntax_at(&self, tree: &SyntaxTree, loc: SourceLocation) -> Option<NodeRef> {
        let idx = self.token_index_before(tree, loc)?;
        let tok_ref = self.tokens_in_order[idx];
        let tok = tree.token(tok_ref)?;

        if tok.range.contains(&loc) {
            return self.token_to_parent(tok_ref);
        }

        let next_ref = self.tokens_in_order.get(idx + 1).copied()?;
        let left_parent = self.token_to_parent(tok_ref)?;
        let right_parent = self.token_to_parent(next_ref)?;

        Some(self.lowest_common_ancestor(tree, left_parent, right_parent))
    }

    fn lowest_common_ancestor(&self, tree: &SyntaxTree, a: NodeRef, b: NodeRef) -> NodeRef {
        let mut a_chain = Vec::new();
        let mut cur = a;
        loop {
            a_chain.push(cur);
            let Some(node) = tree.node(cur) else { break };
            let parent = node.parent();
            if parent.is_nil() || parent == cur {
                break;
            }
            cur = parent;
        }

        let mut cur = b;
        loop {
            if a_chain.contains(&cur) {
                return cur;
            }

            let Some(node) = tree.node(cur) else { break };
            let parent = node.parent();
            if parent.is_nil() || parent == cur {
                break;
            }
            cur = parent;
        }

        tree.root()
    }
}
