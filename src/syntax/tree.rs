use crate::arena::{Id, Identifiable, Repo};
use crate::lexis::{Token, TokenRef};
use crate::source::BufferId;

use super::node::{NodeRef, SyntaxNode};

/// One `` `include `` directive discovered while parsing a [`SyntaxTree`].
#[derive(Clone, Copy, Debug)]
pub struct IncludeDirectiveRecord {
    /// The directive's own syntax node (kind `IncludeDirective`).
    pub node: NodeRef,
    /// The token holding the quoted filename.
    pub filename_token: TokenRef,
    /// The buffer the included file was parsed into.
    pub included_buffer: BufferId,
}

/// Owns one parsed buffer plus every sub-buffer introduced by its
/// `` `include `` directives.
///
/// This is the in-crate analogue of the "external parser" seam named in §6 of
/// the expanded design: the [`crate::syntax::parse`] entry point is what a
/// production system would instead get back from a call into a standalone
/// SystemVerilog front end. Tokens and nodes are owned by this tree's arenas;
/// [`TokenRef`]/[`NodeRef`] handles into them are valid only as long as this
/// tree (or a clone of the `Arc` wrapping it, if shared) is alive, matching
/// the "all tokens and nodes reachable from the root live as long as the
/// tree" invariant in §3.
pub struct SyntaxTree {
    id: Id,
    primary_buffer: BufferId,
    tokens: Repo<Token>,
    nodes: Repo<SyntaxNode>,
    root: NodeRef,
    source_buffers: Vec<BufferId>,
    includes: Vec<IncludeDirectiveRecord>,
    defines: Vec<NodeRef>,
}

impl Identifiable for SyntaxTree {
    fn id(&self) -> Id {
        self.id
    }
}

impl SyntaxTree {
    pub(crate) fn new(
        primary_buffer: BufferId,
        tokens: Repo<Token>,
        nodes: Repo<SyntaxNode>,
        root: NodeRef,
        source_buffers: Vec<BufferId>,
        includes: Vec<IncludeDirectiveRecord>,
        defines: Vec<NodeRef>,
    ) -> Self {
        Self {
            id: Id::new(),
            primary_buffer,
            tokens,
            nodes,
            root,
            source_buffers,
            includes,
            defines,
        }
    }

    pub fn primary_buffer(&self) -> BufferId {
        self.primary_buffer
    }

    pub fn root(&self) -> NodeRef {
        self.root
    }

    pub fn source_buffer_ids(&self) -> &[BufferId] {
        &self.source_buffers
    }

    pub fn include_directives(&self) -> &[IncludeDirectiveRecord] {
        &self.includes
    }

    pub fn defined_macros(&self) -> &[NodeRef] {
        &self.defines
    }

    pub fn token(&self, token_ref: TokenRef) -> Option<&Token> {
        self.tokens.get(&token_ref.0)
    }

    pub fn node(&self, node_ref: NodeRef) -> Option<&SyntaxNode> {
        self.nodes.get(&node_ref.0)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub(crate) fn tokens(&self) -> &Repo<Token> {
        &self.tokens
    }

    pub(crate) fn nodes(&self) -> &Repo<SyntaxNode> {
        &self.nodes
    }
}
