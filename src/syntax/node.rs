use std::cell::Cell;

use crate::lexis::TokenRef;
use crate::source::SourceRange;

/// The closed set of concrete-syntax node kinds this crate's parser produces.
///
/// Per the design notes (§9 "Tagged variants over inheritance"), this replaces
/// what a class-hierarchy-based front end would model as a type per syntax
/// production; every visitor in this crate dispatches on this enum with a
/// `match` instead of virtual calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    SourceFile,
    Unknown,

    ModuleDeclaration,
    ExternModuleDecl,
    InterfaceDeclaration,
    PackageDeclaration,
    ClassDeclaration,
    FunctionDeclaration,
    TaskDeclaration,

    GenerateBlock,

    HierarchyInstantiation,
    HierarchicalInstance,
    OrderedPortConnection,
    NamedPortConnection,
    WildcardPortConnection,
    OrderedParamAssignment,
    NamedParamAssignment,
    ParameterValueAssignmentList,
    PortConnectionList,

    NetDeclaration,
    LocalVariableDeclaration,
    DataDeclaration,
    Declarator,

    PortDeclaration,
    ImplicitAnsiPort,
    DotMemberClause,

    ParameterDeclaration,
    ParameterDeclarator,

    PackageImportDeclaration,
    PackageExportDeclaration,
    PackageImportItem,

    IncludeDirective,
    DefineDirective,
    UndefDirective,

    MacroUsage,
    MacroActualArgumentList,
    MacroActualArgument,
    TokenList,

    FormalArgumentList,

    InvocationExpression,
    ClassName,

    IdentifierName,
    ScopedName,
    MemberSelector,
    IndexSelector,

    AttributeSpec,
    SuperHandle,
}

impl SyntaxKind {
    /// Kinds the inlay hint collector pulls into
    /// [`hint_candidates`](super::SyntaxIndexer::hint_candidates).
    pub fn is_hint_candidate(self) -> bool {
        matches!(
            self,
            SyntaxKind::HierarchyInstantiation
                | SyntaxKind::InvocationExpression
                | SyntaxKind::MacroUsage
                | SyntaxKind::ClassName
        )
    }

    /// `IdentifierName` or `ScopedName`: syntax that names a symbol reference,
    /// as opposed to syntax that merely contains one.
    pub fn is_name_syntax(self) -> bool {
        matches!(self, SyntaxKind::IdentifierName | SyntaxKind::ScopedName)
    }

    /// Kinds that `getSymbolAtToken` (§4.4.2 step 2) refuses to resolve
    /// through, because their tokens never name a reachable symbol.
    pub fn blocks_lookup(self) -> bool {
        matches!(self, SyntaxKind::SuperHandle | SyntaxKind::AttributeSpec)
    }
}

/// One child of a [`SyntaxNode`]: either a nested node or a leaf token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Child {
    Node(NodeRef),
    Token(TokenRef),
}

/// A weak reference to a [`SyntaxNode`] owned by some [`SyntaxTree`](super::SyntaxTree).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeRef(pub(crate) crate::arena::Entry);

impl NodeRef {
    pub const fn nil() -> Self {
        Self(crate::arena::Entry::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

/// A node in the concrete syntax graph.
///
/// The `parent` field is a mutable back-pointer rather than part of the
/// construction-time shape, because the syntax indexer patches it for
/// directive-adjacent nodes during its single indexing pass (§4.2 step 3).
/// The design notes (§9) call out that this is the one place a safe
/// reimplementation must be careful not to share across threads; `Cell` gives
/// interior mutability without that hazard spreading beyond this one field.
pub struct SyntaxNode {
    pub kind: SyntaxKind,
    pub children: Vec<Child>,
    pub range: SourceRange,
    parent: Cell<NodeRef>,
    /// Free-form name slot set by the parser for nodes whose logical name
    /// isn't simply "first identifier child" (e.g. an anonymous generate
    /// block label, or a module's header name when the header has several
    /// identifier-shaped children).
    pub name_token: Option<TokenRef>,
}

impl SyntaxNode {
    pub fn new(kind: SyntaxKind, range: SourceRange, children: Vec<Child>) -> Self {
        Self {
            kind,
            children,
            range,
            parent: Cell::new(NodeRef::nil()),
            name_token: None,
        }
    }

    pub fn with_name_token(mut self, token: TokenRef) -> Self {
        self.name_token = Some(token);
        self
    }

    pub fn parent(&self) -> NodeRef {
        self.parent.get()
    }

    pub fn set_parent(&self, parent: NodeRef) {
        self.parent.set(parent);
    }

    pub fn child_nodes(&self) -> impl Iterator<Item = NodeRef> + '_ {
        self.children.iter().filter_map(|c| match c {
            Child::Node(n) => Some(*n),
            Child::Token(_) => None,
        })
    }

    pub fn child_tokens(&self) -> impl Iterator<Item = TokenRef> + '_ {
        self.children.iter().filter_map(|c| match c {
            Child::Token(t) => Some(*t),
            Child::Node(_) => None,
        })
    }
}
