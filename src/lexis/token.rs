use crate::source::SourceRange;

/// The closed set of lexical categories this crate's scanner produces.
///
/// Mirrors the taxonomy named throughout the design's data model (§3): word
/// tokens the editor treats as navigable (`Identifier`, `SystemIdentifier`,
/// `Directive`, `MacroUsage`), plus the remaining lexical categories needed to
/// drive the parser and the inlay hint collector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    /// A `$`-prefixed system task/function name (`$display`, `$bits`, ...).
    SystemIdentifier,
    Keyword,
    /// The name of a backtick directive (`` `include ``, `` `define ``, `` `undef ``).
    Directive,
    /// A backtick-prefixed macro invocation (`` `FOO `` or `` `FOO(a, b) ``).
    MacroUsage,
    IntLiteral,
    RealLiteral,
    StringLiteral,
    /// `(`, `)`, `{`, `}`, `[`, `]`, `;`, `,`, `.`, `::`, `#`, `@`, and every
    /// other multi- or single-character operator/punctuation symbol.
    Operator,
    Whitespace,
    Comment,
    /// A zero-width token inserted by error recovery; never returned from
    /// [`SyntaxIndexer::tokens_in_order`](crate::syntax::SyntaxIndexer::tokens_in_order).
    Placeholder,
    Eof,
}

impl TokenKind {
    /// Identifier, SystemIdentifier, Directive, or MacroUsage: the token
    /// kinds the editor treats as a navigable "word" (§ Glossary).
    pub fn is_word(self) -> bool {
        matches!(
            self,
            TokenKind::Identifier | TokenKind::SystemIdentifier | TokenKind::Directive | TokenKind::MacroUsage
        )
    }

    pub fn is_trivia(self) -> bool {
        matches!(self, TokenKind::Whitespace | TokenKind::Comment)
    }
}

/// One lexeme produced by the scanner.
///
/// Tokens are owned by the [`SyntaxTree`](crate::syntax::SyntaxTree)'s token
/// repository and referenced elsewhere by [`TokenRef`]; there is no borrowed
/// variant, which sidesteps the self-referential-tree problem the teacher
/// solves with raw parent pointers.
#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub range: SourceRange,
    /// The exact source bytes, including surrounding quotes/backticks.
    pub raw: Box<str>,
    /// The value an indexer should compare identifiers against: `raw` with
    /// decoration (leading backtick, surrounding quotes) stripped.
    pub value: Box<str>,
}

impl Token {
    pub fn new(kind: TokenKind, range: SourceRange, raw: impl Into<Box<str>>, value: impl Into<Box<str>>) -> Self {
        Self {
            kind,
            range,
            raw: raw.into(),
            value: value.into(),
        }
    }
}

/// A weak reference to a [`Token`] owned by some [`SyntaxTree`](crate::syntax::SyntaxTree).
///
/// Valid only against the tree it was produced from; holding one does not
/// extend that tree's lifetime, so callers that need the token to stay
/// resolvable must also hold (or otherwise keep alive) the tree, typically via
/// a [`RetainGuard`](crate::source::RetainGuard).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct TokenRef(pub(crate) crate::arena::Entry);

impl TokenRef {
    pub const fn nil() -> Self {
        Self(crate::arena::Entry::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}
