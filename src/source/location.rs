use std::fmt::{self, Debug, Display, Formatter};

use crate::arena::{Id, Identifiable};

/// A byte offset into one buffer's text.
pub type ByteOffset = usize;

/// A one-based line number. Line `1` is the first line.
pub type Line = usize;

/// A one-based column number, counted in UTF-8 bytes from the start of the
/// line. Column `1` is the first byte of the line.
pub type Column = usize;

/// Identifies one immutable snapshot of one source file.
///
/// Replacing a [`Document`](crate::document::Document)'s text through
/// [`SourceManager::replace_buffer`](super::SourceManager::replace_buffer)
/// allocates a fresh `BufferId`; the previous id becomes stale but is not
/// deallocated while anything still [retains](super::RetainGuard) it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct BufferId(Id);

impl Debug for BufferId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("BufferId({:?})", self.0))
    }
}

impl Identifiable for BufferId {
    fn id(&self) -> Id {
        self.0
    }
}

impl BufferId {
    pub(crate) fn new() -> Self {
        Self(Id::new())
    }

    /// A `BufferId` that never resolves to a live buffer.
    pub const fn nil() -> Self {
        Self(Id::nil())
    }

    pub const fn is_nil(self) -> bool {
        self.0.is_nil()
    }
}

/// A position in one buffer, expressed as a byte offset.
///
/// Two flavors of location appear throughout this crate: *expansion*
/// locations are where the editor displays a token; *originating* locations
/// are where that text was actually written, which can differ inside a macro
/// expansion (see [`SourceManager::get_fully_original_loc`](super::SourceManager::get_fully_original_loc)).
/// The type itself does not distinguish the two; the distinction is in which
/// map produced the value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceLocation {
    pub buffer: BufferId,
    pub offset: ByteOffset,
}

impl Debug for SourceLocation {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("{:?}@{}", self.buffer, self.offset))
    }
}

impl SourceLocation {
    pub const fn new(buffer: BufferId, offset: ByteOffset) -> Self {
        Self { buffer, offset }
    }

    pub const fn nil() -> Self {
        Self {
            buffer: BufferId::nil(),
            offset: 0,
        }
    }

    pub const fn is_nil(&self) -> bool {
        self.buffer.is_nil()
    }
}

/// A `[start, end)` span of a single buffer.
///
/// Both endpoints are expected to share a buffer; the invariant is upheld by
/// construction everywhere in this crate (the parser and the indexers never
/// build a cross-buffer range) rather than checked at this type's boundary.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceRange {
    pub start: SourceLocation,
    pub end: SourceLocation,
}

impl Debug for SourceRange {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!(
            "{:?}[{}..{}]",
            self.start.buffer, self.start.offset, self.end.offset
        ))
    }
}

impl SourceRange {
    pub const fn new(start: SourceLocation, end: SourceLocation) -> Self {
        Self { start, end }
    }

    pub fn buffer(&self) -> BufferId {
        self.start.buffer
    }

    pub fn contains(&self, loc: &SourceLocation) -> bool {
        loc.buffer == self.start.buffer && loc.offset >= self.start.offset && loc.offset < self.end.offset
    }

    /// Inclusive of the end boundary; useful for "cursor sits right after the
    /// last character" checks ([`getWordTokenAt`](crate::syntax::SyntaxIndexer::get_word_token_at)).
    pub fn contains_inclusive(&self, loc: &SourceLocation) -> bool {
        loc.buffer == self.start.buffer && loc.offset >= self.start.offset && loc.offset <= self.end.offset
    }

    pub fn len(&self) -> usize {
        self.end.offset.saturating_sub(self.start.offset)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn overlaps(&self, other: &SourceRange) -> bool {
        if self.start.buffer != other.start.buffer {
            return false;
        }

        self.start.offset < other.end.offset && other.start.offset < self.end.offset
    }
}

/// A one-based `(line, column)` index into a buffer's text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: Line,
    pub column: Column,
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("{}:{}", self.line, self.column))
    }
}

impl Position {
    pub const fn new(line: Line, column: Column) -> Self {
        Self { line, column }
    }
}
