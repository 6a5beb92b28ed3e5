//! Owns source text buffers, buffer identity, and line/column and macro
//! expansion mappings.
//!
//! [`SourceManager`] is the one object in this crate meant to be shared:
//! every [`Document`](crate::document::Document) in a project holds a clone of
//! the same manager, and every [`ShallowAnalysis`](crate::analysis::shallow::ShallowAnalysis)
//! registers a [`RetainGuard`] against it for the lifetime of the trees it
//! borrows tokens and nodes from.

mod buffer;
mod location;
mod manager;
mod retain;

pub use location::{BufferId, ByteOffset, Column, Line, Position, SourceLocation, SourceRange};
pub use manager::{compute_line_offsets, MacroInfo, SourceManager};
pub use retain::RetainGuard;
