//! Memory and identity primitives shared by the rest of the crate.
//!
//! [`Id`] gives every [`SourceManager`](crate::source::SourceManager) and every
//! [`SyntaxTree`](crate::syntax::SyntaxTree) a globally unique, process-local
//! identity so that weak references (buffer ids, node refs, token refs) can be
//! validated against the container they claim to belong to without storing a
//! pointer back to it. [`Repo`] is a generation-checked slot arena used to own
//! syntax nodes and tokens with O(1) insert/lookup and stable keys that survive
//! removal of unrelated entries.

mod entry;
mod id;
mod repo;

pub use entry::Entry;
pub use id::{Id, Identifiable};
pub use repo::Repo;
