//! Concrete syntax trees and the per-document index built over them.
//!
//! This is the in-crate stand-in for what the distilled design calls an
//! external parser library plus its companion syntax indexer: [`parse`]
//! builds a [`SyntaxTree`] from source text, and [`SyntaxIndexer`] builds the
//! token/hint lookup structures a [`crate::analysis::ShallowAnalysis`] needs
//! on top of it.

mod index;
mod node;
mod parser;
mod tree;

pub use index::SyntaxIndexer;
pub use node::{Child, NodeRef, SyntaxKind, SyntaxNode};
pub use parser::parse;
pub(crate) use parser::parse_name_expression;
pub use tree::{IncludeDirectiveRecord, SyntaxTree};
