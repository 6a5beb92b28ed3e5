//! Shallow, per-document analysis built on top of a parsed [`crate::syntax::SyntaxTree`]
//! and its elaborated [`crate::symbols::Compilation`]: symbol-at-location
//! lookups, a document outline, include links, inlay hints, and diagnostics.

mod diagnostics;
mod document_symbols;
mod inlay;
mod links;
mod shallow;

pub use diagnostics::{collect_parse_diagnostics, issue_diagnostics, Diagnostic, Severity};
pub use document_symbols::{collect_document_symbols, OutlineEntry, OutlineKind};
pub use inlay::{collect_inlay_hints, InlayHint, InlayHintConfig, TextEdit};
pub use links::{collect_document_links, DocumentLink, LinkTarget};
pub(crate) use shallow::build_macro_table;
pub use shallow::{AnalysisOptions, ShallowAnalysis};
