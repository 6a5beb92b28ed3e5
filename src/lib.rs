//! A per-document analysis core for a SystemVerilog language server.
//!
//! Owns source text ([`source`]), lexing and parsing ([`lexis`], [`syntax`]),
//! a shallow elaborator and symbol indexer ([`symbols`]), and the editor-
//! facing queries built on top of them ([`analysis`]): symbol-at-location
//! lookups, document outline, include links, inlay hints, and diagnostics.
//! [`document`] ties a buffer's lifecycle (edits, reloads, lazy re-parse and
//! re-analysis) to those queries; [`driver`] is the seam a host implements to
//! supply cross-document dependencies; [`query`] is the surface a host
//! actually calls.

pub mod analysis;
pub mod arena;
pub mod document;
pub mod driver;
pub mod error;
pub mod lexis;
pub mod query;
pub mod source;
pub mod symbols;
pub mod syntax;

pub use document::Document;
pub use driver::DocumentDriver;
pub use error::CoreError;
