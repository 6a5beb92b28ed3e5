//! Shallow elaboration: a [`Compilation`] of [`Symbol`]s built from a primary
//! [`crate::syntax::SyntaxTree`] and its dependency trees, plus the
//! [`SymbolIndexer`] that maps syntax back to the symbols it declares or
//! names.

mod compilation;
mod elaborate;
mod index;
mod symbol;

pub use compilation::{Compilation, CompilationOptions, MAX_INSTANCE_DEPTH};
pub(crate) use elaborate::elaborate;
pub use index::SymbolIndexer;
pub use symbol::{MacroTable, Scope, Symbol, SymbolKind, SymbolRef};
