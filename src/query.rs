//! The query surface a host (an LSP layer, a batch tool) drives one
//! [`Document`] through (§6, "Query surface exposed by the core to clients").
//!
//! Every function here takes the `&mut Document` it queries plus the
//! [`DocumentDriver`] that supplies its dependencies, and triggers whatever
//! lazy (re)parse/(re)analysis the document needs before answering.

use crate::analysis::{
    build_macro_table, collect_document_links, collect_document_symbols, collect_inlay_hints, Diagnostic, DocumentLink, InlayHint,
    InlayHintConfig, OutlineEntry,
};
use crate::document::Document;
use crate::driver::DocumentDriver;
use crate::source::{SourceLocation, SourceRange};

/// `goToDefinition`'s result: the range the resolved symbol was declared at.
/// Declarations are tracked as single points, so this is always zero-width;
/// the host widens it to a token's extent if it wants one.
pub struct DefinitionTarget {
    pub range: SourceRange,
}

/// `documentSymbols(uri) -> outline tree`.
pub fn document_symbols(doc: &mut Document, include_macros: bool) -> Vec<OutlineEntry> {
    let tree = doc.get_syntax_tree();
    let macros = build_macro_table(tree);
    collect_document_symbols(tree, &macros, include_macros)
}

/// `documentLinks(uri) -> list of (range, target URI)`.
pub fn document_links(doc: &mut Document, driver: &dyn DocumentDriver) -> Vec<DocumentLink> {
    let tree = doc.get_syntax_tree();
    collect_document_links(tree, driver.source_manager())
}

/// `goToDefinition(uri, position) -> list of (targetURI, targetRange)`,
/// modeled as a single target since this core resolves exactly one symbol per
/// token (§4.4.2).
pub fn go_to_definition(doc: &mut Document, driver: &dyn DocumentDriver, loc: SourceLocation) -> Option<DefinitionTarget> {
    let (tree, analysis) = doc.get_analysis_with_tree(driver, false);
    let symbol_ref = analysis.get_symbol_at(tree, loc)?;
    let symbol = analysis.compilation().symbol(symbol_ref)?;

    Some(DefinitionTarget {
        range: SourceRange::new(symbol.declaration, symbol.declaration),
    })
}

/// `hover(uri, position) -> markdown content | none`.
pub fn hover(doc: &mut Document, driver: &dyn DocumentDriver, loc: SourceLocation) -> Option<String> {
    let (tree, analysis) = doc.get_analysis_with_tree(driver, false);
    analysis.get_hover(tree, loc)
}

/// `inlayHints(uri, range, config) -> list of hints`.
pub fn inlay_hints(doc: &mut Document, driver: &dyn DocumentDriver, lo: usize, hi: usize, config: &InlayHintConfig) -> Vec<InlayHint> {
    let (tree, analysis) = doc.get_analysis_with_tree(driver, false);
    collect_inlay_hints(analysis, driver.source_manager(), tree, lo, hi, config)
}

/// `references(uri, position) -> list of locations within one document`, via
/// `addLocalReferences`.
pub fn references(doc: &mut Document, driver: &dyn DocumentDriver, loc: SourceLocation) -> Vec<SourceLocation> {
    let (tree, analysis) = doc.get_analysis_with_tree(driver, false);

    let Some(symbol_ref) = analysis.get_symbol_at(tree, loc) else {
        return Vec::new();
    };
    let Some(symbol) = analysis.compilation().symbol(symbol_ref) else {
        return Vec::new();
    };

    let target_loc = symbol.declaration;
    let target_name = symbol.name.clone();

    let mut out = Vec::new();
    analysis.add_local_references(tree, target_loc, &target_name, &mut out);
    out
}

/// `publishDiagnostics(uri) -> list of diagnostics`.
pub fn publish_diagnostics(doc: &mut Document) -> Vec<Diagnostic> {
    doc.issue_diagnostics()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisOptions;
    use crate::source::SourceManager;
    use crate::syntax::SyntaxTree;

    struct NoDeps {
        source_manager: SourceManager,
    }

    impl DocumentDriver for NoDeps {
        fn get_dependent_docs(&self, _tree: &SyntaxTree) -> Vec<Document> {
            Vec::new()
        }

        fn source_manager(&self) -> &SourceManager {
            &self.source_manager
        }

        fn options(&self) -> AnalysisOptions {
            AnalysisOptions::default()
        }
    }

    #[test]
    fn go_to_definition_resolves_instance_type_token() {
        let source_manager = SourceManager::new();
        let text = "module leaf(); endmodule\nmodule top(); leaf u_leaf(); endmodule\n";
        let mut doc = Document::from_text(&source_manager, "top.sv", text);
        let driver = NoDeps { source_manager: source_manager.clone() };

        let offset = text.rfind("leaf u_leaf").unwrap();
        let loc = SourceLocation::new(doc.buffer(), offset);

        let target = go_to_definition(&mut doc, &driver, loc).expect("definition found");
        assert!(!target.range.start.is_nil());
    }

    #[test]
    fn document_symbols_lists_top_level_module() {
        let source_manager = SourceManager::new();
        let mut doc = Document::from_text(&source_manager, "top.sv", "module top(); endmodule\n");

        let outline = document_symbols(&mut doc, false);
        assert_eq!(outline.len(), 1);
        assert_eq!(outline[0].name, "top");
    }

    #[test]
    fn publish_diagnostics_surfaces_parse_errors() {
        let source_manager = SourceManager::new();
        let mut doc = Document::from_text(&source_manager, "top.sv", "module top(); @@@ endmodule\n");
        assert!(!publish_diagnostics(&mut doc).is_empty());
    }
}
