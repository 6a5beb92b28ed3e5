//! End-to-end scenarios and cross-module invariants driven entirely through
//! the public `Document`/`query` surface.

use sv_shallow_core::analysis::{AnalysisOptions, InlayHintConfig};
use sv_shallow_core::document::{Document, TextChange};
use sv_shallow_core::driver::DocumentDriver;
use sv_shallow_core::query;
use sv_shallow_core::source::{SourceLocation, SourceManager};
use sv_shallow_core::syntax::{parse, SyntaxIndexer, SyntaxTree};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

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

fn driver_for(source_manager: &SourceManager) -> NoDeps {
    NoDeps { source_manager: source_manager.clone() }
}

// --- Universal invariant: line/column round-trip (property 1) ---

#[test]
fn line_column_round_trips_over_every_position() {
    let source_manager = SourceManager::new();
    let text = "module top();\n  wire a;\nendmodule\n";
    let buffer = source_manager.assign_text("top.sv", text);

    for (line_idx, line_text) in text.lines().enumerate() {
        let line = line_idx + 1;
        for col in 1..=line_text.chars().count() + 1 {
            let loc = source_manager.get_source_location(buffer, line, col).unwrap();
            assert_eq!(source_manager.get_line_number(loc).unwrap(), line);
            assert_eq!(source_manager.get_column_number(loc).unwrap(), col);
        }
    }
}

// --- Universal invariant: token non-overlap (property 2) ---

#[test]
fn tokens_in_order_never_overlap() {
    let source_manager = SourceManager::new();
    let text = "module top(); wire [7:0] data; assign data = 8'hFF; endmodule\n";
    let buffer = source_manager.assign_text("top.sv", text);
    let tree = parse(buffer, text, Some(&source_manager), std::path::PathBuf::from("."));
    let index = SyntaxIndexer::build(&tree);

    let mut prev_end: Option<usize> = None;
    for &tok_ref in index.tokens_in_order() {
        let tok = tree.token(tok_ref).expect("indexed token must resolve");
        assert!(tok.range.start.offset < tok.range.end.offset, "token must have non-empty range");

        if let Some(end) = prev_end {
            assert!(tok.range.start.offset >= end, "adjacent tokens must not overlap");
        }
        prev_end = Some(tok.range.end.offset);
    }
}

// --- Universal invariant: getSymbolAtToken idempotence (property 4) ---

#[test]
fn get_symbol_at_token_is_idempotent() {
    let source_manager = SourceManager::new();
    let text = "module leaf(); endmodule\nmodule top(); leaf u_leaf(); endmodule\n";
    let mut doc = Document::from_text(&source_manager, "top.sv", text);
    let driver = driver_for(&source_manager);

    let offset = text.rfind("leaf u_leaf").unwrap();
    let loc = SourceLocation::new(doc.buffer(), offset);

    let first = query::go_to_definition(&mut doc, &driver, loc).map(|t| t.range);
    let second = query::go_to_definition(&mut doc, &driver, loc).map(|t| t.range);

    match (first, second) {
        (Some(a), Some(b)) => assert_eq!((a.start, a.end), (b.start, b.end)),
        (None, None) => {}
        _ => panic!("idempotence requires both calls to agree on presence"),
    }
}

// --- Scenario: go-to-definition on a named port connection ---

#[test]
fn go_to_definition_resolves_named_port_connection() {
    let source_manager = SourceManager::new();
    let text = "module leaf(input clk); endmodule\nmodule top(input clk); leaf u_leaf(.clk(clk)); endmodule\n";
    let mut doc = Document::from_text(&source_manager, "top.sv", text);
    let driver = driver_for(&source_manager);

    let offset = text.rfind(".clk(clk)").unwrap() + 1;
    let loc = SourceLocation::new(doc.buffer(), offset);

    let target = query::go_to_definition(&mut doc, &driver, loc);
    assert!(target.is_some(), "named port connection should resolve to leaf's port declaration");
}

// --- Scenario: go-to-definition on an ordered parameter assignment ---

#[test]
fn go_to_definition_resolves_ordered_instance_type() {
    let source_manager = SourceManager::new();
    let text = "module leaf #(parameter WIDTH = 1) (); endmodule\nmodule top(); leaf #(8) u_leaf(); endmodule\n";
    let mut doc = Document::from_text(&source_manager, "top.sv", text);
    let driver = driver_for(&source_manager);

    let offset = text.rfind("leaf #(8)").unwrap();
    let loc = SourceLocation::new(doc.buffer(), offset);

    let target = query::go_to_definition(&mut doc, &driver, loc);
    assert!(target.is_some(), "instance type token should resolve to leaf's definition");
}

// --- Scenario: macro argument ---

#[test]
fn document_symbols_reports_macro_define_as_constant_when_requested() {
    let source_manager = SourceManager::new();
    let text = "`define WIDTH 8\nmodule top(); endmodule\n";
    let mut doc = Document::from_text(&source_manager, "top.sv", text);

    let without_macros = query::document_symbols(&mut doc, false);
    assert_eq!(without_macros.len(), 1);

    let with_macros = query::document_symbols(&mut doc, true);
    assert!(with_macros.iter().any(|e| e.name == "WIDTH"));
}

// --- Scenario: edit-then-query ---

#[test]
fn edit_then_query_observes_the_new_text() {
    let source_manager = SourceManager::new();
    let mut doc = Document::from_text(&source_manager, "top.sv", "module top(); endmodule\n");
    let driver = driver_for(&source_manager);

    assert_eq!(query::document_symbols(&mut doc, false)[0].name, "top");

    doc.on_change(&[TextChange {
        start_line: 1,
        start_column: 8,
        end_line: 1,
        end_column: 11,
        text: "renamed".to_string(),
    }])
    .unwrap();

    let outline = query::document_symbols(&mut doc, false);
    assert_eq!(outline[0].name, "renamed");

    // The analysis must also pick up the edit once rebuilt.
    let _ = doc.get_analysis(&driver, false);
}

// --- Scenario: wildcard inlay expansion ---

#[test]
fn wildcard_connection_produces_inlay_hint_with_expansion_edit() {
    init_tracing();

    let source_manager = SourceManager::new();
    let text = "module leaf(input clk, output q); endmodule\nmodule top(input clk, output q); leaf u_leaf(.*); endmodule\n";
    let mut doc = Document::from_text(&source_manager, "top.sv", text);
    let driver = driver_for(&source_manager);

    let hints = query::inlay_hints(&mut doc, &driver, 0, text.len(), &InlayHintConfig::default());

    let wildcard_hint = hints.iter().find(|h| h.edit.is_some());
    let hint = wildcard_hint.expect("wildcard connection should produce an expansion hint");
    let edit = hint.edit.as_ref().unwrap();
    assert!(edit.replacement.contains(".clk(clk)"));
    assert!(edit.replacement.contains(".q(q)"));
}

// --- Universal invariant: hint ordering and range containment (property 7) ---

#[test]
fn inlay_hints_are_ordered_and_within_range() {
    let source_manager = SourceManager::new();
    let text = "module leaf(input clk, output q); endmodule\nmodule top(input clk, output q); leaf u_leaf(.clk(clk), .q(q)); endmodule\n";
    let mut doc = Document::from_text(&source_manager, "top.sv", text);
    let driver = driver_for(&source_manager);

    let lo = text.find("u_leaf").unwrap();
    let hi = text.len();
    let hints = query::inlay_hints(&mut doc, &driver, lo, hi, &InlayHintConfig::default());

    let mut prev_offset = 0;
    for hint in &hints {
        assert!(hint.offset >= prev_offset, "hints must be sorted by offset");
        prev_offset = hint.offset;
    }
}

// --- Diagnostics wiring ---

#[test]
fn publish_diagnostics_round_trips_through_document() {
    let source_manager = SourceManager::new();
    let mut doc = Document::from_text(&source_manager, "top.sv", "module top(); @@@ endmodule\n");
    assert!(!query::publish_diagnostics(&mut doc).is_empty());

    let mut clean = Document::from_text(&source_manager, "clean.sv", "module top(); endmodule\n");
    assert!(query::publish_diagnostics(&mut clean).is_empty());
}
