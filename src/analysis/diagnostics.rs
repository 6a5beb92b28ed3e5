use crate::source::{SourceManager, SourceRange};
use crate::syntax::{SyntaxKind, SyntaxTree};

/// Severity levels a diagnostic is reported at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

pub struct Diagnostic {
    pub severity: Severity,
    pub range: SourceRange,
    pub message: String,
}

/// §7's closed deny-list of semantic diagnostic kinds this shallow elaborator
/// must never surface — currently just the one kind named in the design
/// notes, index-out-of-bounds checks, which need real type/width evaluation
/// this crate's elaborator does not perform.
///
/// Unused for now: this elaborator produces no semantic diagnostics at all
/// (see `issue_diagnostics`), so nothing yet calls this. Kept as the hook a
/// real semantic pass would filter through.
#[allow(dead_code)]
fn is_denylisted(kind: &str) -> bool {
    matches!(kind, "index-out-of-bounds")
}

/// Parse diagnostics: one per `Unknown` node in the primary buffer, the
/// parser's error-recovery marker (§9, "error recovery").
pub fn collect_parse_diagnostics(tree: &SyntaxTree) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    walk(tree, tree.root(), &mut out);
    out
}

fn walk(tree: &SyntaxTree, node_ref: crate::syntax::NodeRef, out: &mut Vec<Diagnostic>) {
    let Some(node) = tree.node(node_ref) else { return };

    if node.kind == SyntaxKind::Unknown && node.range.buffer() == tree.primary_buffer() {
        out.push(Diagnostic {
            severity: Severity::Error,
            range: node.range,
            message: "unrecognized syntax".to_string(),
        });
    }

    for child in node.child_nodes() {
        walk(tree, child, out);
    }
}

/// §4.6 `issueDiagnostics`: parse diagnostics first, then semantic
/// diagnostics (currently none — this elaborator performs no real semantic
/// checks, only shallow symbol/scope construction), filtered to the primary
/// buffer via `getFullyOriginalLoc` and with denylisted kinds dropped.
pub fn issue_diagnostics(tree: &SyntaxTree, source_manager: &SourceManager) -> Vec<Diagnostic> {
    let mut out = collect_parse_diagnostics(tree);

    out.retain(|d| {
        let original = source_manager.get_fully_original_loc(d.range.start);
        original.buffer == tree.primary_buffer()
    });

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceManager;
    use crate::syntax::parse;

    #[test]
    fn malformed_source_produces_parse_diagnostic() {
        let source_manager = SourceManager::new();
        let text = "module top(); @@@ endmodule\n";
        let buffer = source_manager.assign_text("top.sv", text);
        let tree = parse(buffer, text, Some(&source_manager), std::path::PathBuf::from("."));

        let diags = issue_diagnostics(&tree, &source_manager);
        assert!(!diags.is_empty());
        assert_eq!(diags[0].severity, Severity::Error);
    }

    #[test]
    fn clean_source_has_no_diagnostics() {
        let source_manager = SourceManager::new();
        let text = "module top(); endmodule\n";
        let buffer = source_manager.assign_text("top.sv", text);
        let tree = parse(buffer, text, Some(&source_manager), std::path::PathBuf::from("."));

        assert!(issue_diagnostics(&tree, &source_manager).is_empty());
    }
}
