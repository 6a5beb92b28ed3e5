use crate::arena::Identifiable;
use crate::source::{SourceManager, SourceRange};
use crate::syntax::SyntaxTree;

/// One navigable `` `include `` reference: the quoted filename's range in the
/// primary buffer, and where it resolves to.
pub struct DocumentLink {
    pub range: SourceRange,
    pub target: LinkTarget,
}

/// An include target is a file URI when the source manager could resolve a
/// path for the included buffer, otherwise a `buffer:<id>` pseudo-URI so the
/// link is still reportable for in-memory-only buffers (tests, unsaved
/// scratch content).
pub enum LinkTarget {
    File(String),
    Buffer(String),
}

impl LinkTarget {
    pub fn as_str(&self) -> &str {
        match self {
            LinkTarget::File(s) | LinkTarget::Buffer(s) => s,
        }
    }
}

/// §4.4.3: one link per `` `include `` directive whose filename token lives in
/// the primary buffer, pointing at the buffer the directive resolved into.
pub fn collect_document_links(tree: &SyntaxTree, source_manager: &SourceManager) -> Vec<DocumentLink> {
    let mut out = Vec::new();

    for include in tree.include_directives() {
        let Some(tok) = tree.token(include.filename_token) else { continue };

        if tok.range.buffer() != tree.primary_buffer() {
            continue;
        }

        let target = match source_manager.path_of(include.included_buffer) {
            Some(path) => LinkTarget::File(format!("file://{}", path.display())),
            None => LinkTarget::Buffer(format!("buffer:{}", include.included_buffer.id().into_inner())),
        };

        out.push(DocumentLink { range: tok.range, target });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse;
    use std::io::Write;

    #[test]
    fn include_directive_links_to_resolved_buffer() {
        let dir = std::env::temp_dir().join("sv_shallow_core_links_test");
        std::fs::create_dir_all(&dir).unwrap();
        let included_path = dir.join("leaf.svh");
        let mut f = std::fs::File::create(&included_path).unwrap();
        writeln!(f, "// empty").unwrap();

        let source_manager = SourceManager::new();
        let text = "`include \"leaf.svh\"\nmodule top(); endmodule\n";
        let buffer = source_manager.assign_text(dir.join("top.sv"), text);
        let tree = parse(buffer, text, Some(&source_manager), dir.clone());

        let links = collect_document_links(&tree, &source_manager);
        assert_eq!(links.len(), 1);
        assert!(links[0].target.as_str().contains("leaf.svh"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
