//! The per-file editing and query surface built over a [`SyntaxTree`] and its
//! lazily-built [`ShallowAnalysis`].
//!
//! A [`Document`] owns one logical file: its current [`BufferId`], a lazily
//! (re)parsed tree, and a lazily (re)built analysis. Edits go through
//! [`Document::on_change`] or [`Document::reload_buffer`], both of which
//! invalidate the cached tree/analysis as their first visible effect, never
//! mutate a buffer's text in place.

use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::analysis::{self, AnalysisOptions, Diagnostic, ShallowAnalysis};
use crate::arena::Identifiable;
use crate::driver::DocumentDriver;
use crate::error::CoreError;
use crate::source::{BufferId, Column, Line, SourceManager};
use crate::syntax::{self, SyntaxTree};

/// One ordered text edit, as the host editor reports it: a `[start, end)`
/// line/column range to replace with `text`.
#[derive(Clone, Debug)]
pub struct TextChange {
    pub start_line: Line,
    pub start_column: Column,
    pub end_line: Line,
    pub end_column: Column,
    pub text: String,
}

pub struct Document {
    source_manager: SourceManager,
    base_dir: PathBuf,
    buffer: BufferId,
    tree: Option<SyntaxTree>,
    analysis: Option<ShallowAnalysis>,
}

impl Document {
    /// Registers `text` under `path` as a fresh buffer and wraps it.
    pub fn from_text(source_manager: &SourceManager, path: impl Into<PathBuf>, text: &str) -> Self {
        let path = path.into();
        let base_dir = parent_dir(&path);
        let buffer = source_manager.assign_text(path, text);

        Self {
            source_manager: source_manager.clone(),
            base_dir,
            buffer,
            tree: None,
            analysis: None,
        }
    }

    /// Reads `path` from disk through the source manager.
    pub fn from_path(source_manager: &SourceManager, path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let base_dir = parent_dir(path);
        let buffer = source_manager.read_source(path)?;

        Ok(Self {
            source_manager: source_manager.clone(),
            base_dir,
            buffer,
            tree: None,
            analysis: None,
        })
    }

    /// Wraps an already-parsed tree, skipping the first lazy reparse.
    pub fn from_tree(source_manager: &SourceManager, base_dir: impl Into<PathBuf>, tree: SyntaxTree) -> Self {
        Self {
            source_manager: source_manager.clone(),
            base_dir: base_dir.into(),
            buffer: tree.primary_buffer(),
            tree: Some(tree),
            analysis: None,
        }
    }

    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Applies `changes` in order against the current buffer text, publishing
    /// the combined result as a fresh [`BufferId`] via `replace_buffer`, and
    /// invalidates the cached tree and analysis as the first visible effect.
    #[instrument(skip_all, fields(buffer = ?self.buffer, changes = changes.len()))]
    pub fn on_change(&mut self, changes: &[TextChange]) -> Result<(), CoreError> {
        self.tree = None;
        self.analysis = None;

        let mut text = self
            .source_manager
            .text(self.buffer)
            .ok_or(CoreError::StaleBuffer { buffer: self.buffer.id() })?;

        for change in changes {
            let start = line_col_to_offset(&text, change.start_line, change.start_column)
                .ok_or(CoreError::InvalidRange { buffer: self.buffer.id() })?;
            let end = line_col_to_offset(&text, change.end_line, change.end_column)
                .ok_or(CoreError::InvalidRange { buffer: self.buffer.id() })?;

            if start > end || end > text.len() {
                return Err(CoreError::InvalidRange { buffer: self.buffer.id() });
            }

            text.replace_range(start..end, &change.text);
        }

        let new_buffer = self
            .source_manager
            .replace_buffer(self.buffer, &text)
            .ok_or(CoreError::StaleBuffer { buffer: self.buffer.id() })?;

        self.buffer = new_buffer;

        Ok(())
    }

    /// Re-reads the backing file into a fresh buffer id, discarding any
    /// uncommitted in-memory edits, and invalidates the cached tree/analysis.
    pub fn reload_buffer(&mut self) -> Result<(), CoreError> {
        self.tree = None;
        self.analysis = None;

        let path = self
            .source_manager
            .path_of(self.buffer)
            .ok_or(CoreError::StaleBuffer { buffer: self.buffer.id() })?;

        let text = std::fs::read_to_string(&path).map_err(|err| CoreError::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;

        let new_buffer = self
            .source_manager
            .replace_buffer(self.buffer, &text)
            .ok_or(CoreError::StaleBuffer { buffer: self.buffer.id() })?;

        self.buffer = new_buffer;

        Ok(())
    }

    /// Lazily (re)parses: reparses if no tree is cached yet, or if any buffer
    /// id the cached tree references has gone stale.
    pub fn get_syntax_tree(&mut self) -> &SyntaxTree {
        self.ensure_tree();
        self.tree.as_ref().expect("just populated")
    }

    fn ensure_tree(&mut self) {
        let stale = match &self.tree {
            None => true,
            Some(tree) => tree.source_buffer_ids().iter().any(|id| !self.source_manager.is_current(*id)),
        };

        if stale {
            self.analysis = None;

            let text = self
                .source_manager
                .text(self.buffer)
                .expect("document buffer must be current before reparsing");

            self.tree = Some(syntax::parse(
                self.buffer,
                &text,
                Some(&self.source_manager),
                self.base_dir.clone(),
            ));
        }
    }

    /// Lazily (re)builds the shallow analysis: rebuilds if missing, or if
    /// `refresh_deps` is set, or if the cached analysis no longer has valid
    /// buffers, fetching dependent trees from `driver`.
    pub fn get_analysis(&mut self, driver: &dyn DocumentDriver, refresh_deps: bool) -> &ShallowAnalysis {
        self.ensure_tree();

        let needs_rebuild = refresh_deps
            || match &self.analysis {
                None => true,
                Some(analysis) => {
                    let tree = self.tree.as_ref().expect("ensure_tree just populated");
                    !analysis.has_valid_buffers(&self.source_manager, &[tree])
                }
            };

        if needs_rebuild {
            let tree = self.tree.as_ref().expect("ensure_tree just populated");
            let mut deps = driver.get_dependent_docs(tree);
            // Each dependency must itself be parsed before it can be borrowed
            // for the compilation below.
            let dep_trees: Vec<&SyntaxTree> = deps.iter_mut().map(|d| d.get_syntax_tree()).collect();

            self.analysis = Some(ShallowAnalysis::new(&self.source_manager, tree, &dep_trees, driver.options()));
        }

        self.analysis.as_ref().expect("just populated")
    }

    /// Same as [`Document::get_analysis`], but also returns the tree it was
    /// built over — useful to callers (query functions) that need both and
    /// cannot call two `&mut self` methods in succession against one borrow.
    pub fn get_analysis_with_tree(&mut self, driver: &dyn DocumentDriver, refresh_deps: bool) -> (&SyntaxTree, &ShallowAnalysis) {
        self.get_analysis(driver, refresh_deps);
        (
            self.tree.as_ref().expect("get_analysis just populated"),
            self.analysis.as_ref().expect("get_analysis just populated"),
        )
    }

    /// Parse diagnostics, then shallow semantic diagnostics, both filtered to
    /// this document's primary buffer via `get_fully_original_loc`.
    pub fn issue_diagnostics(&mut self) -> Vec<Diagnostic> {
        let tree = self.get_syntax_tree();
        analysis::issue_diagnostics(tree, &self.source_manager)
    }

    /// Byte-for-byte comparison against the current buffer's raw text
    /// (including the trailing sentinel), used as a post-edit sanity check.
    pub fn text_matches(&self, text: &str) -> bool {
        self.source_manager.raw_text(self.buffer).as_deref() == Some(text)
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."))
}

/// Maps a `(line, column)` pair directly against `text`, independent of the
/// source manager, since edits beyond the first in one `on_change` batch
/// apply against an in-memory string that hasn't been registered as a buffer
/// yet. Mirrors `Buffer::location_of`'s 1-based line/column convention.
fn line_col_to_offset(text: &str, line: Line, column: Column) -> Option<usize> {
    if line == 0 || column == 0 {
        return None;
    }

    let line_start = if line == 1 {
        0
    } else {
        let mut seen = 0;
        let mut offset = None;

        for (idx, ch) in text.char_indices() {
            if ch == '\n' {
                seen += 1;
                if seen + 1 == line {
                    offset = Some(idx + ch.len_utf8());
                    break;
                }
            }
        }

        offset?
    };

    let line_end = text[line_start..]
        .find('\n')
        .map(|rel| line_start + rel)
        .unwrap_or(text.len());

    let line_text = &text[line_start..line_end];

    for (count, (byte_idx, _)) in line_text.char_indices().enumerate() {
        if count + 1 == column {
            return Some(line_start + byte_idx);
        }
    }

    if column - 1 >= line_text.chars().count() {
        return Some(line_end);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoDeps;

    impl DocumentDriver for NoDeps {
        fn get_dependent_docs(&self, _tree: &SyntaxTree) -> Vec<Document> {
            Vec::new()
        }

        fn source_manager(&self) -> &SourceManager {
            unreachable!("not exercised in these tests")
        }

        fn options(&self) -> AnalysisOptions {
            AnalysisOptions::default()
        }
    }

    #[test]
    fn lazy_syntax_tree_is_cached_until_invalidated() {
        let source_manager = SourceManager::new();
        let mut doc = Document::from_text(&source_manager, "top.sv", "module top(); endmodule\n");

        let buf_a = doc.get_syntax_tree().primary_buffer();
        let buf_b = doc.get_syntax_tree().primary_buffer();
        assert_eq!(buf_a, buf_b);
    }

    #[test]
    fn on_change_applies_edits_cumulatively_and_invalidates() {
        let source_manager = SourceManager::new();
        let mut doc = Document::from_text(&source_manager, "top.sv", "module top(); endmodule\n");
        doc.get_syntax_tree();

        let changes = vec![
            TextChange {
                start_line: 1,
                start_column: 8,
                end_line: 1,
                end_column: 11,
                text: "leaf".to_string(),
            },
            TextChange {
                start_line: 1,
                start_column: 1,
                end_line: 1,
                end_column: 1,
                text: "// edited\n".to_string(),
            },
        ];

        doc.on_change(&changes).unwrap();
        assert!(doc.text_matches("// edited\nmodule leaf(); endmodule\n\0"));
    }

    #[test]
    fn issue_diagnostics_reparses_lazily() {
        let source_manager = SourceManager::new();
        let mut doc = Document::from_text(&source_manager, "top.sv", "module top(); @@@ endmodule\n");
        assert!(!doc.issue_diagnostics().is_empty());
    }

    #[test]
    fn analysis_rebuild_is_driven_by_has_valid_buffers() {
        let source_manager = SourceManager::new();
        let mut doc = Document::from_text(&source_manager, "top.sv", "module leaf(); endmodule\nmodule top(); leaf u_leaf(); endmodule\n");
        let driver = NoDeps;

        doc.get_analysis(&driver, false);
        doc.on_change(&[]).unwrap();
        doc.get_analysis(&driver, false);
    }
}
