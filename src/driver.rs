//! The host-supplied seam a [`Document`](crate::document::Document) goes
//! through to find its dependencies and shared configuration (§6, "Driver").

use crate::analysis::AnalysisOptions;
use crate::document::Document;
use crate::source::SourceManager;
use crate::syntax::SyntaxTree;

/// Implemented by the host (an LSP workspace, a batch-elaboration CLI) to
/// supply whatever a [`Document`] cannot know about itself: which other
/// documents its shallow compilation depends on, the source manager all
/// documents in the project share, and the analysis options to build with.
pub trait DocumentDriver {
    /// Every external document whose syntax tree must be fed into `tree`'s
    /// shallow compilation — e.g. the packages and interfaces a module
    /// references. Called from [`Document::get_analysis`] whenever a rebuild
    /// is triggered.
    fn get_dependent_docs(&self, tree: &SyntaxTree) -> Vec<Document>;

    fn source_manager(&self) -> &SourceManager;

    fn options(&self) -> AnalysisOptions;
}
