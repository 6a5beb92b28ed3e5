use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::arena::Identifiable;
use crate::error::CoreError;

use super::buffer::Buffer;
use super::location::{BufferId, ByteOffset, Column, Line, Position, SourceLocation, SourceRange};
use super::retain::RetainGuard;

/// Where a macro usage expands to, recorded against the originating location
/// of the macro body text it was substituted from.
#[derive(Clone, Copy, Debug)]
pub struct MacroInfo {
    /// The range, in the *using* buffer, that the macro usage occupies.
    pub expansion_range: SourceRange,
}

pub(crate) struct SourceManagerInner {
    state: Mutex<State>,
}

struct State {
    buffers: HashMap<BufferId, Buffer>,
    current_by_path: HashMap<PathBuf, BufferId>,
    retain_counts: HashMap<BufferId, u64>,
    /// expansion location -> originating location (single hop; chains are
    /// walked by following this map repeatedly).
    expansion_to_originating: HashMap<SourceLocation, SourceLocation>,
    /// originating location -> every expansion location produced from it, in
    /// the order they were recorded. The last entry is the "latest" frame.
    originating_to_expansions: HashMap<SourceLocation, Vec<SourceLocation>>,
    /// originating location -> the macro-usage range its expansion occupies.
    originating_to_info: HashMap<SourceLocation, MacroInfo>,
}

/// Owns every source buffer shared across the [`Document`](crate::document::Document)s
/// of one project.
///
/// Cloning a `SourceManager` is cheap and shares the same underlying storage
/// (it is a thin handle around an `Arc`), matching §5's requirement that the
/// source manager be a single shared, internally thread-safe object.
#[derive(Clone)]
pub struct SourceManager {
    inner: Arc<SourceManagerInner>,
}

impl Default for SourceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceManager {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SourceManagerInner {
                state: Mutex::new(State {
                    buffers: HashMap::new(),
                    current_by_path: HashMap::new(),
                    retain_counts: HashMap::new(),
                    expansion_to_originating: HashMap::new(),
                    originating_to_expansions: HashMap::new(),
                    originating_to_info: HashMap::new(),
                }),
            }),
        }
    }

    /// Stores `text` under `path`, returning a fresh [`BufferId`]. If `path`
    /// already names a buffer, the new id becomes the current one for that
    /// path; the old id is left exactly as stale-but-retained as any id
    /// replaced via [`replace_buffer`](Self::replace_buffer).
    pub fn assign_text(&self, path: impl Into<PathBuf>, text: &str) -> BufferId {
        let path = path.into();
        let id = BufferId::new();
        let buffer = Buffer::new(path.clone(), text);

        let mut state = self.inner.state.lock().expect("source manager poisoned");
        state.buffers.insert(id, buffer);
        state.current_by_path.insert(path, id);

        id
    }

    /// Atomically swaps the text backing `old_id`'s path for `new_text`,
    /// returning a fresh id. `old_id` becomes stale: [`is_current`](Self::is_current)
    /// returns `false` for it from this call onward, but its data is not
    /// deallocated while a [`RetainGuard`] still references it.
    pub fn replace_buffer(&self, old_id: BufferId, new_text: &str) -> Option<BufferId> {
        let mut state = self.inner.state.lock().expect("source manager poisoned");

        let path = state.buffers.get(&old_id)?.path().to_path_buf();
        let new_id = BufferId::new();
        let buffer = Buffer::new(path.clone(), new_text);

        state.buffers.insert(new_id, buffer);
        state.current_by_path.insert(path, new_id);

        if !state.retain_counts.contains_key(&old_id) {
            state.buffers.remove(&old_id);
        }

        Some(new_id)
    }

    /// Loads `path` from disk if it is not already cached, returning the
    /// current [`BufferId`] for it either way.
    pub fn read_source(&self, path: impl AsRef<Path>) -> Result<BufferId, CoreError> {
        let path = path.as_ref();

        {
            let state = self.inner.state.lock().expect("source manager poisoned");
            if let Some(id) = state.current_by_path.get(path) {
                return Ok(*id);
            }
        }

        let text = std::fs::read_to_string(path).map_err(|err| CoreError::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;

        Ok(self.assign_text(path.to_path_buf(), &text))
    }

    /// Prevents the listed buffers from being deallocated for as long as the
    /// returned guard is alive.
    pub fn retain_buffers(&self, ids: impl IntoIterator<Item = BufferId>) -> RetainGuard {
        RetainGuard::new(self.inner.clone(), ids.into_iter().collect())
    }

    pub fn is_current(&self, id: BufferId) -> bool {
        let state = self.inner.state.lock().expect("source manager poisoned");

        match state.buffers.get(&id) {
            None => false,
            Some(buffer) => state.current_by_path.get(buffer.path()) == Some(&id),
        }
    }

    pub fn text(&self, id: BufferId) -> Option<String> {
        let state = self.inner.state.lock().expect("source manager poisoned");
        state.buffers.get(&id).map(|b| b.text().to_string())
    }

    pub fn raw_text(&self, id: BufferId) -> Option<String> {
        let state = self.inner.state.lock().expect("source manager poisoned");
        state.buffers.get(&id).map(|b| b.raw_text().to_string())
    }

    pub fn length(&self, id: BufferId) -> Option<ByteOffset> {
        let state = self.inner.state.lock().expect("source manager poisoned");
        state.buffers.get(&id).map(|b| b.length())
    }

    pub fn path_of(&self, id: BufferId) -> Option<PathBuf> {
        let state = self.inner.state.lock().expect("source manager poisoned");
        state.buffers.get(&id).map(|b| b.path().to_path_buf())
    }

    /// Resolves a `(line, column)` pair to a [`SourceLocation`], failing with
    /// [`CoreError::InvalidRange`] if it falls outside the buffer.
    pub fn get_source_location(
        &self,
        buffer: BufferId,
        line: Line,
        column: Column,
    ) -> Result<SourceLocation, CoreError> {
        let state = self.inner.state.lock().expect("source manager poisoned");

        let buf = state
            .buffers
            .get(&buffer)
            .ok_or(CoreError::InvalidRange { buffer: buffer.id() })?;

        buf.location_of(line, column)
            .map(|offset| SourceLocation::new(buffer, offset))
            .ok_or(CoreError::InvalidRange { buffer: buffer.id() })
    }

    pub fn get_line_number(&self, loc: SourceLocation) -> Result<Line, CoreError> {
        let state = self.inner.state.lock().expect("source manager poisoned");

        let buf = state
            .buffers
            .get(&loc.buffer)
            .ok_or(CoreError::InvalidRange { buffer: loc.buffer.id() })?;

        buf.line_of(loc.offset)
            .ok_or(CoreError::InvalidRange { buffer: loc.buffer.id() })
    }

    pub fn get_column_number(&self, loc: SourceLocation) -> Result<Column, CoreError> {
        let state = self.inner.state.lock().expect("source manager poisoned");

        let buf = state
            .buffers
            .get(&loc.buffer)
            .ok_or(CoreError::InvalidRange { buffer: loc.buffer.id() })?;

        buf.column_of(loc.offset)
            .ok_or(CoreError::InvalidRange { buffer: loc.buffer.id() })
    }

    pub fn get_position(&self, loc: SourceLocation) -> Result<Position, CoreError> {
        Ok(Position::new(self.get_line_number(loc)?, self.get_column_number(loc)?))
    }

    /// Records that the text at `expansion` (in the buffer the editor
    /// displays) was substituted from the text written at `originating` (a
    /// macro body, possibly in a different buffer), together with the range
    /// the whole macro usage occupies in the using buffer.
    pub(crate) fn record_macro_expansion(
        &self,
        expansion: SourceLocation,
        originating: SourceLocation,
        usage_range: SourceRange,
    ) {
        let mut state = self.inner.state.lock().expect("source manager poisoned");

        state.expansion_to_originating.insert(expansion, originating);
        state
            .originating_to_expansions
            .entry(originating)
            .or_default()
            .push(expansion);
        state
            .originating_to_info
            .entry(originating)
            .or_insert(MacroInfo {
                expansion_range: usage_range,
            });
    }

    /// Follows `expansion -> originating` hops until reaching a location with
    /// no further mapping, i.e. the location the text was actually typed at.
    pub fn get_fully_original_loc(&self, loc: SourceLocation) -> SourceLocation {
        let state = self.inner.state.lock().expect("source manager poisoned");

        let mut current = loc;
        let mut steps = 0;

        while let Some(next) = state.expansion_to_originating.get(&current) {
            current = *next;
            steps += 1;

            if steps > 64 {
                warn!(?loc, "macro expansion chain exceeded depth bound, truncating");
                break;
            }
        }

        current
    }

    /// All expansion sites that were substituted from the macro body text
    /// written at `loc`, in recording order (most recent last).
    pub fn get_macro_expansions(&self, loc: SourceLocation) -> Vec<SourceLocation> {
        let state = self.inner.state.lock().expect("source manager poisoned");

        state
            .originating_to_expansions
            .get(&loc)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_macro_info(&self, loc: SourceLocation) -> Option<MacroInfo> {
        let state = self.inner.state.lock().expect("source manager poisoned");
        state.originating_to_info.get(&loc).copied()
    }

    pub(super) fn inner(&self) -> &Arc<SourceManagerInner> {
        &self.inner
    }
}

impl SourceManagerInner {
    pub(super) fn retain(&self, ids: &[BufferId]) {
        let mut state = self.state.lock().expect("source manager poisoned");

        for id in ids {
            *state.retain_counts.entry(*id).or_insert(0) += 1;
        }
    }

    pub(super) fn release(&self, ids: &[BufferId]) {
        let mut state = self.state.lock().expect("source manager poisoned");

        for id in ids {
            if let Some(count) = state.retain_counts.get_mut(id) {
                *count -= 1;

                if *count == 0 {
                    state.retain_counts.remove(id);

                    let still_current = state
                        .buffers
                        .get(id)
                        .map(|b| state.current_by_path.get(b.path()) == Some(id))
                        .unwrap_or(false);

                    if !still_current {
                        debug!(?id, "releasing retained stale buffer");
                        state.buffers.remove(id);
                    }
                }
            }
        }
    }
}

/// Computes the byte offset of the first character of each line in `text`
/// into `out`, as used internally by [`Buffer`].
pub fn compute_line_offsets(text: &str, out: &mut Vec<ByteOffset>) {
    super::buffer::compute_line_offsets(text, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_roundtrips_through_line_and_column() {
        let manager = SourceManager::new();
        let id = manager.assign_text("a.sv", "module m;\nendmodule\n");

        for line in 1..=2 {
            for column in 1..=3 {
                let loc = manager.get_source_location(id, line, column).unwrap();
                assert_eq!(manager.get_line_number(loc).unwrap(), line);
                assert_eq!(manager.get_column_number(loc).unwrap(), column);
            }
        }
    }

    #[test]
    fn replace_buffer_invalidates_old_id_but_retains_on_guard() {
        let manager = SourceManager::new();
        let old = manager.assign_text("a.sv", "x");

        let guard = manager.retain_buffers([old]);
        let new = manager.replace_buffer(old, "y").unwrap();

        assert!(!manager.is_current(old));
        assert!(manager.is_current(new));
        assert_eq!(manager.text(old).as_deref(), Some("x"));

        drop(guard);
    }

    #[test]
    fn invalid_position_fails_with_invalid_range() {
        let manager = SourceManager::new();
        let id = manager.assign_text("a.sv", "abc");

        assert!(matches!(
            manager.get_source_location(id, 99, 1),
            Err(CoreError::InvalidRange { .. })
        ));
    }

    #[test]
    fn macro_expansion_chain_resolves_to_original() {
        let manager = SourceManager::new();
        let def_buf = manager.assign_text("defs.svh", "`define FOO 1");
        let use_buf = manager.assign_text("top.sv", "`FOO");

        let originating = SourceLocation::new(def_buf, 12);
        let expansion = SourceLocation::new(use_buf, 0);

        manager.record_macro_expansion(
            expansion,
            originating,
            SourceRange::new(expansion, SourceLocation::new(use_buf, 4)),
        );

        assert_eq!(manager.get_fully_original_loc(expansion), originating);
        assert_eq!(manager.get_macro_expansions(originating), vec![expansion]);
        assert!(manager.get_macro_info(originating).is_some());
    }
}
