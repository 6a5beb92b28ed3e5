use std::path::{Path, PathBuf};

use super::location::{BufferId, ByteOffset, Column, Line, Position};

/// Every buffer's text is stored with a trailing NUL byte, which the lexer
/// relies on as a lookahead-safe "end of input" marker instead of branching on
/// `Option` at every scan step. [`Buffer::text`] strips it back off for
/// callers; only [`Buffer::raw_text`] (used by
/// [`Document::text_matches`](crate::document::Document::text_matches)) sees
/// it.
pub(crate) const SENTINEL: char = '\0';

pub(crate) struct Buffer {
    path: PathBuf,
    /// Source text with the trailing [`SENTINEL`] appended.
    raw: String,
    /// Byte offset of the first character of each line; `line_offsets[0] == 0`.
    line_offsets: Vec<ByteOffset>,
}

impl Buffer {
    pub(crate) fn new(path: impl Into<PathBuf>, text: &str) -> Self {
        let mut raw = String::with_capacity(text.len() + 1);
        raw.push_str(text);
        raw.push(SENTINEL);

        let mut line_offsets = Vec::new();
        compute_line_offsets(text, &mut line_offsets);

        Self {
            path: path.into(),
            raw,
            line_offsets,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Source text without the trailing sentinel.
    pub(crate) fn text(&self) -> &str {
        &self.raw[..self.raw.len() - SENTINEL.len_utf8()]
    }

    pub(crate) fn raw_text(&self) -> &str {
        &self.raw
    }

    pub(crate) fn length(&self) -> ByteOffset {
        self.text().len()
    }

    pub(crate) fn line_count(&self) -> usize {
        self.line_offsets.len()
    }

    pub(crate) fn location_of(&self, line: Line, column: Column) -> Option<ByteOffset> {
        if line == 0 {
            return None;
        }

        let line_start = *self.line_offsets.get(line - 1)?;
        let line_end = self
            .line_offsets
            .get(line)
            .copied()
            .unwrap_or_else(|| self.length());

        let text = self.text();
        let line_text = text.get(line_start..line_end)?;

        if column == 0 {
            return None;
        }

        let mut offset = line_start;

        for (count, (byte_idx, _)) in line_text.char_indices().enumerate() {
            if count + 1 == column {
                offset = line_start + byte_idx;
                return Some(offset);
            }
        }

        // Column past the end of the line text is clamped to the line end,
        // matching the teacher convention that out-of-range columns resolve
        // to the nearest boundary rather than failing outright -- but only
        // within the line's own span, never past the buffer.
        let trimmed = line_text.trim_end_matches(['\n', '\r']);

        if column - 1 >= trimmed.chars().count() {
            return Some(line_start + trimmed.len());
        }

        None
    }

    pub(crate) fn line_of(&self, offset: ByteOffset) -> Option<Line> {
        if offset > self.length() {
            return None;
        }

        match self.line_offsets.binary_search(&offset) {
            Ok(idx) => Some(idx + 1),
            Err(idx) => Some(idx),
        }
    }

    pub(crate) fn column_of(&self, offset: ByteOffset) -> Option<Column> {
        let line = self.line_of(offset)?;
        let line_start = self.line_offsets[line - 1];
        let prefix = self.text().get(line_start..offset)?;

        Some(prefix.chars().count() + 1)
    }

    pub(crate) fn position_of(&self, offset: ByteOffset) -> Option<Position> {
        Some(Position::new(self.line_of(offset)?, self.column_of(offset)?))
    }
}

/// Populates `out` with the byte offset of the first character of each line
/// in `text`. Lines are separated by `\n`, `\r\n`, or `\r`.
pub(crate) fn compute_line_offsets(text: &str, out: &mut Vec<ByteOffset>) {
    out.clear();
    out.push(0);

    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                i += 1;
                out.push(i);
            }

            b'\r' => {
                i += 1;

                if bytes.get(i) == Some(&b'\n') {
                    i += 1;
                }

                out.push(i);
            }

            _ => {
                i += 1;
            }
        }
    }
}

/// Identifies a live [`Buffer`] together with the [`BufferId`] the rest of the
/// crate uses to refer to it.
pub(crate) struct NamedBuffer {
    pub(crate) id: BufferId,
    pub(crate) buffer: Buffer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_offsets_handle_mixed_newlines() {
        let mut offsets = Vec::new();
        compute_line_offsets("a\nbb\r\nccc\rd", &mut offsets);
        assert_eq!(offsets, vec![0, 2, 6, 10]);
    }

    #[test]
    fn location_of_and_position_of_roundtrip() {
        let buffer = Buffer::new("f.sv", "module m;\nendmodule\n");

        let loc = buffer.location_of(2, 1).unwrap();
        assert_eq!(loc, 10);
        assert_eq!(buffer.position_of(loc), Some(Position::new(2, 1)));
    }

    #[test]
    fn out_of_bounds_line_is_none() {
        let buffer = Buffer::new("f.sv", "a\nb\n");
        assert_eq!(buffer.location_of(99, 1), None);
    }
}
