use xi_rope::delta::Builder;
use xi_rope::{Rope, RopeInfo};

use crate::editing::{Bias, PendingChange, Selection, map_pos};

/// The versioned document model.
///
/// The xi-rope buffer is the single source of truth for text; every committed
/// edit flows through [`Document::apply`], which bumps the version counter so
/// downstream consumers can detect staleness. Offsets are byte offsets into
/// the UTF-8 buffer throughout.
pub struct Document {
    /// The rope buffer containing the entire document as UTF-8 text
    pub(crate) buffer: Rope,
    /// Current selection as byte offsets
    pub(crate) selection: Selection,
    /// Version number that increments with each committed transaction
    pub(crate) version: u64,
}

/// A change and/or selection update applied to the document as one unit
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transaction {
    pub change: Option<PendingChange>,
    pub selection: Option<Selection>,
}

impl Transaction {
    pub fn change(from: usize, to: usize, insert: impl Into<String>) -> Self {
        Self {
            change: Some(PendingChange::new(from, to, insert)),
            selection: None,
        }
    }

    pub fn selection(selection: Selection) -> Self {
        Self {
            change: None,
            selection: Some(selection),
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }
}

/// Result of applying a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// Byte ranges of inserted text in the new buffer
    pub changed: Vec<std::ops::Range<usize>>,
    pub new_selection: Selection,
    pub version: u64,
}

impl Document {
    pub fn new(text: &str) -> Self {
        let buffer = Rope::from(text);
        let len = buffer.len();
        Self {
            buffer,
            selection: Selection::cursor(len),
            version: 0,
        }
    }

    /// Create a new document from raw bytes, which must be valid UTF-8
    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let text = std::str::from_utf8(bytes)?;
        Ok(Self::new(text))
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.len() == 0
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Get the document's content as a string
    pub fn text(&self) -> String {
        self.buffer.to_string()
    }

    /// Slice of the buffer, clamped to its bounds
    pub fn slice_to_cow(&self, range: std::ops::Range<usize>) -> std::borrow::Cow<'_, str> {
        let start = range.start.min(self.buffer.len());
        let end = range.end.min(self.buffer.len()).max(start);
        self.buffer.slice_to_cow(start..end)
    }

    /// Apply a transaction to the document, mapping the selection through the
    /// change when the transaction does not carry one explicitly
    pub fn apply(&mut self, tr: &Transaction) -> Patch {
        let mut changed = Vec::new();

        if let Some(change) = &tr.change {
            let from = change.from.min(self.buffer.len());
            let to = change.to.min(self.buffer.len()).max(from);

            if from != to || !change.insert.is_empty() {
                let mut builder = Builder::<RopeInfo>::new(self.buffer.len());
                if change.insert.is_empty() {
                    builder.delete(from..to);
                } else {
                    builder.replace(from..to, Rope::from(&change.insert));
                }
                let delta = builder.build();
                self.buffer = delta.apply(&self.buffer);
                changed.push(from..from + change.insert.len());
            }

            // The head sticks to the end of inserted text so typing keeps the
            // cursor after what was typed
            let clamped = PendingChange::new(from, to, change.insert.clone());
            self.selection = Selection::new(
                map_pos(self.selection.anchor, &clamped, Bias::After),
                map_pos(self.selection.head, &clamped, Bias::After),
            );
        }

        if let Some(selection) = tr.selection {
            self.selection = selection.clamp(self.buffer.len());
        }

        self.version += 1;

        Patch {
            changed,
            new_selection: self.selection,
            version: self.version,
        }
    }

    /// Move the selection without committing an edit or bumping the version
    pub(crate) fn set_selection(&mut self, selection: Selection) {
        self.selection = selection.clamp(self.buffer.len());
    }

    /// Byte ranges of every line, newline terminators excluded.
    ///
    /// A trailing newline yields a final empty line, and the empty document
    /// has a single empty line, matching what an editable surface renders.
    pub fn line_ranges(&self) -> Vec<std::ops::Range<usize>> {
        let text = self.buffer.to_string();
        let mut ranges = Vec::new();
        let mut line_start = 0;
        for (i, ch) in text.char_indices() {
            if ch == '\n' {
                ranges.push(line_start..i);
                line_start = i + 1;
            }
        }
        ranges.push(line_start..text.len());
        ranges
    }

    /// Index of the line containing the given offset
    pub fn line_index_at(&self, offset: usize) -> usize {
        let offset = offset.min(self.buffer.len());
        let text = self.buffer.slice_to_cow(..offset);
        text.matches('\n').count()
    }

    /// Range of the line containing the given offset, newline excluded
    pub fn line_range_at(&self, offset: usize) -> std::ops::Range<usize> {
        let offset = offset.min(self.buffer.len());
        let before = self.buffer.slice_to_cow(..offset);
        let start = match before.rfind('\n') {
            Some(pos) => pos + 1,
            None => 0,
        };
        let after = self.buffer.slice_to_cow(start..);
        let end = match after.find('\n') {
            Some(pos) => start + pos,
            None => self.buffer.len(),
        };
        start..end
    }
}
