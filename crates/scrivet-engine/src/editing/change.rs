//! Text diffing between what the document expects a region to contain and
//! what the surface actually holds, plus position mapping through a change.
//!
//! The diff is deliberately minimal: one contiguous replacement per region.
//! Anything the single-window trim cannot express degrades into a larger
//! replacement of the same region, which is always safe to apply.

/// A single contiguous replacement against the current document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange {
    /// Start of the replaced range (byte offset)
    pub from: usize,
    /// End of the replaced range (byte offset, exclusive)
    pub to: usize,
    /// Replacement text
    pub insert: String,
}

impl PendingChange {
    pub fn new(from: usize, to: usize, insert: impl Into<String>) -> Self {
        Self {
            from,
            to,
            insert: insert.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.from == self.to && self.insert.is_empty()
    }
}

/// Which way a position should resolve when it sits exactly on a change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    /// Stay before inserted text
    Before,
    /// Land after inserted text
    After,
}

/// Key events the host reports so ambiguous diffs can be disambiguated.
///
/// Only deletions matter to the diff itself: a recent `Backspace` anchors the
/// change window so that a symmetric deletion resolves leftward of the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Backspace,
    Delete,
}

/// Re-project a byte offset through a change
pub fn map_pos(pos: usize, change: &PendingChange, bias: Bias) -> usize {
    if pos < change.from {
        pos
    } else if pos > change.to {
        pos - (change.to - change.from) + change.insert.len()
    } else {
        match bias {
            Bias::Before => change.from,
            Bias::After => change.from + change.insert.len(),
        }
    }
}

/// Map a range through a change, start forward-biased and end backward-biased
/// so insertions at either boundary do not grow the range.
pub(crate) fn map_range(
    range: &std::ops::Range<usize>,
    change: &PendingChange,
) -> std::ops::Range<usize> {
    let start = map_pos(range.start, change, Bias::After);
    let end = map_pos(range.end, change, Bias::Before);
    if start <= end { start..end } else { start..start }
}

/// Strict overlap check; ranges that merely touch do not overlap
pub(crate) fn ranges_overlap(a: &std::ops::Range<usize>, b: &std::ops::Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// A minimal replacement window turning `a` into `b`, in byte offsets local
/// to the two strings: `a[from..to_a]` replaced by `b[from..to_b]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Diff {
    pub from: usize,
    pub to_a: usize,
    pub to_b: usize,
}

/// Find the minimal single replacement turning `a` into `b`.
///
/// Trims the longest common prefix and suffix. When the two trims overlap the
/// edit is ambiguous (repeated text, e.g. deleting one of two "o"s); the
/// window is then slid towards `preferred_pos`, and with `anchor_end` set it
/// is first re-anchored to end at that position, which is how a backspace
/// near the cursor resolves to the character left of it.
///
/// Returns `None` when the strings are equal. All four window bounds land on
/// `char` boundaries.
pub(crate) fn find_diff(a: &str, b: &str, preferred_pos: usize, anchor_end: bool) -> Option<Diff> {
    let (ab, bb) = (a.as_bytes(), b.as_bytes());
    let min_len = ab.len().min(bb.len());

    let mut from = 0;
    while from < min_len && ab[from] == bb[from] {
        from += 1;
    }
    if from == min_len && ab.len() == bb.len() {
        return None;
    }

    let mut to_a = ab.len();
    let mut to_b = bb.len();
    while to_a > 0 && to_b > 0 && ab[to_a - 1] == bb[to_b - 1] {
        to_a -= 1;
        to_b -= 1;
    }

    let mut preferred = preferred_pos as isize;
    if anchor_end {
        // Re-express the preferred position relative to the end of the
        // window, so the slide below lands the window against the cursor
        let adjust = from.saturating_sub(to_a.min(to_b));
        preferred -= (to_a + adjust - from) as isize;
    }

    if to_a < from && a.len() < b.len() {
        // Prefix and suffix trims overlapped on an insertion: the inserted
        // text repeats its surroundings, so the window may slide left
        let slide = if preferred <= from as isize && preferred >= to_a as isize {
            (from as isize - preferred) as usize
        } else {
            0
        };
        from -= slide;
        to_b = from + (to_b - to_a);
        to_a = from;
    } else if to_b < from {
        // Same ambiguity on a deletion
        let slide = if preferred <= from as isize && preferred >= to_b as isize {
            (from as isize - preferred) as usize
        } else {
            0
        };
        from -= slide;
        to_a = from + (to_a - to_b);
        to_b = from;
    }

    // Byte-wise scans can stop inside a multi-byte char; widen the window
    // until it sits on char boundaries. The common prefix/suffix guarantees
    // the mirrored offsets in `b` land on boundaries too.
    while from > 0 && !a.is_char_boundary(from) {
        from -= 1;
    }
    while to_a < a.len() && !a.is_char_boundary(to_a) {
        to_a += 1;
        to_b += 1;
    }

    Some(Diff { from, to_a, to_b })
}
