use serde::{Deserialize, Serialize};

/// A selection in the document, as byte offsets into the buffer.
///
/// `anchor` is the fixed end and `head` the moving end; the two are equal for
/// a plain cursor. No ordering is implied, `head` may sit before `anchor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: usize,
    pub head: usize,
}

impl Selection {
    pub fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    /// A collapsed selection (cursor) at the given offset
    pub fn cursor(at: usize) -> Self {
        Self {
            anchor: at,
            head: at,
        }
    }

    pub fn is_cursor(&self) -> bool {
        self.anchor == self.head
    }

    /// Lower end of the selection regardless of direction
    pub fn min(&self) -> usize {
        self.anchor.min(self.head)
    }

    /// Upper end of the selection regardless of direction
    pub fn max(&self) -> usize {
        self.anchor.max(self.head)
    }

    pub(crate) fn clamp(self, len: usize) -> Self {
        Self {
            anchor: self.anchor.min(len),
            head: self.head.min(len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_is_collapsed() {
        let sel = Selection::cursor(5);
        assert!(sel.is_cursor());
        assert_eq!(sel.min(), 5);
        assert_eq!(sel.max(), 5);
    }

    #[test]
    fn test_min_max_ignore_direction() {
        let backwards = Selection::new(7, 2);
        assert_eq!(backwards.min(), 2);
        assert_eq!(backwards.max(), 7);
        assert!(!backwards.is_cursor());
    }

    #[test]
    fn test_clamp_limits_both_ends() {
        let sel = Selection::new(3, 10).clamp(6);
        assert_eq!(sel, Selection::new(3, 6));
    }
}
