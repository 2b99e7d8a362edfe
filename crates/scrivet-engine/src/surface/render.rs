//! Surface resynchronization: rewriting the tree so it shows the committed
//! document, while disturbing as few nodes as possible.
//!
//! Node identity matters because the platform keys cursor position, focus and
//! composition state on concrete nodes. A line whose rendered text already
//! equals the document line is left completely alone; a simple line is
//! updated through its existing text node; protected lines are never touched.

use std::ops::Range;

use crate::editing::Document;
use crate::surface::{NodeId, NodeKind, Surface, SurfacePoint, read_node_text};

/// One rendered line: the root child showing a document line
#[derive(Debug, Clone)]
pub(crate) struct LineEntry {
    pub element: NodeId,
    /// Document range of the line, newline excluded
    pub range: Range<usize>,
    /// The line's single text child, when the line has simple shape
    pub text: Option<NodeId>,
}

/// A document range the renderer must keep its hands off
#[derive(Debug, Clone)]
pub(crate) struct ProtectedSpan {
    pub range: Range<usize>,
    /// Line element pinned to the line holding the span's start; set for
    /// composition sessions, whose line must survive as-is
    pub element: Option<NodeId>,
}

/// Keeps the mapping between document lines and surface line elements
pub(crate) struct Renderer {
    lines: Vec<LineEntry>,
}

impl Renderer {
    pub(crate) fn new() -> Self {
        Self { lines: Vec::new() }
    }

    pub(crate) fn lines(&self) -> &[LineEntry] {
        &self.lines
    }

    pub(crate) fn line_of_element(&self, element: NodeId) -> Option<usize> {
        self.lines.iter().position(|entry| entry.element == element)
    }

    pub(crate) fn line_entry(&self, index: usize) -> Option<&LineEntry> {
        self.lines.get(index)
    }

    /// Document range a rendered text node corresponds to
    pub(crate) fn doc_range_of_text(&self, text: NodeId) -> Option<Range<usize>> {
        self.lines
            .iter()
            .find(|entry| entry.text == Some(text))
            .map(|entry| entry.range.clone())
    }

    /// Surface point showing the given document offset
    pub(crate) fn point_at(&self, pos: usize) -> Option<SurfacePoint> {
        let entry = self
            .lines
            .iter()
            .find(|entry| entry.range.start <= pos && pos <= entry.range.end)?;
        match entry.text {
            Some(text) => Some(SurfacePoint::new(text, pos - entry.range.start)),
            None => Some(SurfacePoint::new(entry.element, 0)),
        }
    }

    /// Rewrite the surface to show the current document.
    ///
    /// Reuses existing line elements wherever their rendered text already
    /// matches, edits single-text lines in place, and leaves protected lines
    /// untouched. The surface's own mutation stream is suppressed throughout.
    pub(crate) fn sync(
        &mut self,
        doc: &Document,
        surface: &mut Surface,
        protected: &[ProtectedSpan],
    ) {
        surface.set_ignore(true);

        let text = doc.text();
        let ranges = doc.line_ranges();
        let root = surface.root();
        let old_children = surface.children(root).to_vec();
        let mut used = vec![false; old_children.len()];

        // Pinned elements are claimed up front so ordinary matching cannot
        // hand them to some other line
        for span in protected {
            if let Some(element) = span.element {
                if let Some(i) = old_children.iter().position(|&c| c == element) {
                    used[i] = true;
                }
            }
        }

        let mut cursor = 0;
        let mut new_children = Vec::with_capacity(ranges.len());
        let mut entries = Vec::with_capacity(ranges.len());

        for range in &ranges {
            let line_text = &text[range.clone()];

            let element = if let Some(pinned) = protected.iter().find_map(|span| {
                span.element
                    .filter(|_| range.start <= span.range.start && span.range.start <= range.end)
            }) {
                pinned
            } else if self.is_replaced_line(range, protected) {
                // The host owns this stretch; keep whatever sits there
                match next_unused(&old_children, &used, &mut cursor) {
                    Some(i) => {
                        used[i] = true;
                        old_children[i]
                    }
                    None => build_line(surface, line_text),
                }
            } else if let Some(i) =
                find_matching(surface, &old_children, &used, cursor, line_text)
            {
                used[i] = true;
                cursor = cursor.max(i + 1);
                old_children[i]
            } else if let Some((i, text_node)) =
                find_reusable(surface, &old_children, &used, cursor, line_text)
            {
                used[i] = true;
                cursor = cursor.max(i + 1);
                // In-place update keeps the text node's identity
                let _ = surface.set_text(text_node, line_text);
                old_children[i]
            } else {
                build_line(surface, line_text)
            };

            new_children.push(element);
            entries.push(LineEntry {
                element,
                range: range.clone(),
                text: single_text_child(surface, element),
            });
        }

        surface.set_child_list(root, new_children);
        self.lines = entries;

        // Project the document selection back onto the surface, unless a
        // composition currently owns the native cursor
        if protected.iter().all(|span| span.element.is_none()) {
            let selection = doc.selection();
            if let (Some(anchor), Some(head)) = (
                self.point_at(selection.anchor),
                self.point_at(selection.head),
            ) {
                surface.set_selection(anchor, head);
            }
        }

        surface.set_ignore(false);
    }

    fn is_replaced_line(&self, range: &Range<usize>, protected: &[ProtectedSpan]) -> bool {
        protected.iter().any(|span| {
            span.element.is_none()
                && span.range.start <= range.end
                && range.start <= span.range.end
        })
    }
}

/// First unclaimed old line at or after the scan cursor
fn next_unused(old_children: &[NodeId], used: &[bool], cursor: &mut usize) -> Option<usize> {
    let i = (*cursor..old_children.len()).find(|&i| !used[i])?;
    *cursor = i + 1;
    Some(i)
}

/// Old line element whose rendered text already equals the wanted line
fn find_matching(
    surface: &Surface,
    old_children: &[NodeId],
    used: &[bool],
    cursor: usize,
    line_text: &str,
) -> Option<usize> {
    (cursor..old_children.len()).find(|&i| {
        !used[i]
            && matches!(surface.kind(old_children[i]), Some(NodeKind::Element))
            && read_node_text(surface, old_children[i]) == line_text
    })
}

/// Old line that can be rewritten through its single text child
fn find_reusable(
    surface: &Surface,
    old_children: &[NodeId],
    used: &[bool],
    cursor: usize,
    line_text: &str,
) -> Option<(usize, NodeId)> {
    if line_text.is_empty() {
        return None;
    }
    (cursor..old_children.len()).find_map(|i| {
        if used[i] {
            return None;
        }
        single_text_child(surface, old_children[i]).map(|text| (i, text))
    })
}

fn single_text_child(surface: &Surface, element: NodeId) -> Option<NodeId> {
    match surface.children(element) {
        [only] if matches!(surface.kind(*only), Some(NodeKind::Text(_))) => Some(*only),
        _ => None,
    }
}

fn build_line(surface: &mut Surface, line_text: &str) -> NodeId {
    let element = surface.create_element();
    if line_text.is_empty() {
        let filler = surface.create_filler_break();
        surface.append_child(element, filler).ok();
    } else {
        let text = surface.create_text(line_text);
        surface.append_child(element, text).ok();
    }
    element
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::Transaction;

    fn rendered(surface: &Surface) -> String {
        let roots = surface.children(surface.root()).to_vec();
        crate::surface::read_children(surface, &roots, 0).text
    }

    fn fresh(text: &str) -> (Document, Surface, Renderer) {
        let doc = Document::new(text);
        let mut surface = Surface::new();
        let mut renderer = Renderer::new();
        renderer.sync(&doc, &mut surface, &[]);
        (doc, surface, renderer)
    }

    #[test]
    fn test_initial_sync_renders_all_lines() {
        let (_, surface, renderer) = fresh("foo\n\nbar");
        assert_eq!(rendered(&surface), "foo\n\nbar");
        assert_eq!(renderer.lines().len(), 3);
        assert_eq!(renderer.lines()[1].range, 4..4);
    }

    #[test]
    fn test_unchanged_lines_keep_their_nodes() {
        let (mut doc, mut surface, mut renderer) = fresh("foo\nbar");
        let kept = renderer.lines()[1].element;
        doc.apply(&Transaction::change(0, 3, "xyz"));
        renderer.sync(&doc, &mut surface, &[]);
        assert_eq!(rendered(&surface), "xyz\nbar");
        assert_eq!(renderer.lines()[1].element, kept, "untouched line survives");
    }

    #[test]
    fn test_interior_edit_reuses_text_node() {
        let (mut doc, mut surface, mut renderer) = fresh("abcd");
        let text = renderer.lines()[0].text.unwrap();
        doc.apply(&Transaction::change(1, 3, "xx"));
        renderer.sync(&doc, &mut surface, &[]);
        assert_eq!(surface.text_value(text), Some("axxd"));
        assert_eq!(renderer.lines()[0].text, Some(text));
    }

    #[test]
    fn test_protected_line_is_left_alone() {
        let (mut doc, mut surface, mut renderer) = fresh("one\ntwo\nthree");
        let line = renderer.lines()[1].element;
        let text = renderer.lines()[1].text.unwrap();
        // Surface diverges from the document on the protected line
        surface.set_text(text, "twoxy").unwrap();
        surface.take_records();

        doc.apply(&Transaction::change(0, 1, "O"));
        let span = ProtectedSpan {
            range: 4..7,
            element: Some(line),
        };
        renderer.sync(&doc, &mut surface, &[span]);
        assert_eq!(surface.text_value(text), Some("twoxy"));
        assert_eq!(renderer.lines()[1].element, line);
        assert_eq!(rendered(&surface), "One\ntwoxy\nthree");
    }

    #[test]
    fn test_protected_line_follows_remapped_span() {
        // A new line opens above the composition; the composed line element
        // must move down rather than be rebuilt
        let (mut doc, mut surface, mut renderer) = fresh("one\ntwo");
        let line = renderer.lines()[1].element;
        let text = renderer.lines()[1].text.unwrap();
        surface.set_text(text, "twox").unwrap();
        surface.take_records();

        doc.apply(&Transaction::change(0, 0, "zero\n"));
        let span = ProtectedSpan {
            range: 9..12,
            element: Some(line),
        };
        renderer.sync(&doc, &mut surface, &[span]);
        assert_eq!(rendered(&surface), "zero\none\ntwox");
        assert_eq!(renderer.lines()[2].element, line);
    }

    #[test]
    fn test_point_at_resolves_into_text_nodes() {
        let (_, _, renderer) = fresh("foo\nbar");
        let line1 = renderer.lines()[1].clone();
        assert_eq!(
            renderer.point_at(5),
            Some(SurfacePoint::new(line1.text.unwrap(), 1))
        );
        assert_eq!(
            renderer.point_at(4),
            Some(SurfacePoint::new(line1.text.unwrap(), 0))
        );
    }

    #[test]
    fn test_sync_restores_surface_selection() {
        let (mut doc, mut surface, mut renderer) = fresh("hello");
        doc.apply(&Transaction::selection(crate::editing::Selection::cursor(2)));
        renderer.sync(&doc, &mut surface, &[]);
        let text = renderer.lines()[0].text.unwrap();
        assert_eq!(
            surface.selection(),
            Some((SurfacePoint::new(text, 2), SurfacePoint::new(text, 2)))
        );
        assert!(!surface.take_selection_dirty(), "own updates are not dirty");
    }

    #[test]
    fn test_replaced_span_does_not_block_selection_restore() {
        // Only a composition-pinned line owns the native cursor; a
        // host-replaced range must not stop selection projection elsewhere
        let (mut doc, mut surface, mut renderer) = fresh("foo\nbar\nbaz");
        doc.apply(&Transaction::selection(crate::editing::Selection::cursor(1)));
        let span = ProtectedSpan {
            range: 4..7,
            element: None,
        };
        renderer.sync(&doc, &mut surface, &[span]);
        let text = renderer.lines()[0].text.unwrap();
        assert_eq!(
            surface.selection(),
            Some((SurfacePoint::new(text, 1), SurfacePoint::new(text, 1)))
        );
    }

    #[test]
    fn test_shrinking_document_drops_extra_lines() {
        let (mut doc, mut surface, mut renderer) = fresh("1\n2\n3\n4");
        doc.apply(&Transaction::change(1, 6, ""));
        renderer.sync(&doc, &mut surface, &[]);
        assert_eq!(rendered(&surface), "1\n4");
        assert_eq!(surface.children(surface.root()).len(), 2);
    }
}
