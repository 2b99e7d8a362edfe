//! Text extraction from the surface tree.
//!
//! Reading follows editable-surface conventions: sibling block elements are
//! separated by a newline, a hard break contributes a newline unless it ends
//! its parent, and the renderer's filler breaks are invisible. While reading,
//! the native selection endpoints are resolved to offsets in the produced
//! text, which is how surface positions get mapped back into the document.

use crate::surface::{NodeId, NodeKind, Surface, SurfacePoint};

/// Outcome of reading a stretch of root children
pub(crate) struct ReadResult {
    pub text: String,
    /// Selection anchor as a byte offset into `text`, when the anchor node
    /// was encountered during the read
    pub anchor: Option<usize>,
    /// Same for the selection head
    pub head: Option<usize>,
}

/// Read the given root children (a contiguous slice of the root's child list
/// starting at child index `base_index`) into text.
pub(crate) fn read_children(surface: &Surface, ids: &[NodeId], base_index: usize) -> ReadResult {
    let mut points = Vec::new();
    if let Some((anchor, head)) = surface.selection() {
        points.push(Point::new(anchor));
        points.push(Point::new(head));
    }
    let mut reader = Reader {
        surface,
        text: String::new(),
        points,
    };
    reader.read_siblings(surface.root(), ids, base_index);
    let head = reader.points.pop().and_then(|p| p.pos);
    let anchor = reader.points.pop().and_then(|p| p.pos);
    ReadResult {
        text: reader.text,
        anchor,
        head,
    }
}

/// Text a single node (and its subtree) reads as, selection ignored
pub(crate) fn read_node_text(surface: &Surface, id: NodeId) -> String {
    let mut reader = Reader {
        surface,
        text: String::new(),
        points: Vec::new(),
    };
    reader.read_node(id);
    reader.text
}

struct Point {
    point: SurfacePoint,
    pos: Option<usize>,
}

impl Point {
    fn new(point: SurfacePoint) -> Self {
        Self { point, pos: None }
    }
}

struct Reader<'a> {
    surface: &'a Surface,
    text: String,
    points: Vec<Point>,
}

impl Reader<'_> {
    fn read_siblings(&mut self, parent: NodeId, ids: &[NodeId], base_index: usize) {
        for (i, &id) in ids.iter().enumerate() {
            self.find_point_before(parent, base_index + i);
            self.read_node(id);
            if let Some(&next) = ids.get(i + 1) {
                // A newline separates sibling blocks; a break before a block
                // already is that separator
                let cur_block = self.is_block(id);
                let next_block = self.is_block(next);
                let cur_break = matches!(
                    self.surface.kind(id),
                    Some(NodeKind::Break { filler: false })
                );
                if cur_block || (next_block && !cur_break) {
                    self.text.push('\n');
                }
            }
        }
        let end_index = base_index + ids.len();
        let to_end = end_index >= self.surface.children(parent).len();
        self.find_point_after(parent, end_index, to_end);
    }

    fn read_node(&mut self, id: NodeId) {
        match self.surface.kind(id) {
            Some(NodeKind::Text(value)) => {
                let value = value.clone();
                self.find_point_in(id, value.len());
                self.text.push_str(&value);
            }
            Some(NodeKind::Break { filler: true }) => {}
            Some(NodeKind::Break { filler: false }) => {
                // Renders a line boundary only when something follows it; a
                // trailing break merely keeps its line open
                let has_next = self.has_next_sibling(id);
                let text = if has_next { "\n" } else { "" };
                self.find_point_in(id, text.len());
                self.text.push_str(text);
            }
            Some(NodeKind::Element) => {
                let children = self.surface.children(id).to_vec();
                self.read_siblings(id, &children, 0);
            }
            None => {}
        }
    }

    fn has_next_sibling(&self, id: NodeId) -> bool {
        match self.surface.parent(id) {
            Some(parent) => {
                let siblings = self.surface.children(parent);
                siblings
                    .iter()
                    .position(|&c| c == id)
                    .is_some_and(|i| i + 1 < siblings.len())
            }
            None => false,
        }
    }

    fn is_block(&self, id: NodeId) -> bool {
        matches!(self.surface.kind(id), Some(NodeKind::Element))
    }

    /// Record points sitting before the child at `index` under `parent`
    fn find_point_before(&mut self, parent: NodeId, index: usize) {
        let len = self.text.len();
        for point in &mut self.points {
            if point.pos.is_none() && point.point.node == parent && point.point.offset == index {
                point.pos = Some(len);
            }
        }
    }

    /// Record points at the end of the read stretch. When the stretch runs to
    /// the end of `parent`, offsets past the last child resolve here too.
    fn find_point_after(&mut self, parent: NodeId, end_index: usize, to_end: bool) {
        let len = self.text.len();
        for point in &mut self.points {
            let offset = point.point.offset;
            let matches = if to_end {
                offset >= end_index
            } else {
                offset == end_index
            };
            if point.pos.is_none() && point.point.node == parent && matches {
                point.pos = Some(len);
            }
        }
    }

    /// Record points inside the node being read, clamped to its text length
    fn find_point_in(&mut self, node: NodeId, len: usize) {
        let base = self.text.len();
        for point in &mut self.points {
            if point.pos.is_none() && point.point.node == node {
                point.pos = Some(base + point.point.offset.min(len));
            }
        }
    }
}
