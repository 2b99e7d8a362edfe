//! The editable surface: an arena of nodes standing in for the platform's
//! live rendering tree.
//!
//! The host mutates this tree freely through [`Surface`]'s mutation API, the
//! same way a browser mutates a contenteditable region. Every mutation is
//! recorded into an observer queue which [`crate::EditorView::flush`] later
//! drains; the engine itself never reacts to a mutation synchronously.

mod observer;
mod reader;
mod render;

pub use observer::MutationRecord;
pub(crate) use observer::{DirtyRegion, infer_region};
pub(crate) use reader::{ReadResult, read_children, read_node_text};
pub(crate) use render::{ProtectedSpan, Renderer};

use crate::error::EngineError;

/// Handle to a node in the surface arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// What a surface node is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Block container: a rendered line, or any block the host inserted
    Element,
    /// Hard line break. Filler breaks are what the renderer places in empty
    /// lines to keep them selectable; the reader ignores those.
    Break { filler: bool },
    /// A run of text
    Text(String),
}

/// One end of the surface's native selection: a node plus an offset.
///
/// For a text node the offset is a byte offset into its value; for an element
/// it counts children, the point sitting before the child at that index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfacePoint {
    pub node: NodeId,
    pub offset: usize,
}

impl SurfacePoint {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// The uncontrolled editable tree the engine reconciles against
pub struct Surface {
    nodes: Vec<Node>,
    root: NodeId,
    selection: Option<(SurfacePoint, SurfacePoint)>,
    queue: Vec<MutationRecord>,
    selection_dirty: bool,
    /// Set while the renderer rewrites the tree so its own mutations do not
    /// feed back into the observer queue
    ignore: bool,
}

impl Surface {
    pub fn new() -> Self {
        let mut surface = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            selection: None,
            queue: Vec::new(),
            selection_dirty: false,
            ignore: false,
        };
        surface.root = surface.alloc(NodeKind::Element);
        surface
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// The root element all rendered lines hang off
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Create a detached block element
    pub fn create_element(&mut self) -> NodeId {
        self.alloc(NodeKind::Element)
    }

    /// Create a detached text node
    pub fn create_text(&mut self, value: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Text(value.into()))
    }

    /// Create a detached line break
    pub fn create_break(&mut self) -> NodeId {
        self.alloc(NodeKind::Break { filler: false })
    }

    pub(crate) fn create_filler_break(&mut self) -> NodeId {
        self.alloc(NodeKind::Break { filler: true })
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0).map(|node| &node.kind)
    }

    /// Text value of a text node
    pub fn text_value(&self, id: NodeId) -> Option<&str> {
        match self.nodes.get(id.0).map(|node| &node.kind) {
            Some(NodeKind::Text(value)) => Some(value),
            _ => None,
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.parent)
    }

    /// Whether the node is still reachable from the root
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut cur = id;
        loop {
            if cur == self.root {
                return true;
            }
            match self.parent(cur) {
                Some(parent) => cur = parent,
                None => return false,
            }
        }
    }

    fn check_exists(&self, id: NodeId) -> Result<(), EngineError> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(EngineError::UnknownNode(id))
        }
    }

    fn check_element(&self, id: NodeId) -> Result<(), EngineError> {
        self.check_exists(id)?;
        match self.nodes[id.0].kind {
            NodeKind::Element => Ok(()),
            _ => Err(EngineError::NotAnElement(id)),
        }
    }

    /// Append `child` as the last child of `parent`, detaching it from any
    /// previous parent first
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), EngineError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` before `reference` under `parent`; `None` appends
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), EngineError> {
        self.check_element(parent)?;
        self.check_exists(child)?;

        // A node cannot contain itself
        let mut cur = Some(parent);
        while let Some(id) = cur {
            if id == child {
                return Err(EngineError::WouldCreateCycle(child));
            }
            cur = self.parent(id);
        }

        if let Some(reference) = reference {
            if reference == child || !self.nodes[parent.0].children.contains(&reference) {
                return Err(EngineError::NotAChild(reference, parent));
            }
        }

        if let Some(old_parent) = self.nodes[child.0].parent {
            self.detach(old_parent, child);
        }

        // Position is computed after the detach, which may have shifted
        // siblings when the node moves within the same parent
        let index = match reference {
            Some(reference) => self.nodes[parent.0]
                .children
                .iter()
                .position(|&c| c == reference)
                .ok_or(EngineError::NotAChild(reference, parent))?,
            None => self.nodes[parent.0].children.len(),
        };

        self.nodes[parent.0].children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
        self.record(MutationRecord {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
            character_data: false,
        });
        Ok(())
    }

    /// Remove `child` from `parent`
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), EngineError> {
        self.check_element(parent)?;
        self.check_exists(child)?;
        if self.nodes[child.0].parent != Some(parent) {
            return Err(EngineError::NotAChild(child, parent));
        }
        self.detach(parent, child);
        Ok(())
    }

    fn detach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].children.retain(|&c| c != child);
        self.nodes[child.0].parent = None;
        self.record(MutationRecord {
            target: parent,
            added: Vec::new(),
            removed: vec![child],
            character_data: false,
        });
    }

    /// Overwrite the value of a text node
    pub fn set_text(&mut self, id: NodeId, value: impl Into<String>) -> Result<(), EngineError> {
        self.check_exists(id)?;
        match &mut self.nodes[id.0].kind {
            NodeKind::Text(current) => {
                *current = value.into();
                self.record(MutationRecord {
                    target: id,
                    added: Vec::new(),
                    removed: Vec::new(),
                    character_data: true,
                });
                Ok(())
            }
            _ => Err(EngineError::NotAText(id)),
        }
    }

    /// Replace the whole child list of `parent`. Renderer-only: does not
    /// queue records.
    pub(crate) fn set_child_list(&mut self, parent: NodeId, children: Vec<NodeId>) {
        let old = std::mem::take(&mut self.nodes[parent.0].children);
        for child in old {
            self.nodes[child.0].parent = None;
        }
        for &child in &children {
            if let Some(old_parent) = self.nodes[child.0].parent {
                self.nodes[old_parent.0].children.retain(|&c| c != child);
            }
            self.nodes[child.0].parent = Some(parent);
        }
        self.nodes[parent.0].children = children;
    }

    /// The native selection as (anchor, head) points, if any
    pub fn selection(&self) -> Option<(SurfacePoint, SurfacePoint)> {
        self.selection
    }

    pub fn set_selection(&mut self, anchor: SurfacePoint, head: SurfacePoint) {
        self.selection = Some((anchor, head));
        if !self.ignore {
            self.selection_dirty = true;
        }
    }

    /// Collapse the selection to a single point
    pub fn collapse_selection(&mut self, point: SurfacePoint) {
        self.set_selection(point, point);
    }

    fn record(&mut self, record: MutationRecord) {
        if !self.ignore {
            self.queue.push(record);
        }
    }

    pub(crate) fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.queue)
    }

    pub(crate) fn has_records(&self) -> bool {
        !self.queue.is_empty()
    }

    pub(crate) fn take_selection_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.selection_dirty, false)
    }

    pub(crate) fn set_ignore(&mut self, ignore: bool) {
        self.ignore = ignore;
    }
}

impl Default for Surface {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutations_queue_records() {
        let mut surface = Surface::new();
        let root = surface.root();
        let line = surface.create_element();
        let text = surface.create_text("hello");
        surface.append_child(root, line).unwrap();
        surface.append_child(line, text).unwrap();
        surface.set_text(text, "world").unwrap();

        let records = surface.take_records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].target, root);
        assert_eq!(records[0].added, vec![line]);
        assert!(records[2].character_data);
        assert_eq!(records[2].target, text);
        assert!(!surface.has_records());
    }

    #[test]
    fn test_ignored_mutations_do_not_queue() {
        let mut surface = Surface::new();
        let root = surface.root();
        let line = surface.create_element();
        surface.set_ignore(true);
        surface.append_child(root, line).unwrap();
        surface.set_ignore(false);
        assert!(!surface.has_records());
    }

    #[test]
    fn test_remove_detaches_subtree() {
        let mut surface = Surface::new();
        let root = surface.root();
        let line = surface.create_element();
        let text = surface.create_text("x");
        surface.append_child(root, line).unwrap();
        surface.append_child(line, text).unwrap();
        assert!(surface.is_attached(text));

        surface.remove_child(root, line).unwrap();
        assert!(!surface.is_attached(text));
        assert!(!surface.is_attached(line));
        // Value survives detachment, stale records can still resolve it
        assert_eq!(surface.text_value(text), Some("x"));
    }

    #[test]
    fn test_insert_before_positions_child() {
        let mut surface = Surface::new();
        let root = surface.root();
        let a = surface.create_text("a");
        let b = surface.create_text("b");
        surface.append_child(root, a).unwrap();
        surface.insert_before(root, b, Some(a)).unwrap();
        assert_eq!(surface.children(root), &[b, a]);
    }

    #[test]
    fn test_append_moves_attached_node() {
        let mut surface = Surface::new();
        let root = surface.root();
        let first = surface.create_element();
        let second = surface.create_element();
        let text = surface.create_text("x");
        surface.append_child(root, first).unwrap();
        surface.append_child(root, second).unwrap();
        surface.append_child(first, text).unwrap();
        surface.append_child(second, text).unwrap();
        assert_eq!(surface.children(first), &[]);
        assert_eq!(surface.children(second), &[text]);
    }

    #[test]
    fn test_structural_misuse_is_an_error() {
        let mut surface = Surface::new();
        let root = surface.root();
        let text = surface.create_text("x");
        let other = surface.create_text("y");
        surface.append_child(root, text).unwrap();

        assert!(matches!(
            surface.append_child(text, other),
            Err(EngineError::NotAnElement(_))
        ));
        assert!(matches!(
            surface.set_text(root, "nope"),
            Err(EngineError::NotAText(_))
        ));
        assert!(matches!(
            surface.remove_child(root, other),
            Err(EngineError::NotAChild(..))
        ));
        assert!(matches!(
            surface.append_child(root, root),
            Err(EngineError::WouldCreateCycle(_))
        ));
    }

    #[test]
    fn test_selection_marks_dirty_only_for_host_changes() {
        let mut surface = Surface::new();
        let text = surface.create_text("abc");
        surface.collapse_selection(SurfacePoint::new(text, 1));
        assert!(surface.take_selection_dirty());

        surface.set_ignore(true);
        surface.collapse_selection(SurfacePoint::new(text, 2));
        surface.set_ignore(false);
        assert!(!surface.take_selection_dirty());
    }
}
