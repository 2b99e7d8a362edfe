//! The editor view: owns the document, the surface and everything between
//! them, and drives reconciliation.
//!
//! The host mutates the surface tree however it likes, then calls
//! [`EditorView::flush`]. The flush drains the mutation queue exactly once,
//! works out which document region the batch dirtied, reads that region back
//! from the surface, diffs it against what the document expects, and commits
//! the difference as a transaction. Committed transactions flow back out
//! through the renderer so the surface never shows stale text.

use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::config::EngineConfig;
use crate::editing::{
    Annotation, AnnotationRole, CompositionSession, CompositionTracker, Document, KeyAction,
    PendingChange, Selection, Transaction, find_diff, map_annotations,
};
use crate::error::EngineError;
use crate::surface::{
    DirtyRegion, NodeId, NodeKind, ProtectedSpan, Renderer, Surface, SurfacePoint, infer_region,
    read_children,
};

/// Host hook that may take over a computed change before it is dispatched.
/// Returning true swallows the change; the hook is expected to have
/// dispatched a replacement itself.
pub type InputFilter = Box<dyn FnMut(&mut EditorView, &PendingChange) -> bool>;

/// A document, its editable surface, and the reconciliation machinery
/// keeping the two in step
pub struct EditorView {
    doc: Document,
    surface: Surface,
    renderer: Renderer,
    composition: CompositionTracker,
    annotations: Vec<Annotation>,
    key_hint: Option<(KeyAction, Instant)>,
    input_filter: Option<InputFilter>,
    config: EngineConfig,
    /// Re-entrancy guard; a flush triggered from within a flush is a no-op
    flushing: bool,
}

impl EditorView {
    pub fn new(text: &str) -> Self {
        Self::with_config(text, EngineConfig::default())
    }

    pub fn with_config(text: &str, config: EngineConfig) -> Self {
        let doc = Document::new(text);
        let mut surface = Surface::new();
        let mut renderer = Renderer::new();
        renderer.sync(&doc, &mut surface, &[]);
        Self {
            doc,
            surface,
            renderer,
            composition: CompositionTracker::new(),
            annotations: Vec::new(),
            key_hint: None,
            input_filter: None,
            config,
            flushing: false,
        }
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    /// Current document text
    pub fn text(&self) -> String {
        self.doc.text()
    }

    pub fn selection(&self) -> Selection {
        self.doc.selection()
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// The surface, for the host to mutate. Changes are picked up at the
    /// next [`flush`](Self::flush).
    pub fn surface_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }

    /// Whether a composition session is live (started and not yet committed
    /// or cancelled)
    pub fn is_composing(&self) -> bool {
        self.composition.is_active()
    }

    /// The resolved composition session, once the first flush after the
    /// start signal identified the composed node
    pub fn composition_session(&self) -> Option<&CompositionSession> {
        self.composition.session()
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Surface point currently showing the given document offset
    pub fn point_at(&self, pos: usize) -> Option<SurfacePoint> {
        self.renderer.point_at(pos)
    }

    /// Report a key action; a recent one disambiguates the next diff
    pub fn set_key_hint(&mut self, action: KeyAction) {
        self.key_hint = Some((action, Instant::now()));
    }

    pub fn set_input_filter(&mut self, filter: InputFilter) {
        self.input_filter = Some(filter);
    }

    pub fn clear_input_filter(&mut self) {
        self.input_filter = None;
    }

    /// Hand a document range over to the host: the renderer stops touching
    /// the lines it covers
    pub fn mark_replaced(&mut self, range: std::ops::Range<usize>) {
        self.annotations
            .push(Annotation::new(range, AnnotationRole::Replaced));
        self.render();
    }

    pub fn clear_replaced(&mut self) {
        self.annotations
            .retain(|annotation| annotation.role != AnnotationRole::Replaced);
        self.render();
    }

    /// The host signals that platform composition began. The composed node
    /// is resolved from the cursor at the next flush, never carried over
    /// from a previous session.
    pub fn composition_start(&mut self) {
        self.composition.start();
    }

    /// The host signals that platform composition ended; the next flush
    /// commits the session as a single transaction
    pub fn composition_end(&mut self) {
        self.composition.end();
    }

    /// Apply a host-supplied change directly, bypassing surface diffing
    pub fn apply_direct_input(
        &mut self,
        from: usize,
        to: usize,
        text: &str,
    ) -> Result<(), EngineError> {
        let len = self.doc.len();
        let (from, to) = (from.min(to), from.max(to));
        if to > len {
            return Err(EngineError::OffsetOutOfBounds { offset: to, len });
        }
        let doc_text = self.doc.text();
        for offset in [from, to] {
            if !doc_text.is_char_boundary(offset) {
                return Err(EngineError::NotACharBoundary { offset });
            }
        }
        self.dispatch(Transaction::change(from, to, text));
        Ok(())
    }

    /// Commit a transaction: apply it to the document, remap annotations and
    /// any live composition, and resynchronize the surface
    pub fn dispatch(&mut self, tr: Transaction) {
        if let Some(change) = tr.change.clone() {
            trace!(
                "dispatch: replace {}..{} with {} bytes",
                change.from,
                change.to,
                change.insert.len()
            );
            self.doc.apply(&tr);
            map_annotations(&mut self.annotations, &change);
            if self.composition.apply_change(&change) {
                debug!("composition cancelled by overlapping change");
                self.annotations
                    .retain(|annotation| annotation.role != AnnotationRole::Composition);
            }
        } else {
            self.doc.apply(&tr);
        }
        self.render();
    }

    /// Drain the mutation queue and reconcile. Synchronous, ordered, exactly
    /// once; flushing an empty queue changes nothing.
    pub fn flush(&mut self) {
        if self.flushing {
            return;
        }
        self.flushing = true;
        self.flush_inner();
        self.flushing = false;
    }

    fn flush_inner(&mut self) {
        let records = self.surface.take_records();
        let selection_dirty = self.surface.take_selection_dirty();
        if records.is_empty() && !selection_dirty && !self.composition.is_active() {
            return;
        }
        trace!("flush: {} records", records.len());

        let region = infer_region(&self.surface, &self.renderer, &records);

        if self.composition.is_composing() {
            if self.composition.ending {
                self.commit_composition(region);
            } else {
                self.interim_flush(region);
            }
            return;
        }

        if self.composition.is_active() {
            // Pending session
            if self.composition.ending {
                // Started and ended without ever resolving a target; the
                // mutations are ordinary input
                self.composition.finish();
            } else if self.resolve_composition(region) {
                return;
            }
        }

        self.reconcile(region, selection_dirty, true);
    }

    /// Identify the composed node from the surface cursor and open the
    /// session. Returns false when no target can be found, in which case the
    /// batch is handled as ordinary input.
    fn resolve_composition(&mut self, region: DirtyRegion) -> bool {
        let Some((_, head)) = self.surface.selection() else {
            return false;
        };
        let Some(node) = self.nearby_text_node(head) else {
            return false;
        };
        let Some(line) = self.line_element_of(node) else {
            return false;
        };

        let range = match self.renderer.doc_range_of_text(node) {
            Some(range) => range,
            None => {
                // The document does not know this node yet; it composes at a
                // caret between what it does know
                let caret = self.caret_before(node, line);
                caret..caret
            }
        };
        let value = self
            .surface
            .text_value(node)
            .unwrap_or_default()
            .to_string();
        debug!("composition anchored at {:?}", range);

        self.annotations
            .push(Annotation::new(range.clone(), AnnotationRole::Composition));
        let mut session = CompositionSession {
            node,
            line,
            range: range.clone(),
            last_observed: value,
            absorbed: None,
        };
        if let Some(dirtied) = self.region_doc_range(region) {
            session.absorb(dirtied);
        }
        self.composition.begin(session);

        let head_pos = if head.node == node {
            range.start + head.offset
        } else {
            range.start
        };
        self.doc.set_selection(Selection::cursor(head_pos));
        true
    }

    /// A flush in the middle of a session: note what the surface holds now,
    /// but commit nothing
    fn interim_flush(&mut self, region: DirtyRegion) {
        let node = self.composition.session().map(|s| s.node);
        let Some(node) = node else { return };

        let alive = self.surface.is_attached(node) && self.surface.text_value(node).is_some();
        if !alive {
            debug!("composition target gone, cancelling session");
            self.composition.cancel();
            self.annotations
                .retain(|annotation| annotation.role != AnnotationRole::Composition);
            self.reconcile(region, false, false);
            return;
        }

        let value = self.surface.text_value(node).unwrap_or_default().to_string();
        let head = self.surface.selection().map(|(_, head)| head);
        let dirtied = self.region_doc_range(region);
        let Some(session) = self.composition.session_mut() else {
            return;
        };
        session.last_observed = value;
        if let Some(dirtied) = dirtied {
            session.absorb(dirtied);
        }
        let base = session.range.start;
        if let Some(head) = head {
            if head.node == node {
                self.doc.set_selection(Selection::cursor(base + head.offset));
            }
        }
    }

    /// The end signal arrived: fold everything the session touched into one
    /// region and commit it as a single transaction
    fn commit_composition(&mut self, region: DirtyRegion) {
        let Some(session) = self.composition.session().cloned() else {
            return;
        };
        self.annotations
            .retain(|annotation| annotation.role != AnnotationRole::Composition);

        let mut range = session.range.clone();
        if let Some(absorbed) = session.absorbed {
            range = range.start.min(absorbed.start)..range.end.max(absorbed.end);
        }
        if let Some(dirtied) = self.region_doc_range(region) {
            range = range.start.min(dirtied.start)..range.end.max(dirtied.end);
        }
        // Clear the session before dispatching so the commit cannot cancel
        // itself
        self.composition.finish();
        debug!("committing composition over {:?}", range);

        let first = self.doc.line_index_at(range.start);
        let last = self.doc.line_index_at(range.end);
        self.reconcile_region(DirtyRegion::Lines { first, last }, false, true);

        // Rapid back-to-back compositions: the next session already started
        if self.composition.is_active() {
            self.resolve_composition(DirtyRegion::None);
        }
    }

    fn reconcile(&mut self, region: DirtyRegion, selection_dirty: bool, allow_hint: bool) {
        match region {
            DirtyRegion::None => {
                if selection_dirty {
                    self.reconcile_selection_only();
                }
            }
            region => self.reconcile_region(region, allow_hint, false),
        }
    }

    /// Read `region` back from the surface, diff it against the document, and
    /// dispatch the result. With `force_selection` set, the selection read
    /// from the surface is always dispatched explicitly; position mapping
    /// cannot be trusted when the document selection was already tracking the
    /// surface cursor, as it does during a composition.
    fn reconcile_region(&mut self, region: DirtyRegion, allow_hint: bool, force_selection: bool) {
        let line_ranges = self.doc.line_ranges();
        let root_children = self.surface.children(self.surface.root()).to_vec();

        let (expected_range, nodes, base) = match region {
            DirtyRegion::Whole => (0..self.doc.len(), root_children, 0),
            DirtyRegion::Lines { first, last } => {
                let first = first.min(line_ranges.len() - 1);
                let last = last.min(line_ranges.len() - 1);
                let expected = line_ranges[first].start..line_ranges[last].end;
                let lo = first.min(root_children.len());
                let hi = (last + 1).min(root_children.len());
                (expected, root_children[lo..hi].to_vec(), lo)
            }
            DirtyRegion::None => return,
        };

        let read = read_children(&self.surface, &nodes, base);
        let expected = self.doc.slice_to_cow(expected_range.clone()).to_string();

        let sel = self.doc.selection();
        let backspace = allow_hint && self.fresh_hint() == Some(KeyAction::Backspace);
        let (preferred, anchor_end) = if backspace {
            (sel.max(), true)
        } else {
            (sel.min(), false)
        };
        let preferred = preferred.saturating_sub(expected_range.start);

        let new_sel = match (read.anchor, read.head) {
            (Some(anchor), Some(head)) => Some(Selection::new(
                expected_range.start + anchor,
                expected_range.start + head,
            )),
            _ => None,
        };

        match find_diff(&expected, &read.text, preferred, anchor_end) {
            Some(diff) => {
                let change = PendingChange::new(
                    expected_range.start + diff.from,
                    expected_range.start + diff.to_a,
                    read.text[diff.from..diff.to_b].to_string(),
                );
                if let Some(mut filter) = self.input_filter.take() {
                    let handled = filter(self, &change);
                    if self.input_filter.is_none() {
                        self.input_filter = Some(filter);
                    }
                    if handled {
                        return;
                    }
                }
                // A surface selection that merely followed the edit is left
                // to position mapping instead
                let explicit = new_sel.filter(|s| force_selection || *s != sel);
                self.dispatch(Transaction {
                    change: Some(change),
                    selection: explicit,
                });
            }
            None => {
                if let Some(new_sel) = new_sel.filter(|s| *s != sel) {
                    self.dispatch(Transaction::selection(new_sel));
                } else {
                    // Structure churned without changing text; rebuild the
                    // line bookkeeping so stale nodes drop out
                    self.render();
                }
            }
        }
    }

    /// The native selection moved without any tree mutation
    fn reconcile_selection_only(&mut self) {
        let Some((anchor, head)) = self.surface.selection() else {
            return;
        };
        let (Some(anchor), Some(head)) = (
            self.doc_pos_of_point(anchor),
            self.doc_pos_of_point(head),
        ) else {
            return;
        };
        let new_sel = Selection::new(anchor, head);
        if new_sel != self.doc.selection() {
            self.dispatch(Transaction::selection(new_sel));
        }
    }

    fn render(&mut self) {
        let session_line = self.composition.session().map(|session| session.line);
        let spans: Vec<ProtectedSpan> = self
            .annotations
            .iter()
            .map(|annotation| ProtectedSpan {
                range: annotation.range.clone(),
                element: match annotation.role {
                    AnnotationRole::Composition => session_line,
                    AnnotationRole::Replaced => None,
                },
            })
            .collect();
        self.renderer.sync(&self.doc, &mut self.surface, &spans);
    }

    fn fresh_hint(&self) -> Option<KeyAction> {
        let (action, at) = self.key_hint?;
        let window = Duration::from_millis(self.config.key_hint_window_ms);
        (at.elapsed() <= window).then_some(action)
    }

    fn region_doc_range(&self, region: DirtyRegion) -> Option<std::ops::Range<usize>> {
        let line_ranges = self.doc.line_ranges();
        match region {
            DirtyRegion::None => None,
            DirtyRegion::Whole => Some(0..self.doc.len()),
            DirtyRegion::Lines { first, last } => {
                let first = first.min(line_ranges.len() - 1);
                let last = last.min(line_ranges.len() - 1);
                Some(line_ranges[first].start..line_ranges[last].end)
            }
        }
    }

    /// The text node a selection point effectively sits in
    fn nearby_text_node(&self, point: SurfacePoint) -> Option<NodeId> {
        match self.surface.kind(point.node)? {
            NodeKind::Text(_) => Some(point.node),
            NodeKind::Element => {
                let children = self.surface.children(point.node);
                let before = point
                    .offset
                    .checked_sub(1)
                    .and_then(|i| children.get(i))
                    .copied();
                let at = children.get(point.offset).copied();
                [before, at]
                    .into_iter()
                    .flatten()
                    .find(|&id| matches!(self.surface.kind(id), Some(NodeKind::Text(_))))
            }
            NodeKind::Break { .. } => None,
        }
    }

    /// The root child (rendered line) a node lives under
    fn line_element_of(&self, node: NodeId) -> Option<NodeId> {
        let mut cur = node;
        loop {
            let parent = self.surface.parent(cur)?;
            if parent == self.surface.root() {
                return match self.surface.kind(cur) {
                    Some(NodeKind::Element) => Some(cur),
                    _ => None,
                };
            }
            cur = parent;
        }
    }

    /// Caret position for a surface node the document does not know:
    /// after the nearest preceding sibling it does know, else the line start
    fn caret_before(&self, node: NodeId, line: NodeId) -> usize {
        let line_range = self
            .renderer
            .line_of_element(line)
            .and_then(|index| self.renderer.line_entry(index))
            .map(|entry| entry.range.clone());
        let Some(line_range) = line_range else {
            return self.doc.selection().head.min(self.doc.len());
        };
        let mut caret = line_range.start;
        for &child in self.surface.children(line) {
            if child == node {
                break;
            }
            if let Some(range) = self.renderer.doc_range_of_text(child) {
                caret = range.end;
            }
        }
        caret
    }

    fn doc_pos_of_point(&self, point: SurfacePoint) -> Option<usize> {
        match self.surface.kind(point.node)? {
            NodeKind::Text(value) => {
                let offset = point.offset.min(value.len());
                self.renderer
                    .doc_range_of_text(point.node)
                    .map(|range| range.start + offset)
            }
            NodeKind::Element => {
                if point.node == self.surface.root() {
                    return Some(match self.renderer.line_entry(point.offset) {
                        Some(entry) => entry.range.start,
                        None => self.doc.len(),
                    });
                }
                let index = self.renderer.line_of_element(point.node)?;
                let entry = self.renderer.line_entry(index)?;
                Some(if point.offset == 0 {
                    entry.range.start
                } else {
                    entry.range.end
                })
            }
            NodeKind::Break { .. } => {
                let parent = self.surface.parent(point.node)?;
                let index = self.renderer.line_of_element(parent)?;
                self.renderer
                    .line_entry(index)
                    .map(|entry| entry.range.start)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_with_empty_queue_is_a_no_op() {
        let mut view = EditorView::new("hello");
        let version = view.doc().version();
        view.flush();
        view.flush();
        assert_eq!(view.doc().version(), version);
        assert_eq!(view.text(), "hello");
    }

    #[test]
    fn test_direct_input_bypasses_diffing() {
        let mut view = EditorView::new("hello world");
        view.apply_direct_input(6, 11, "there").unwrap();
        assert_eq!(view.text(), "hello there");
        // Surface follows immediately
        let roots = view.surface().children(view.surface().root()).to_vec();
        let read = read_children(view.surface(), &roots, 0);
        assert_eq!(read.text, "hello there");
    }

    #[test]
    fn test_direct_input_validates_offsets() {
        let mut view = EditorView::new("héllo");
        assert!(matches!(
            view.apply_direct_input(0, 99, "x"),
            Err(EngineError::OffsetOutOfBounds { .. })
        ));
        assert!(matches!(
            view.apply_direct_input(2, 2, "x"),
            Err(EngineError::NotACharBoundary { offset: 2 })
        ));
        assert_eq!(view.text(), "héllo", "failed input leaves the doc alone");
    }

    #[test]
    fn test_selection_only_flush_dispatches_update() {
        let mut view = EditorView::new("foo\nbar");
        let point = view.point_at(5).unwrap();
        view.surface_mut().collapse_selection(point);
        let version = view.doc().version();
        view.flush();
        assert_eq!(view.selection(), Selection::cursor(5));
        assert!(view.doc().version() > version);
    }

    #[test]
    fn test_replaced_annotation_shields_a_line() {
        let mut view = EditorView::new("foo\nbar\nbaz");
        let line = view.point_at(5).unwrap().node;
        view.mark_replaced(4..7);
        // The host rewrites its line; the renderer must not fight it
        view.surface_mut().set_text(line, "custom").unwrap();
        view.surface_mut().take_records();
        view.apply_direct_input(0, 3, "xxx").unwrap();
        assert_eq!(view.surface().text_value(line), Some("custom"));
    }
}
