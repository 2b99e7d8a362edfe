//! Composition session tracking.
//!
//! While an IME composes, the surface holds text the document has not
//! committed yet. The tracker pins the composed node, keeps its document
//! range up to date across unrelated edits, and decides when a session must
//! be abandoned because an edit landed inside it.

use crate::editing::{PendingChange, map_range, ranges_overlap};
use crate::surface::NodeId;

/// A live composition: the surface node being composed into and the document
/// range it stands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionSession {
    /// Text node receiving composed input
    pub(crate) node: NodeId,
    /// Rendered line element containing it
    pub(crate) line: NodeId,
    /// Document range the node corresponds to; a caret for a node the
    /// document does not know yet
    pub(crate) range: std::ops::Range<usize>,
    /// Node value at the last flush
    pub(crate) last_observed: String,
    /// Document span dirtied by records absorbed mid-session; folded into
    /// the commit region
    pub(crate) absorbed: Option<std::ops::Range<usize>>,
}

impl CompositionSession {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.range.clone()
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub(crate) fn absorb(&mut self, range: std::ops::Range<usize>) {
        self.absorbed = Some(match self.absorbed.take() {
            Some(cur) => cur.start.min(range.start)..cur.end.max(range.end),
            None => range,
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CompositionState {
    Idle,
    /// Start signal seen; the target node is resolved at the next flush,
    /// never cached from an earlier session
    Pending,
    Composing(CompositionSession),
}

pub(crate) struct CompositionTracker {
    pub(crate) state: CompositionState,
    /// End signal seen; the next flush commits
    pub(crate) ending: bool,
    /// A new start signal arrived before the commit ran
    restart: bool,
}

impl CompositionTracker {
    pub(crate) fn new() -> Self {
        Self {
            state: CompositionState::Idle,
            ending: false,
            restart: false,
        }
    }

    pub(crate) fn start(&mut self) {
        match self.state {
            CompositionState::Idle => {
                self.state = CompositionState::Pending;
                self.ending = false;
            }
            _ if self.ending => self.restart = true,
            // Spurious start mid-session, nothing to do
            _ => {}
        }
    }

    pub(crate) fn end(&mut self) {
        if self.state != CompositionState::Idle {
            self.ending = true;
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state != CompositionState::Idle
    }

    pub(crate) fn is_composing(&self) -> bool {
        matches!(self.state, CompositionState::Composing(_))
    }

    pub(crate) fn session(&self) -> Option<&CompositionSession> {
        match &self.state {
            CompositionState::Composing(session) => Some(session),
            _ => None,
        }
    }

    pub(crate) fn session_mut(&mut self) -> Option<&mut CompositionSession> {
        match &mut self.state {
            CompositionState::Composing(session) => Some(session),
            _ => None,
        }
    }

    pub(crate) fn begin(&mut self, session: CompositionSession) {
        self.state = CompositionState::Composing(session);
    }

    pub(crate) fn cancel(&mut self) {
        self.state = CompositionState::Idle;
        self.ending = false;
        self.restart = false;
    }

    /// Clear the committed session; goes straight to `Pending` when another
    /// start signal already arrived (rapid back-to-back compositions)
    pub(crate) fn finish(&mut self) {
        self.ending = false;
        self.state = if std::mem::replace(&mut self.restart, false) {
            CompositionState::Pending
        } else {
            CompositionState::Idle
        };
    }

    /// React to a committed change: an edit overlapping the composed range
    /// kills the session, anything else just shifts it. Returns true when
    /// the session was cancelled.
    pub(crate) fn apply_change(&mut self, change: &PendingChange) -> bool {
        let CompositionState::Composing(session) = &mut self.state else {
            return false;
        };
        if ranges_overlap(&(change.from..change.to), &session.range) {
            self.cancel();
            return true;
        }
        session.range = map_range(&session.range, change);
        if let Some(absorbed) = session.absorbed.take() {
            session.absorbed = Some(map_range(&absorbed, change));
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composing(range: std::ops::Range<usize>) -> CompositionTracker {
        let mut tracker = CompositionTracker::new();
        tracker.start();
        tracker.begin(CompositionSession {
            node: NodeId(1),
            line: NodeId(0),
            range,
            last_observed: String::new(),
            absorbed: None,
        });
        tracker
    }

    #[test]
    fn test_overlapping_change_cancels() {
        let mut tracker = composing(5..6);
        assert!(tracker.apply_change(&PendingChange::new(2, 10, "---")));
        assert!(!tracker.is_active());
    }

    #[test]
    fn test_disjoint_change_remaps() {
        let mut tracker = composing(5..6);
        assert!(!tracker.apply_change(&PendingChange::new(1, 2, "!!")));
        assert_eq!(tracker.session().unwrap().range(), 6..7);
    }

    #[test]
    fn test_insertion_at_start_shifts_without_cancelling() {
        let mut tracker = composing(4..13);
        assert!(!tracker.apply_change(&PendingChange::new(4, 4, "\n")));
        assert_eq!(tracker.session().unwrap().range(), 5..14);
    }

    #[test]
    fn test_insertion_strictly_inside_cancels() {
        let mut tracker = composing(4..13);
        assert!(tracker.apply_change(&PendingChange::new(5, 5, "!")));
        assert!(!tracker.is_active());
    }

    #[test]
    fn test_restart_queues_next_session() {
        let mut tracker = composing(0..3);
        tracker.end();
        tracker.start();
        tracker.finish();
        assert_eq!(tracker.state, CompositionState::Pending);
        assert!(!tracker.ending);
    }
}
