//! Mutation batching: records queued by the surface and the inference of
//! which document region a batch of records dirtied.

use crate::surface::{NodeId, Renderer, Surface};

/// One observed surface mutation, in platform observer shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// The node the mutation happened on: the parent for child-list churn,
    /// the text node itself for character data
    pub target: NodeId,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
    pub character_data: bool,
}

/// Document region a batch of mutation records covers, as line indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DirtyRegion {
    None,
    /// Inclusive span of dirtied line indices
    Lines { first: usize, last: usize },
    /// Lines were added or removed at the root; re-read everything
    Whole,
}

impl DirtyRegion {
    pub(crate) fn add_line(self, line: usize) -> Self {
        match self {
            DirtyRegion::None => DirtyRegion::Lines {
                first: line,
                last: line,
            },
            DirtyRegion::Lines { first, last } => DirtyRegion::Lines {
                first: first.min(line),
                last: last.max(line),
            },
            DirtyRegion::Whole => DirtyRegion::Whole,
        }
    }

    pub(crate) fn merge(self, other: Self) -> Self {
        match (self, other) {
            (DirtyRegion::Whole, _) | (_, DirtyRegion::Whole) => DirtyRegion::Whole,
            (DirtyRegion::None, region) | (region, DirtyRegion::None) => region,
            (DirtyRegion::Lines { first, last }, DirtyRegion::Lines { first: f, last: l }) => {
                DirtyRegion::Lines {
                    first: first.min(f),
                    last: last.max(l),
                }
            }
        }
    }

    pub(crate) fn is_none(&self) -> bool {
        matches!(self, DirtyRegion::None)
    }
}

/// Work out which rendered lines a batch of records touched.
///
/// Child-list churn directly under the root means lines came or went, which
/// invalidates the whole line table; so does any mutation on a node the
/// renderer cannot attribute to a line it knows. Everything else collapses to
/// the span of affected lines.
pub(crate) fn infer_region(
    surface: &Surface,
    renderer: &Renderer,
    records: &[MutationRecord],
) -> DirtyRegion {
    let mut region = DirtyRegion::None;
    for record in records {
        if record.target == surface.root() {
            return DirtyRegion::Whole;
        }
        region = region.merge(line_of(surface, renderer, record.target));
    }
    region
}

fn line_of(surface: &Surface, renderer: &Renderer, node: NodeId) -> DirtyRegion {
    // Walk up to the root child this node lives under
    let mut cur = node;
    loop {
        match surface.parent(cur) {
            Some(parent) if parent == surface.root() => break,
            Some(parent) => cur = parent,
            // Detached while further records were queued; the removal itself
            // was recorded against an attached parent
            None => return DirtyRegion::None,
        }
    }
    match renderer.line_of_element(cur) {
        Some(line) => DirtyRegion::None.add_line(line),
        None => DirtyRegion::Whole,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_spans_lines() {
        let region = DirtyRegion::None.add_line(4).add_line(1).add_line(2);
        assert_eq!(region, DirtyRegion::Lines { first: 1, last: 4 });
        assert_eq!(
            region.merge(DirtyRegion::Whole),
            DirtyRegion::Whole,
            "whole-document churn swallows line spans"
        );
    }

    #[test]
    fn test_merge_none_is_identity() {
        let lines = DirtyRegion::Lines { first: 2, last: 3 };
        assert_eq!(DirtyRegion::None.merge(lines), lines);
        assert!(DirtyRegion::None.merge(DirtyRegion::None).is_none());
    }
}
