use crate::editing::{PendingChange, map_range};

/// Why a document range is protected from surface resynchronization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationRole {
    /// An active composition session owns this range; the surface holds
    /// uncommitted text there that must not be rewritten
    Composition,
    /// The host replaced this range with content of its own and keeps it in
    /// sync itself
    Replaced,
}

/// A protected document range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub range: std::ops::Range<usize>,
    pub role: AnnotationRole,
}

impl Annotation {
    pub fn new(range: std::ops::Range<usize>, role: AnnotationRole) -> Self {
        Self { range, role }
    }
}

/// Map every annotation through a committed change
pub(crate) fn map_annotations(annotations: &mut [Annotation], change: &PendingChange) {
    for annotation in annotations.iter_mut() {
        annotation.range = map_range(&annotation.range, change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotations_move_with_edits_before_them() {
        let mut annotations = vec![Annotation::new(4..7, AnnotationRole::Composition)];
        map_annotations(&mut annotations, &PendingChange::new(0, 1, "xxx"));
        assert_eq!(annotations[0].range, 6..9);
    }

    #[test]
    fn test_annotation_start_moves_past_insertion_at_boundary() {
        let mut annotations = vec![Annotation::new(4..7, AnnotationRole::Replaced)];
        map_annotations(&mut annotations, &PendingChange::new(4, 4, "\n"));
        assert_eq!(annotations[0].range, 5..8);
    }
}
