//! The document side of the engine: the versioned text model, transactions,
//! change detection, selection, and the bookkeeping (annotations, composition
//! sessions) that reconciliation needs to apply edits safely.

mod annotations;
mod change;
mod composition;
mod document;
mod selection;

pub use annotations::{Annotation, AnnotationRole};
pub use change::{Bias, KeyAction, PendingChange, map_pos};
pub use composition::CompositionSession;
pub use document::{Document, Patch, Transaction};
pub use selection::Selection;

pub(crate) use annotations::map_annotations;
pub(crate) use change::{find_diff, map_range, ranges_overlap};
pub(crate) use composition::CompositionTracker;
