//! Reconciliation engine for live editable text surfaces.
//!
//! A host embeds a [`Surface`] (a stand-in for an uncontrolled editable
//! rendering tree, contenteditable-style) and a versioned [`Document`]. The
//! host and the platform mutate the surface freely; the engine never
//! intercepts input. Instead, [`EditorView::flush`] drains the recorded
//! mutations, infers the dirtied document region, reads the region's text and
//! selection back out of the tree, diffs it against the document, and commits
//! the difference as a transaction. The renderer then rewrites the surface to
//! match, preserving node identity wherever it can so platform state (cursor,
//! focus, IME) keyed on those nodes survives.
//!
//! IME composition gets special treatment: between the start and end signals
//! the composed node is pinned and the document is not touched, and the whole
//! session commits as a single change when composition ends.

pub mod config;
pub mod editing;
pub mod error;
pub mod surface;

mod view;

pub use config::{ConfigError, EngineConfig};
pub use editing::{
    Annotation, AnnotationRole, Bias, CompositionSession, Document, KeyAction, Patch,
    PendingChange, Selection, Transaction, map_pos,
};
pub use error::EngineError;
pub use surface::{MutationRecord, NodeId, NodeKind, Surface, SurfacePoint};
pub use view::{EditorView, InputFilter};
