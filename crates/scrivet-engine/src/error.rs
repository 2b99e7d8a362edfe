use thiserror::Error;

use crate::surface::NodeId;

/// Errors surfaced by the engine's host-facing APIs.
///
/// Reconciliation itself never fails: malformed surface states degrade into
/// wider replacements instead. These errors only arise from direct API misuse,
/// such as handing the engine offsets or nodes that do not exist.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("offset {offset} is beyond document length {len}")]
    OffsetOutOfBounds { offset: usize, len: usize },

    #[error("offset {offset} is not a char boundary")]
    NotACharBoundary { offset: usize },

    #[error("node {0:?} is not part of this surface")]
    UnknownNode(NodeId),

    #[error("node {0:?} cannot contain children")]
    NotAnElement(NodeId),

    #[error("node {0:?} does not hold text")]
    NotAText(NodeId),

    #[error("node {0:?} is not a child of node {1:?}")]
    NotAChild(NodeId, NodeId),

    #[error("inserting node {0:?} here would create a cycle")]
    WouldCreateCycle(NodeId),
}
