use thiserror::Error;

use scribe_core::RewindError;
use scribe_core::TransitionError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("document is read-only")]
    ReadOnly,
    #[error("document lock was poisoned by a panicked writer")]
    Poisoned,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MutationError {
    #[error("selection {start}..{end} is outside a document of {len} characters")]
    SelectionOutOfBounds { start: usize, end: usize, len: usize },
    #[error("selection start {start} is after its end {end}")]
    InvertedSelection { start: usize, end: usize },
    #[error(transparent)]
    Document(#[from] DocumentError),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Rewind(#[from] RewindError),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// A failure below the chunk protocol, such as a dropped connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
