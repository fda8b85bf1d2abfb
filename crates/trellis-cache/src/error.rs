//! Errors surfaced by the read path.
//!
//! Only a query the compiler cannot turn into a usable selection tree is an
//! error. Everything else (absent fields, unresolved parameterized
//! identities) is data: `complete: false` plus a missing-selection list.

/// Errors that can occur while compiling a query for reading.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The operation's root selection set is empty after directive filtering.
    #[error("malformed query: root selection set is empty")]
    EmptySelectionSet,

    /// A fragment spread names a fragment the document does not define.
    #[error("malformed query: unknown fragment `{0}`")]
    UnknownFragment(String),
}

/// Result type for read-path operations.
pub type Result<T> = std::result::Result<T, Error>;
