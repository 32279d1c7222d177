//! Error types for the seekspec crate.

use thiserror::Error;

/// Errors raised while compiling a query request.
///
/// Every variant is produced before a [`Source`](crate::Source) is touched,
/// so a request can be validated without running it.
#[derive(Debug, Error)]
pub enum SeekError {
    /// A field path segment does not exist on the type it was resolved against.
    #[error("field not found: '{path}'")]
    FieldNotFound { path: String },

    /// A request value cannot be converted to the field's declared type.
    #[error("cannot coerce {from} value to {to}")]
    Coercion { from: &'static str, to: &'static str },

    /// A collection field was filtered without an element-scoped sub-filter.
    #[error("ambiguous filter on collection '{path}': wrap element conditions in a sub-filter or $any")]
    AmbiguousCollectionFilter { path: String },

    /// An operator token is unknown or used outside a field context.
    #[error("invalid operator '{token}'")]
    InvalidOperator { token: String },

    /// Operator is not valid for the given value type.
    #[error("operator '{op}' is not valid for {value_type} values")]
    InvalidOperatorForType {
        op: &'static str,
        value_type: &'static str,
    },

    /// The filter document has the wrong shape.
    #[error("malformed filter: {0}")]
    MalformedFilter(String),

    /// Invalid regular expression pattern.
    #[error("invalid regex pattern: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// A cursor token could not be decoded or does not match the sort.
    #[error("malformed cursor: {0}")]
    MalformedCursor(String),

    /// Both `before` and `after` were supplied.
    #[error("'before' and 'after' cursors are mutually exclusive")]
    ConflictingCursors,

    #[error("invalid sort direction '{token}', expected 'asc' or 'desc'")]
    InvalidSortDirection { token: String },

    /// Sort paths may cross nested objects but not collections.
    #[error("cannot sort by '{path}': path crosses a collection")]
    UnsortableField { path: String },

    #[error("search depth must not be negative, got {0}")]
    InvalidSearchDepth(i32),

    #[error("invalid pagination: {0}")]
    InvalidPagination(String),

    /// `then_include` without a preceding include, or an unknown include path.
    #[error("invalid include '{path}'")]
    InvalidInclude { path: String },
}

/// Result type for seekspec operations.
pub type Result<T> = std::result::Result<T, SeekError>;

/// Failure while evaluating a specification against a source.
#[derive(Debug, Error)]
pub enum EvaluateError<E> {
    /// The request did not compile; the source was not queried.
    #[error(transparent)]
    Compile(#[from] SeekError),

    /// The source failed; its error is passed through unchanged.
    #[error("source error: {0}")]
    Source(#[source] E),
}

impl<E> EvaluateError<E> {
    /// The compile error, if this is one.
    pub fn as_compile(&self) -> Option<&SeekError> {
        match self {
            EvaluateError::Compile(e) => Some(e),
            EvaluateError::Source(_) => None,
        }
    }
}
