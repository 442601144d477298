//! Error types for Quarry.

use crate::types::ColumnKind;
use crate::value::Value;
use thiserror::Error;

/// Result type alias for Quarry operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Fatal errors raised by the data source, the node graph and the query pipeline.
///
/// Recoverable outcomes such as a validator rejecting a row are not errors;
/// they travel as ordinary return values.
#[derive(Debug, Error)]
pub enum Error {
    /// A value does not fit the kind of the column it is written to.
    #[error("type mismatch on column {column}: expected {expected}, got {value:?}")]
    TypeMismatch {
        column: String,
        expected: ColumnKind,
        value: Value,
    },
    /// Null written to a column that does not accept it.
    #[error("null constraint violation on column: {column}")]
    NullConstraint { column: String },
    /// Duplicate primary key.
    #[error("unique constraint violation on {table}: {key:?}")]
    UniqueConstraint { table: String, key: Vec<Value> },
    /// Invalid schema definition.
    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },
    /// Column not found.
    #[error("column {column} not found in table {table}")]
    ColumnNotFound { table: String, column: String },
    /// Column index outside the current metadata.
    #[error("column index {index} out of range (1..={count})")]
    ColumnIndex { index: usize, count: usize },
    /// Table not found.
    #[error("table not found: {name}")]
    TableNotFound { name: String },
    /// The data source could not be reached or dropped the connection.
    #[error("connection failure: {message}")]
    Connection { message: String },
    /// A connection, statement or cursor was used after it was closed.
    #[error("{resource} is closed")]
    Closed { resource: &'static str },
    /// Query text the data source could not understand.
    #[error("malformed query `{query}`: {message}")]
    Syntax { query: String, message: String },
    /// The cursor is not positioned on a row.
    #[error("cursor is not positioned on a row (position {position})")]
    CursorPosition { position: usize },
    /// Connection configuration could not be loaded.
    #[error("configuration error: {message}")]
    Config { message: String },
    /// Login rejected.
    #[error("authentication failed: {message}")]
    Authentication { message: String },
    /// A node was asked to rebuild while it was already rebuilding.
    #[error("node {node} rebuilt reentrantly")]
    Reentrant { node: usize },
    /// A node handle does not refer to a live node of the expected type.
    #[error("node {node} is released or holds a different value type")]
    StaleNode { node: usize },
    /// A failure raised while validating or rebuilding a node.
    #[error("node {node} ({label}) failed to rebuild: {source}")]
    Node {
        node: usize,
        label: String,
        #[source]
        source: Box<Error>,
    },
    /// Invalid operation.
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },
}

impl Error {
    /// Creates a type mismatch error.
    pub fn type_mismatch(column: impl Into<String>, expected: ColumnKind, value: Value) -> Self {
        Error::TypeMismatch {
            column: column.into(),
            expected,
            value,
        }
    }

    /// Creates a null constraint error.
    pub fn null_constraint(column: impl Into<String>) -> Self {
        Error::NullConstraint {
            column: column.into(),
        }
    }

    /// Creates a unique constraint error.
    pub fn unique_constraint(table: impl Into<String>, key: Vec<Value>) -> Self {
        Error::UniqueConstraint {
            table: table.into(),
            key,
        }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Error::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates a column not found error.
    pub fn column_not_found(table: impl Into<String>, column: impl Into<String>) -> Self {
        Error::ColumnNotFound {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Creates a column index error.
    pub fn column_index(index: usize, count: usize) -> Self {
        Error::ColumnIndex { index, count }
    }

    /// Creates a table not found error.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Error::TableNotFound { name: name.into() }
    }

    /// Creates a connection failure.
    pub fn connection(message: impl Into<String>) -> Self {
        Error::Connection {
            message: message.into(),
        }
    }

    /// Creates an error for use of a closed resource.
    pub fn closed(resource: &'static str) -> Self {
        Error::Closed { resource }
    }

    /// Creates a syntax error for the given query text.
    pub fn syntax(query: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Syntax {
            query: query.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Authentication {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }

    /// Wraps a rebuild failure with the node it came from.
    ///
    /// Failures that already carry a node are passed through, so a chain of
    /// rebuilds surfaces as a single wrapped error naming the innermost node.
    pub fn in_node(self, node: usize, label: &str) -> Self {
        match self {
            Error::Node { .. } | Error::Reentrant { .. } | Error::StaleNode { .. } => self,
            other => Error::Node {
                node,
                label: label.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, looking through node wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Node { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
