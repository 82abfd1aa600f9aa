use std::path::PathBuf;

use thiserror::Error;

use crate::node::NodeId;
use crate::variant::DataType;

/// Errors raised by the address space when a node operation is rejected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AddressSpaceError {
    #[error("node {0} already exists")]
    DuplicateNode(NodeId),

    #[error("node {0} does not exist")]
    UnknownNode(NodeId),

    #[error("node {0} is not a variable")]
    NotAVariable(NodeId),

    #[error("type mismatch on {node}: expected {expected}, got {actual}")]
    TypeMismatch {
        node: NodeId,
        expected: DataType,
        actual: DataType,
    },

    #[error("node {0} is not writable")]
    NotWritable(NodeId),

    #[error("access level of {0} cannot drop write access")]
    AccessDowngrade(NodeId),

    #[error("no node at browse path {0:?}")]
    UnknownPath(String),
}

/// Failures that end a server run.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("address space construction failed")]
    Startup(#[source] AddressSpaceError),

    /// Bulk creation stopped partway; `created` nodes remain in the address space.
    #[error("bulk variable creation failed after {created} of {requested} nodes")]
    PartialBulkCreation {
        created: usize,
        requested: usize,
        #[source]
        source: AddressSpaceError,
    },

    #[error("{requested} bulk variables requested, at most {} fit Int32 initial values", i32::MAX)]
    BulkCountTooLarge { requested: usize },

    #[error("write to {node} failed")]
    Write {
        node: NodeId,
        #[source]
        source: AddressSpaceError,
    },

    #[error("export to {} failed", path.display())]
    ExportIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type ServerResult<T> = Result<T, ServerError>;
