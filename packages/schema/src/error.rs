use crate::node::NodeId;
use thiserror::Error;

pub type SchemaResult<T> = Result<T, SchemaError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("No prop at path '{path}' on node {node}")]
    PropNotFound { node: NodeId, path: String },

    #[error("Path '{path}' does not traverse a mapping")]
    NotAMapping { path: String },

    #[error("Duplicate node id: {0}")]
    DuplicateNode(NodeId),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
}
