use crate::graph::InstancePath;
use thiserror::Error;

/// Failures raised by node run functions (or reported via `adv.on_error`)
#[derive(Error, Debug, Clone)]
pub enum NodeError {
    #[error("missing required input: {0}")]
    MissingInput(String),

    #[error("invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("cancelled")]
    Cancelled,
}

/// Structural problems detected while expanding a resolved graph
#[derive(Error, Debug, Clone)]
pub enum GraphError {
    #[error("node definition not found: {0}")]
    NodeNotFound(String),

    #[error("instance not found in scope: {0}")]
    InstanceNotFound(String),

    #[error("unknown pin '{pin}' on node {node}")]
    UnknownPin { node: String, pin: String },

    #[error("duplicate instance path: {0}")]
    DuplicatePath(String),

    #[error("invalid connection: {0}")]
    InvalidConnection(String),
}

/// Top-level failure of an execution session
#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
    /// A node failed; carries the fully-qualified instance path and the
    /// originating cause.
    #[error("node '{node_id}' at {path} failed: {source}")]
    NodeFailed {
        path: InstancePath,
        node_id: String,
        #[source]
        source: NodeError,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("execution stopped before completion")]
    Stopped,
}

impl RuntimeError {
    pub fn node_failed(path: InstancePath, node_id: impl Into<String>, source: NodeError) -> Self {
        Self::NodeFailed {
            path,
            node_id: node_id.into(),
            source,
        }
    }
}
