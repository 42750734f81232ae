//! Core abstractions for the rill dataflow runtime
//!
//! This crate provides the resolved-graph data model, the node behavior
//! trait, the error taxonomy and the debug event bus that the runtime and
//! the node library build on. It contains no execution logic.

mod behavior;
mod debug;
mod error;
mod graph;
mod state;
mod value;

pub use behavior::{
    require, AdvContext, CleanupFn, FnNode, InputValues, InstanceContext, NodeBehavior,
    OutputHandle, OutputHandles, OutputSink, RuntimeHooks, SubExecution, SubOutputs,
};
pub use debug::{preview, DebugBus, DebugEvent, PinDirection, PREVIEW_MAX_LEN};
pub use error::{GraphError, NodeError, RuntimeError};
pub use graph::{
    CodeNode, CompositeNode, Connection, ConnectionEnd, InstancePath, Node, NodeInstance,
    NodeTable, PinMode, PinSpec, BOUNDARY_INS_ID,
};
pub use state::StateStore;
pub use value::Value;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;
