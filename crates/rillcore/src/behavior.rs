use crate::error::NodeError;
use crate::graph::Node;
use crate::state::StateStore;
use crate::value::Value;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;

/// Input snapshot a node fires with: latest value per pin that has one
pub type InputValues = HashMap<String, Value>;

/// Teardown callback registered through [`AdvContext::on_cleanup`];
/// the runtime invokes each at most once.
pub type CleanupFn = Box<dyn FnOnce() + Send>;

/// Sink behind a node's output handles; the runtime points it at the
/// session's connection router.
pub type OutputSink = Arc<dyn Fn(&str, Value) + Send + Sync>;

/// Per-pin output callbacks for a spawned sub-execution
pub type SubOutputs = HashMap<String, Arc<dyn Fn(Value) + Send + Sync>>;

/// Get a required input value or fail the node
pub fn require<'a>(inputs: &'a InputValues, pin: &str) -> Result<&'a Value, NodeError> {
    inputs
        .get(pin)
        .ok_or_else(|| NodeError::MissingInput(pin.to_string()))
}

/// Run behavior of a code node.
///
/// `inputs` is the fired snapshot, `outputs` emits onto the instance's
/// output pins, `adv` carries state, cleanup/error reporting and the
/// sub-execution spawner. Both `outputs` and `adv` are cheaply clonable and
/// may be moved into spawned tasks for deferred emission.
#[async_trait]
pub trait NodeBehavior: Send + Sync {
    async fn run(
        &self,
        inputs: InputValues,
        outputs: OutputHandles,
        adv: AdvContext,
    ) -> Result<(), NodeError>;
}

/// Closure-backed [`NodeBehavior`], mostly used by tests and ad-hoc graphs
pub struct FnNode<F>(pub F);

#[async_trait]
impl<F> NodeBehavior for FnNode<F>
where
    F: Fn(InputValues, OutputHandles, AdvContext) -> BoxFuture<'static, Result<(), NodeError>>
        + Send
        + Sync,
{
    async fn run(
        &self,
        inputs: InputValues,
        outputs: OutputHandles,
        adv: AdvContext,
    ) -> Result<(), NodeError> {
        (self.0)(inputs, outputs, adv).await
    }
}

/// Handle for one output pin
#[derive(Clone)]
pub struct OutputHandle {
    pin: String,
    sink: OutputSink,
}

impl OutputHandle {
    pub fn next(&self, value: Value) {
        (self.sink)(&self.pin, value);
    }

    pub fn pin(&self) -> &str {
        &self.pin
    }
}

/// Map of output pin name to handle, built by the invoker per firing
#[derive(Clone)]
pub struct OutputHandles {
    handles: HashMap<String, OutputHandle>,
}

impl OutputHandles {
    pub fn new(pins: &[String], sink: OutputSink) -> Self {
        let handles = pins
            .iter()
            .map(|pin| {
                (
                    pin.clone(),
                    OutputHandle {
                        pin: pin.clone(),
                        sink: sink.clone(),
                    },
                )
            })
            .collect();
        Self { handles }
    }

    pub fn get(&self, pin: &str) -> Option<&OutputHandle> {
        self.handles.get(pin)
    }

    /// Emit on a declared output pin; emissions on undeclared pins are
    /// dropped with a warning.
    pub fn next(&self, pin: &str, value: Value) {
        match self.handles.get(pin) {
            Some(handle) => handle.next(value),
            None => tracing::warn!(pin, "emission on undeclared output pin dropped"),
        }
    }
}

/// Identity and static configuration of the firing instance
#[derive(Clone, Debug, Default)]
pub struct InstanceContext {
    /// Instance ids from the root down to (excluding) this instance
    pub ancestors_ins_ids: Vec<String>,
    /// Resolved static configuration bound to this instance
    pub config: HashMap<String, Value>,
}

/// Runtime wiring behind [`AdvContext`]; implemented by the session
pub trait RuntimeHooks: Send + Sync {
    fn on_cleanup(&self, f: CleanupFn);
    fn on_error(&self, error: NodeError);
    fn execute(
        &self,
        node: Arc<Node>,
        inputs: HashMap<String, Value>,
        outputs: SubOutputs,
        id_suffix: &str,
    ) -> SubExecution;
    fn resolve(&self, node_id: &str) -> Option<Arc<Node>>;
}

/// Advanced context handed to every firing (`adv` in the node contract)
#[derive(Clone)]
pub struct AdvContext {
    /// Persistent instance-scoped key/value store
    pub state: StateStore,
    /// Session-wide shared store, last-writer-wins
    pub global_state: StateStore,
    pub context: InstanceContext,
    hooks: Arc<dyn RuntimeHooks>,
}

impl AdvContext {
    pub fn new(
        state: StateStore,
        global_state: StateStore,
        context: InstanceContext,
        hooks: Arc<dyn RuntimeHooks>,
    ) -> Self {
        Self {
            state,
            global_state,
            context,
            hooks,
        }
    }

    /// Register a teardown callback, run at most once when this instance's
    /// scope completes, fails or is stopped.
    pub fn on_cleanup(&self, f: impl FnOnce() + Send + 'static) {
        self.hooks.on_cleanup(Box::new(f));
    }

    /// Report a failure without returning from the run function, e.g. from
    /// async work started after the firing returned.
    pub fn on_error(&self, error: NodeError) {
        self.hooks.on_error(error);
    }

    /// Spawn an isolated sub-execution of `node` under a suffixed path.
    /// Sibling spawns with distinct suffixes never collide and tear down
    /// independently.
    pub fn execute(
        &self,
        node: Arc<Node>,
        inputs: HashMap<String, Value>,
        outputs: SubOutputs,
        id_suffix: &str,
    ) -> SubExecution {
        self.hooks.execute(node, inputs, outputs, id_suffix)
    }

    /// Look up a node definition from the session's table
    pub fn resolve(&self, node_id: &str) -> Option<Arc<Node>> {
        self.hooks.resolve(node_id)
    }
}

/// Owned handle to a spawned sub-execution
#[derive(Clone)]
pub struct SubExecution {
    push: Arc<dyn Fn(&str, Value) + Send + Sync>,
    close: Arc<dyn Fn() + Send + Sync>,
}

impl SubExecution {
    pub fn new(
        push: Arc<dyn Fn(&str, Value) + Send + Sync>,
        close: Arc<dyn Fn() + Send + Sync>,
    ) -> Self {
        Self { push, close }
    }

    /// Feed a value into the sub-execution's root input pin
    pub fn push(&self, pin: &str, value: Value) {
        (self.push)(pin, value);
    }

    /// Tear down exactly this sub-tree; safe to call after it already
    /// completed.
    pub fn close(&self) {
        (self.close)();
    }
}
