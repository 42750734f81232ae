//! Execution session: owns one run of a resolved root graph.
//!
//! A session spawns a single event-loop task holding all records, routes
//! and completion state. Node firings are spawned tasks whose emissions,
//! errors, cleanup registrations and sub-execution spawns come back in as
//! [`LoopMsg`]s, so the activation check for one arrival is always a
//! synchronous step inside the loop.

use crate::record::InstanceRecord;
use crate::router::{ConnectionRouter, RouteTarget};
use crate::{expander, invoker, scheduler, tracker};
use rillcore::{
    CleanupFn, DebugBus, DebugEvent, GraphError, InstancePath, Node, NodeError, NodeTable,
    PinDirection, RuntimeError, StateStore, SubOutputs, Value, BOUNDARY_INS_ID,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

type SessionResult = Result<HashMap<String, Value>, RuntimeError>;
type BubbleErrorFn = Arc<dyn Fn(&RuntimeError) + Send + Sync>;

/// Messages driving a session's event loop
pub(crate) enum LoopMsg {
    /// Value arriving at an instance input pin
    Deliver {
        target: InstancePath,
        pin: String,
        value: Value,
    },
    /// Value emitted on an instance output pin
    Emission {
        from: InstancePath,
        pin: String,
        value: Value,
    },
    NodeFailed {
        path: InstancePath,
        error: NodeError,
    },
    RegisterCleanup {
        path: InstancePath,
        callback: CleanupFn,
    },
    SpawnSub {
        node: Arc<Node>,
        root: InstancePath,
        inputs: HashMap<String, Value>,
        outputs: SubOutputs,
    },
    CloseSub {
        root: InstancePath,
    },
    PushInput {
        pin: String,
        value: Value,
    },
    Stop,
}

/// One live emission on a root output pin
#[derive(Debug, Clone)]
pub struct PinEmission {
    pub pin: String,
    pub value: Value,
}

/// Session tuning knobs
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Capacity of the debug event broadcast
    pub debug_capacity: usize,
    /// Capacity of the live-output broadcast
    pub output_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debug_capacity: 1024,
            output_capacity: 256,
        }
    }
}

/// Top-level runtime object: owns global state, the debugger hook and the
/// teardown sweep for every run it starts.
pub struct ExecutionSession {
    config: SessionConfig,
    debug: DebugBus,
    global_state: StateStore,
    on_bubble_error: Option<BubbleErrorFn>,
}

impl ExecutionSession {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        let debug = DebugBus::new(config.debug_capacity);
        Self {
            config,
            debug,
            global_state: StateStore::new(),
            on_bubble_error: None,
        }
    }

    /// Register a callback invoked for every error that bubbles to the
    /// session boundary, including ones already reflected in the result.
    pub fn on_bubble_error(mut self, f: impl Fn(&RuntimeError) + Send + Sync + 'static) -> Self {
        self.on_bubble_error = Some(Arc::new(f));
        self
    }

    /// Debugger hook: observability only, never affects the outcome
    pub fn debug_bus(&self) -> &DebugBus {
        &self.debug
    }

    /// Session-wide shared store, lives as long as the session
    pub fn global_state(&self) -> &StateStore {
        &self.global_state
    }

    /// Expand `root` against `defs` and start running it, feeding `inputs`
    /// into the root's input pins. Structural problems surface here;
    /// everything later arrives through the returned handle.
    pub fn execute(
        &self,
        root: Arc<Node>,
        defs: NodeTable,
        inputs: HashMap<String, Value>,
    ) -> Result<ExecutionHandle, GraphError> {
        let session_id = Uuid::new_v4();
        let defs = Arc::new(defs);
        let root_path = InstancePath::root(root.id());
        let (tx, rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = oneshot::channel();
        let (outputs_tx, _) = broadcast::channel(self.config.output_capacity);
        let cancel = CancellationToken::new();

        let mut records = HashMap::new();
        let mut router = ConnectionRouter::new();
        let mut pending = Vec::new();
        expander::expand(
            &mut records,
            &mut router,
            &defs,
            root.clone(),
            root_path.clone(),
            HashMap::new(),
            inputs.keys().cloned().collect(),
            true,
            &mut pending,
        )?;

        // live-output subscription piggybacks on the root output channels
        if let Some(record) = records.get_mut(&root_path) {
            for pin in root.outputs() {
                if let Some(channel) = record.outputs.get_mut(pin) {
                    let outputs_tx = outputs_tx.clone();
                    let pin = pin.clone();
                    channel.subscribe(Box::new(move |value| {
                        let _ = outputs_tx.send(PinEmission {
                            pin: pin.clone(),
                            value: value.clone(),
                        });
                    }));
                }
            }
        }

        tracing::info!(session = %session_id, root = root.id(), "starting execution session");
        self.debug
            .emit(DebugEvent::session_started(session_id, root.id()));

        for (target, pin, value) in pending {
            let _ = tx.send(LoopMsg::Deliver { target, pin, value });
        }
        for (pin, value) in inputs {
            let _ = tx.send(LoopMsg::Deliver {
                target: root_path.clone(),
                pin,
                value,
            });
        }

        let event_loop = EventLoop {
            session_id,
            rx,
            tx: tx.clone(),
            records,
            router,
            defs,
            root_path,
            sub_roots: HashSet::new(),
            global_state: self.global_state.clone(),
            debug: self.debug.clone(),
            result_tx: Some(result_tx),
            on_bubble_error: self.on_bubble_error.clone(),
            cancel: cancel.clone(),
            done: false,
        };
        tokio::spawn(event_loop.run());

        Ok(ExecutionHandle {
            session_id,
            tx,
            result_rx: Some(result_rx),
            outputs_tx,
            cancel,
        })
    }
}

impl Default for ExecutionSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to one running graph. The handle owns the run: dropping it
/// cancels the session and sweeps every registered cleanup, same as
/// [`stop`](Self::stop).
pub struct ExecutionHandle {
    session_id: Uuid,
    tx: UnboundedSender<LoopMsg>,
    result_rx: Option<oneshot::Receiver<SessionResult>>,
    outputs_tx: broadcast::Sender<PinEmission>,
    cancel: CancellationToken,
}

impl ExecutionHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Feed a late value into a root input pin (streaming inputs)
    pub fn push_input(&self, pin: &str, value: Value) {
        let _ = self.tx.send(LoopMsg::PushInput {
            pin: pin.to_string(),
            value,
        });
    }

    /// Subscribe to every root output emission, independent of completion
    pub fn watch_outputs(&self) -> broadcast::Receiver<PinEmission> {
        self.outputs_tx.subscribe()
    }

    /// Immediate teardown: runs every registered cleanup in the tree.
    /// Safe to call repeatedly or after natural completion.
    pub fn stop(&self) {
        let _ = self.tx.send(LoopMsg::Stop);
        self.cancel.cancel();
    }

    /// Latest value per root output pin once the root completes, or the
    /// first error that bubbled to the session boundary.
    pub async fn result(mut self) -> SessionResult {
        match self.result_rx.take() {
            Some(rx) => rx.await.unwrap_or(Err(RuntimeError::Stopped)),
            None => Err(RuntimeError::Stopped),
        }
    }
}

impl Drop for ExecutionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct EventLoop {
    session_id: Uuid,
    rx: UnboundedReceiver<LoopMsg>,
    tx: UnboundedSender<LoopMsg>,
    records: HashMap<InstancePath, InstanceRecord>,
    router: ConnectionRouter,
    defs: Arc<NodeTable>,
    root_path: InstancePath,
    /// Roots of dynamically spawned sub-executions; their outputs stop at
    /// their callbacks instead of routing into the parent scope.
    sub_roots: HashSet<InstancePath>,
    global_state: StateStore,
    debug: DebugBus,
    result_tx: Option<oneshot::Sender<SessionResult>>,
    on_bubble_error: Option<BubbleErrorFn>,
    cancel: CancellationToken,
    done: bool,
}

impl EventLoop {
    async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.finish(Err(RuntimeError::Stopped));
                    break;
                }
                msg = self.rx.recv() => match msg {
                    Some(msg) => {
                        self.handle(msg);
                        if self.done {
                            break;
                        }
                    }
                    // the loop keeps its own sender, so this arm cannot
                    // trip today; handle drop lands on the cancel branch
                    None => {
                        self.finish(Err(RuntimeError::Stopped));
                        break;
                    }
                }
            }
        }
    }

    fn handle(&mut self, msg: LoopMsg) {
        match msg {
            LoopMsg::Deliver { target, pin, value } => self.deliver(&target, &pin, value),
            LoopMsg::Emission { from, pin, value } => self.emission(&from, &pin, value),
            LoopMsg::PushInput { pin, value } => {
                let root = self.root_path.clone();
                self.deliver(&root, &pin, value);
            }
            LoopMsg::RegisterCleanup { path, callback } => {
                match self.records.get_mut(&path) {
                    Some(record) => record.cleanups.push(callback),
                    // scope already torn down: release immediately
                    None => callback(),
                }
            }
            LoopMsg::NodeFailed { path, error } => self.fail(path, error),
            LoopMsg::SpawnSub {
                node,
                root,
                inputs,
                outputs,
            } => self.spawn_sub(node, root, inputs, outputs),
            LoopMsg::CloseSub { root } => self.teardown_scope(&root),
            LoopMsg::Stop => self.finish(Err(RuntimeError::Stopped)),
        }
    }

    /// Route a value into an instance input pin: forward through the
    /// boundary for composites, run the activation check for code nodes.
    fn deliver(&mut self, target: &InstancePath, pin: &str, value: Value) {
        let Some(record) = self.records.get_mut(target) else {
            tracing::debug!(target = %target, pin, "delivery to torn-down instance dropped");
            return;
        };
        let Some(channel) = record.inputs.get_mut(pin) else {
            tracing::warn!(target = %target, pin, "delivery to unknown input pin dropped");
            return;
        };
        channel.emit(value.clone());
        let is_composite = record.node.is_composite();
        self.debug.emit(DebugEvent::pin_value(
            target.as_str(),
            pin,
            PinDirection::Input,
            &value,
        ));

        if is_composite {
            for route in self.router.targets(target, BOUNDARY_INS_ID, pin) {
                self.apply_target(route, &value);
            }
        } else if let Some(record) = self.records.get_mut(target) {
            if let Some(snapshot) = scheduler::on_arrival(record, pin) {
                tracing::debug!(instance = %target, node = record.node.id(), "firing");
                self.debug
                    .emit(DebugEvent::instance_fired(target.as_str(), record.node.id()));
                invoker::fire(record, snapshot, &self.tx, &self.global_state, &self.defs);
            }
        }
    }

    /// Handle a value emitted on an instance output pin: notify channel
    /// subscribers, track completion, then fan out along the scope's
    /// connections in declaration order.
    fn emission(&mut self, from: &InstancePath, pin: &str, value: Value) {
        let completed_now;
        {
            let Some(record) = self.records.get_mut(from) else {
                tracing::debug!(from = %from, pin, "emission from torn-down instance dropped");
                return;
            };
            let Some(channel) = record.outputs.get_mut(pin) else {
                tracing::warn!(from = %from, pin, "emission on unknown output pin dropped");
                return;
            };
            channel.emit(value.clone());
            completed_now = tracker::note_emission(record, pin);
            if completed_now {
                record.run_cleanups();
                record.reset_present();
            }
        }
        self.debug.emit(DebugEvent::pin_value(
            from.as_str(),
            pin,
            PinDirection::Output,
            &value,
        ));
        if completed_now {
            tracing::debug!(instance = %from, "instance completed");
            self.debug.emit(DebugEvent::instance_completed(from.as_str()));
        }

        if *from == self.root_path {
            // root outputs surface through the live broadcast and, on
            // completion, the session result
            if completed_now {
                let outputs = self
                    .records
                    .get(&self.root_path)
                    .map(InstanceRecord::output_latest)
                    .unwrap_or_default();
                self.finish(Ok(outputs));
            }
            return;
        }
        if self.sub_roots.contains(from) {
            if completed_now {
                let scope = from.clone();
                self.teardown_scope(&scope);
            }
            return;
        }

        let Some(scope) = from.parent() else {
            return;
        };
        let from_ins = from.leaf().to_string();
        for route in self.router.targets(&scope, &from_ins, pin) {
            self.apply_target(route, &value);
        }
    }

    fn apply_target(&mut self, route: RouteTarget, value: &Value) {
        match route {
            RouteTarget::Input { path, pin } => self.deliver(&path, &pin, value.clone()),
            RouteTarget::ScopeOutput { path, pin } => self.emission(&path, &pin, value.clone()),
        }
    }

    /// A node failed: wrap the error with its path, abort the nearest
    /// enclosing boundary's subtree and surface the error at the session.
    /// Subtrees outside the boundary keep running.
    fn fail(&mut self, path: InstancePath, error: NodeError) {
        let node_id = self
            .records
            .get(&path)
            .map(|r| r.node.id().to_string())
            .unwrap_or_else(|| path.leaf().to_string());
        let wrapped = RuntimeError::node_failed(path.clone(), node_id, error);
        tracing::error!(instance = %path, error = %wrapped, "node failed");
        self.debug
            .emit(DebugEvent::error_raised(path.as_str(), &wrapped.to_string()));
        if let Some(callback) = &self.on_bubble_error {
            callback(&wrapped);
        }

        let boundary = if path == self.root_path || self.sub_roots.contains(&path) {
            path.clone()
        } else {
            path.parent().unwrap_or(path)
        };
        if boundary == self.root_path {
            self.finish(Err(wrapped));
        } else {
            self.teardown_scope(&boundary);
            if let Some(result_tx) = self.result_tx.take() {
                let _ = result_tx.send(Err(wrapped));
            }
        }
    }

    /// Expand a dynamically spawned sub-execution under its own disjoint
    /// path and bridge its root outputs to the caller's callbacks.
    fn spawn_sub(
        &mut self,
        node: Arc<Node>,
        root: InstancePath,
        inputs: HashMap<String, Value>,
        outputs: SubOutputs,
    ) {
        let mut pending = Vec::new();
        if let Err(error) = expander::expand(
            &mut self.records,
            &mut self.router,
            &self.defs,
            node,
            root.clone(),
            HashMap::new(),
            inputs.keys().cloned().collect(),
            true,
            &mut pending,
        ) {
            tracing::error!(root = %root, error = %error, "sub-execution spawn failed");
            return;
        }
        if let Some(record) = self.records.get_mut(&root) {
            for (pin, callback) in outputs {
                match record.outputs.get_mut(&pin) {
                    Some(channel) => {
                        channel.subscribe(Box::new(move |value| callback(value.clone())))
                    }
                    None => {
                        tracing::warn!(root = %root, pin, "sub-execution callback on unknown pin")
                    }
                }
            }
        }
        self.sub_roots.insert(root.clone());
        tracing::debug!(root = %root, "sub-execution spawned");
        for (target, pin, value) in pending {
            let _ = self.tx.send(LoopMsg::Deliver { target, pin, value });
        }
        for (pin, value) in inputs {
            let _ = self.tx.send(LoopMsg::Deliver {
                target: root.clone(),
                pin,
                value,
            });
        }
    }

    /// Tear down `scope` and everything under it: run each record's
    /// cleanups (at most once), drop the records and their routes.
    fn teardown_scope(&mut self, scope: &InstancePath) {
        let paths: Vec<InstancePath> = self
            .records
            .keys()
            .filter(|p| p.is_within(scope))
            .cloned()
            .collect();
        if paths.is_empty() {
            return;
        }
        tracing::debug!(scope = %scope, instances = paths.len(), "tearing down scope");
        for path in &paths {
            if let Some(mut record) = self.records.remove(path) {
                record.run_cleanups();
            }
        }
        self.router.remove_scope(scope);
        self.sub_roots.retain(|p| !p.is_within(scope));
    }

    /// Resolve or reject the session exactly once and sweep the whole tree
    fn finish(&mut self, result: SessionResult) {
        if self.done {
            return;
        }
        self.done = true;
        let success = result.is_ok();
        let root = self.root_path.clone();
        self.teardown_scope(&root);
        if let Some(result_tx) = self.result_tx.take() {
            let _ = result_tx.send(result);
        }
        self.debug
            .emit(DebugEvent::session_ended(self.session_id, success));
        tracing::info!(session = %self.session_id, success, "execution session ended");
    }
}
