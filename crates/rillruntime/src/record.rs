use crate::channel::PinChannel;
use rillcore::{CleanupFn, InstancePath, Node, StateStore, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Per-live-instance bookkeeping: one pin channel per declared pin, the
/// persistent instance state store, the cleanup registry and completion
/// tracking. Created at expansion, destroyed when the owning scope is
/// torn down.
pub(crate) struct InstanceRecord {
    pub path: InstancePath,
    pub node: Arc<Node>,
    pub inputs: HashMap<String, PinChannel>,
    pub outputs: HashMap<String, PinChannel>,
    pub state: StateStore,
    /// Static input configuration bound at placement time
    pub config: HashMap<String, Value>,
    /// Input pins fed by at least one connection or static binding
    pub connected: HashSet<String>,
    pub cleanups: Vec<CleanupFn>,
    /// Output pins that count toward completion; `None` means the instance
    /// never self-completes and only goes away with its scope.
    pub completion_set: Option<HashSet<String>>,
    pub satisfied: HashSet<String>,
    pub completed: bool,
}

impl InstanceRecord {
    /// `root_like` marks session roots and sub-execution roots, whose empty
    /// `completion_outputs` falls back to "all declared outputs".
    pub fn new(
        path: InstancePath,
        node: Arc<Node>,
        config: HashMap<String, Value>,
        connected: HashSet<String>,
        root_like: bool,
    ) -> Self {
        let inputs = node
            .inputs()
            .iter()
            .map(|p| (p.name.clone(), PinChannel::new()))
            .collect();
        let outputs = node
            .outputs()
            .iter()
            .map(|o| (o.clone(), PinChannel::new()))
            .collect();
        let declared = node.completion_outputs();
        let completion_set = if !declared.is_empty() {
            Some(declared.iter().cloned().collect())
        } else if root_like {
            Some(node.outputs().iter().cloned().collect())
        } else {
            None
        };
        Self {
            path,
            node,
            inputs,
            outputs,
            state: StateStore::new(),
            config,
            connected,
            cleanups: Vec::new(),
            completion_set,
            satisfied: HashSet::new(),
            completed: false,
        }
    }

    /// Run and drop every registered cleanup; at most once each
    pub fn run_cleanups(&mut self) {
        for cleanup in self.cleanups.drain(..) {
            cleanup();
        }
    }

    /// Forget pending input values so the next firing needs fresh arrivals
    pub fn reset_present(&mut self) {
        for channel in self.inputs.values_mut() {
            channel.clear();
        }
    }

    /// Latest value observed on each output pin that has emitted
    pub fn output_latest(&self) -> HashMap<String, Value> {
        self.outputs
            .iter()
            .filter_map(|(pin, ch)| ch.latest().map(|v| (pin.clone(), v.clone())))
            .collect()
    }
}
