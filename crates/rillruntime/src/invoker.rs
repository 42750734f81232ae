//! Node invocation: builds the `adv` context, points the output handles at
//! the session inbox and spawns the run future. Failures, whether returned
//! from the future or reported through `adv.on_error`, re-enter the loop
//! as [`LoopMsg::NodeFailed`] and carry the instance path with them.

use crate::record::InstanceRecord;
use crate::session::LoopMsg;
use rillcore::{
    AdvContext, CleanupFn, InputValues, InstanceContext, InstancePath, Node, NodeError, NodeTable,
    OutputHandles, OutputSink, RuntimeHooks, StateStore, SubExecution, SubOutputs, Value,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Runtime wiring handed to one instance's `adv`; every capability is a
/// message into the session event loop.
pub(crate) struct InstanceHooks {
    path: InstancePath,
    tx: UnboundedSender<LoopMsg>,
    defs: Arc<NodeTable>,
}

impl RuntimeHooks for InstanceHooks {
    fn on_cleanup(&self, f: CleanupFn) {
        let _ = self.tx.send(LoopMsg::RegisterCleanup {
            path: self.path.clone(),
            callback: f,
        });
    }

    fn on_error(&self, error: NodeError) {
        let _ = self.tx.send(LoopMsg::NodeFailed {
            path: self.path.clone(),
            error,
        });
    }

    fn execute(
        &self,
        node: Arc<Node>,
        inputs: HashMap<String, Value>,
        outputs: SubOutputs,
        id_suffix: &str,
    ) -> SubExecution {
        let root = self.path.spawned(node.id(), id_suffix);
        let _ = self.tx.send(LoopMsg::SpawnSub {
            node,
            root: root.clone(),
            inputs,
            outputs,
        });
        let push = {
            let tx = self.tx.clone();
            let root = root.clone();
            Arc::new(move |pin: &str, value: Value| {
                let _ = tx.send(LoopMsg::Deliver {
                    target: root.clone(),
                    pin: pin.to_string(),
                    value,
                });
            }) as Arc<dyn Fn(&str, Value) + Send + Sync>
        };
        let close = {
            let tx = self.tx.clone();
            Arc::new(move || {
                let _ = tx.send(LoopMsg::CloseSub { root: root.clone() });
            }) as Arc<dyn Fn() + Send + Sync>
        };
        SubExecution::new(push, close)
    }

    fn resolve(&self, node_id: &str) -> Option<Arc<Node>> {
        self.defs.get(node_id)
    }
}

/// Fire one code instance with the given input snapshot. The run future is
/// spawned; its eventual emissions and errors re-enter through the inbox.
pub(crate) fn fire(
    record: &InstanceRecord,
    snapshot: InputValues,
    tx: &UnboundedSender<LoopMsg>,
    global_state: &StateStore,
    defs: &Arc<NodeTable>,
) {
    let Node::Code(code) = record.node.as_ref() else {
        // composites forward values, they never fire
        return;
    };
    let sink: OutputSink = {
        let tx = tx.clone();
        let from = record.path.clone();
        Arc::new(move |pin: &str, value: Value| {
            let _ = tx.send(LoopMsg::Emission {
                from: from.clone(),
                pin: pin.to_string(),
                value,
            });
        })
    };
    let outputs = OutputHandles::new(record.node.outputs(), sink);
    let hooks = Arc::new(InstanceHooks {
        path: record.path.clone(),
        tx: tx.clone(),
        defs: defs.clone(),
    });
    let adv = AdvContext::new(
        record.state.clone(),
        global_state.clone(),
        InstanceContext {
            ancestors_ins_ids: record.path.ancestors_ins_ids(),
            config: record.config.clone(),
        },
        hooks,
    );
    let behavior = code.behavior.clone();
    let path = record.path.clone();
    let err_tx = tx.clone();
    tokio::spawn(async move {
        if let Err(error) = behavior.run(snapshot, outputs, adv).await {
            let _ = err_tx.send(LoopMsg::NodeFailed { path, error });
        }
    });
}
