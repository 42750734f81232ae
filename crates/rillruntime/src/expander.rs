//! Recursive composite expansion: allocates instance runtime records keyed
//! by ancestor path and wires each scope's connections into the router.
//! Static input bindings are not delivered inline; they are collected and
//! enqueued by the caller only after the whole scope is wired, so nothing
//! fires against a half-built graph.

use crate::record::InstanceRecord;
use crate::router::ConnectionRouter;
use rillcore::{
    CompositeNode, Connection, GraphError, InstancePath, Node, NodeTable, Value,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Static-config deliveries to enqueue once expansion finished
pub(crate) type PendingDeliveries = Vec<(InstancePath, String, Value)>;

pub(crate) fn expand(
    records: &mut HashMap<InstancePath, InstanceRecord>,
    router: &mut ConnectionRouter,
    defs: &NodeTable,
    node: Arc<Node>,
    path: InstancePath,
    config: HashMap<String, Value>,
    mut connected: HashSet<String>,
    root_like: bool,
    pending: &mut PendingDeliveries,
) -> Result<(), GraphError> {
    if records.contains_key(&path) {
        return Err(GraphError::DuplicatePath(path.to_string()));
    }
    for (pin, value) in &config {
        if node.input(pin).is_none() {
            return Err(GraphError::UnknownPin {
                node: node.id().to_string(),
                pin: pin.clone(),
            });
        }
        connected.insert(pin.clone());
        pending.push((path.clone(), pin.clone(), value.clone()));
    }

    if let Node::Composite(composite) = node.as_ref() {
        validate_scope(composite, defs)?;
        router.wire_scope(&path, composite);
        for instance in &composite.instances {
            let child_node = defs.resolve(&instance.node_id)?;
            let child_connected: HashSet<String> = composite
                .connections
                .iter()
                .filter(|c| c.to.ins_id == instance.id)
                .map(|c| c.to.pin_id.clone())
                .collect();
            expand(
                records,
                router,
                defs,
                child_node,
                path.child(&instance.id),
                instance.config.clone(),
                child_connected,
                false,
                pending,
            )?;
        }
    }

    records.insert(
        path.clone(),
        InstanceRecord::new(path, node, config, connected, root_like),
    );
    Ok(())
}

/// Structural checks against the resolved definitions: every connection
/// endpoint must name an existing instance (or the boundary) and a pin that
/// instance's node actually declares.
fn validate_scope(composite: &CompositeNode, defs: &NodeTable) -> Result<(), GraphError> {
    for conn in &composite.connections {
        validate_source(composite, defs, conn)?;
        validate_target(composite, defs, conn)?;
    }
    Ok(())
}

fn validate_source(
    composite: &CompositeNode,
    defs: &NodeTable,
    conn: &Connection,
) -> Result<(), GraphError> {
    if conn.from.is_boundary() {
        // boundary source: the value enters through one of our own inputs
        if composite.inputs.iter().all(|p| p.name != conn.from.pin_id) {
            return Err(GraphError::UnknownPin {
                node: composite.id.clone(),
                pin: conn.from.pin_id.clone(),
            });
        }
        return Ok(());
    }
    let instance = composite.instance(&conn.from.ins_id).ok_or_else(|| {
        GraphError::InstanceNotFound(format!("{}.{}", composite.id, conn.from.ins_id))
    })?;
    let node = defs.resolve(&instance.node_id)?;
    if !node.has_output(&conn.from.pin_id) {
        return Err(GraphError::UnknownPin {
            node: node.id().to_string(),
            pin: conn.from.pin_id.clone(),
        });
    }
    Ok(())
}

fn validate_target(
    composite: &CompositeNode,
    defs: &NodeTable,
    conn: &Connection,
) -> Result<(), GraphError> {
    if conn.to.is_boundary() {
        if composite.outputs.iter().all(|o| o != &conn.to.pin_id) {
            return Err(GraphError::UnknownPin {
                node: composite.id.clone(),
                pin: conn.to.pin_id.clone(),
            });
        }
        return Ok(());
    }
    let instance = composite.instance(&conn.to.ins_id).ok_or_else(|| {
        GraphError::InstanceNotFound(format!("{}.{}", composite.id, conn.to.ins_id))
    })?;
    let node = defs.resolve(&instance.node_id)?;
    if node.input(&conn.to.pin_id).is_none() {
        return Err(GraphError::UnknownPin {
            node: node.id().to_string(),
            pin: conn.to.pin_id.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rillcore::{
        AdvContext, CodeNode, FnNode, InputValues, NodeError, NodeInstance, OutputHandles,
        PinSpec, BOUNDARY_INS_ID,
    };

    fn leaf_node() -> Node {
        Node::Code(
            CodeNode::new(
                "leaf",
                Arc::new(FnNode(
                    |_: InputValues, _: OutputHandles, _: AdvContext| {
                        Box::pin(async { Ok::<(), NodeError>(()) })
                            as futures::future::BoxFuture<'static, Result<(), NodeError>>
                    },
                )),
            )
            .with_inputs(vec![PinSpec::required("in")])
            .with_outputs(["out"]),
        )
    }

    fn try_expand(comp: CompositeNode, defs: &NodeTable) -> Result<(), GraphError> {
        let mut records = HashMap::new();
        let mut router = ConnectionRouter::new();
        let mut pending = Vec::new();
        expand(
            &mut records,
            &mut router,
            defs,
            Arc::new(Node::Composite(comp)),
            InstancePath::root("main"),
            HashMap::new(),
            HashSet::new(),
            true,
            &mut pending,
        )
    }

    #[test]
    fn expansion_creates_nested_records() {
        let defs = NodeTable::new().with(leaf_node());
        let comp = CompositeNode::new("main")
            .with_inputs(vec![PinSpec::required("a")])
            .with_outputs(["r"])
            .add_instance(NodeInstance::new("x", "leaf"))
            .connect(BOUNDARY_INS_ID, "a", "x", "in")
            .connect("x", "out", BOUNDARY_INS_ID, "r");

        let mut records = HashMap::new();
        let mut router = ConnectionRouter::new();
        let mut pending = Vec::new();
        expand(
            &mut records,
            &mut router,
            &defs,
            Arc::new(Node::Composite(comp)),
            InstancePath::root("main"),
            HashMap::new(),
            HashSet::new(),
            true,
            &mut pending,
        )
        .expect("expands");
        assert!(records.contains_key(&InstancePath::root("main")));
        assert!(records.contains_key(&InstancePath::root("main").child("x")));
        // the connected set of the child reflects the boundary edge
        let child = &records[&InstancePath::root("main").child("x")];
        assert!(child.connected.contains("in"));
    }

    #[test]
    fn static_config_is_deferred_not_applied_inline() {
        let defs = NodeTable::new().with(leaf_node());
        let comp = CompositeNode::new("main")
            .with_outputs(["r"])
            .add_instance(NodeInstance::new("x", "leaf").with_config("in", 5i64))
            .connect("x", "out", BOUNDARY_INS_ID, "r");

        let mut records = HashMap::new();
        let mut router = ConnectionRouter::new();
        let mut pending = Vec::new();
        expand(
            &mut records,
            &mut router,
            &defs,
            Arc::new(Node::Composite(comp)),
            InstancePath::root("main"),
            HashMap::new(),
            HashSet::new(),
            true,
            &mut pending,
        )
        .expect("expands");
        assert_eq!(pending.len(), 1);
        let rec = &records[&InstancePath::root("main").child("x")];
        assert!(!rec.inputs["in"].has_value());
        assert!(rec.connected.contains("in"));
    }

    #[test]
    fn unknown_definition_is_rejected() {
        let defs = NodeTable::new();
        let comp = CompositeNode::new("main").add_instance(NodeInstance::new("x", "missing"));
        assert!(matches!(
            try_expand(comp, &defs),
            Err(GraphError::NodeNotFound(_))
        ));
    }

    #[test]
    fn connection_to_unknown_pin_is_rejected() {
        let defs = NodeTable::new().with(leaf_node());
        let comp = CompositeNode::new("main")
            .add_instance(NodeInstance::new("x", "leaf"))
            .add_instance(NodeInstance::new("y", "leaf"))
            .connect("x", "out", "y", "nope");
        assert!(matches!(
            try_expand(comp, &defs),
            Err(GraphError::UnknownPin { .. })
        ));
    }
}
