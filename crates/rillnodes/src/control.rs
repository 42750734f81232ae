use async_trait::async_trait;
use rillcore::{
    require, AdvContext, CodeNode, InputValues, Node, NodeBehavior, NodeError, OutputHandles,
    PinSpec, Value,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Maps each element of a list through an isolated sub-execution of the
/// node named by the `item_node` config entry, preserving element order.
/// Items are fed to the item node's first input pin and collected from its
/// first output pin.
pub struct ListMapNode;

#[async_trait]
impl NodeBehavior for ListMapNode {
    async fn run(
        &self,
        inputs: InputValues,
        outputs: OutputHandles,
        adv: AdvContext,
    ) -> Result<(), NodeError> {
        let list = require(&inputs, "list")?;
        let items = list
            .as_array()
            .ok_or_else(|| NodeError::InvalidInputType {
                field: "list".to_string(),
                expected: "array".to_string(),
                actual: list.kind().to_string(),
            })?
            .to_vec();

        let item_node_id = adv
            .context
            .config
            .get("item_node")
            .or_else(|| inputs.get("item_node"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                NodeError::Configuration("list-map needs an item_node config entry".to_string())
            })?
            .to_string();
        let item_node = adv.resolve(&item_node_id).ok_or_else(|| {
            NodeError::Configuration(format!("unknown item node '{}'", item_node_id))
        })?;

        if items.is_empty() {
            outputs.next("list", Value::Array(Vec::new()));
            return Ok(());
        }

        let in_pin = item_node
            .inputs()
            .first()
            .map(|p| p.name.clone())
            .ok_or_else(|| {
                NodeError::Configuration(format!("item node '{}' has no inputs", item_node_id))
            })?;
        let out_pin = item_node
            .outputs()
            .first()
            .cloned()
            .ok_or_else(|| {
                NodeError::Configuration(format!("item node '{}' has no outputs", item_node_id))
            })?;

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<(usize, Value)>();
        let mut subs = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            let tx = tx.clone();
            let mut sub_outputs: rillcore::SubOutputs = HashMap::new();
            sub_outputs.insert(
                out_pin.clone(),
                Arc::new(move |value: Value| {
                    let _ = tx.send((idx, value));
                }),
            );
            let mut item_inputs = HashMap::new();
            item_inputs.insert(in_pin.clone(), item.clone());
            subs.push(adv.execute(
                item_node.clone(),
                item_inputs,
                sub_outputs,
                &idx.to_string(),
            ));
        }
        drop(tx);

        let mut results = vec![Value::Null; items.len()];
        let mut received = 0usize;
        while received < items.len() {
            match rx.recv().await {
                Some((idx, value)) => {
                    results[idx] = value;
                    received += 1;
                }
                None => {
                    return Err(NodeError::ExecutionFailed(
                        "list-map sub-executions ended before producing all items".to_string(),
                    ))
                }
            }
        }
        for sub in &subs {
            sub.close();
        }

        outputs.next("list", Value::Array(results));
        Ok(())
    }
}

pub fn list_map() -> Node {
    Node::Code(
        CodeNode::new("control.list-map", Arc::new(ListMapNode))
            .with_inputs(vec![
                PinSpec::required("list"),
                PinSpec::optional("item_node"),
            ])
            .with_outputs(["list"])
            .completes_on(["list"]),
    )
}
