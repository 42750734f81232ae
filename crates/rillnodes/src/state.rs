use async_trait::async_trait;
use rillcore::{
    require, AdvContext, CodeNode, InputValues, Node, NodeBehavior, NodeError, OutputHandles,
    PinSpec, Value,
};
use std::sync::Arc;

/// Reads a key from the session-wide store, emitting Null when absent
pub struct GetGlobalNode;

#[async_trait]
impl NodeBehavior for GetGlobalNode {
    async fn run(
        &self,
        inputs: InputValues,
        outputs: OutputHandles,
        adv: AdvContext,
    ) -> Result<(), NodeError> {
        let key = require(&inputs, "key")?;
        let key = key.as_str().ok_or_else(|| NodeError::InvalidInputType {
            field: "key".to_string(),
            expected: "string".to_string(),
            actual: key.kind().to_string(),
        })?;
        let value = adv.global_state.get(key).unwrap_or(Value::Null);
        outputs.next("value", value);
        Ok(())
    }
}

pub fn get_global() -> Node {
    Node::Code(
        CodeNode::new("state.get-global", Arc::new(GetGlobalNode))
            .with_inputs(vec![PinSpec::required("key")])
            .with_outputs(["value"])
            .completes_on(["value"]),
    )
}

/// Writes a key into the session-wide store, last writer wins
pub struct SetGlobalNode;

#[async_trait]
impl NodeBehavior for SetGlobalNode {
    async fn run(
        &self,
        inputs: InputValues,
        outputs: OutputHandles,
        adv: AdvContext,
    ) -> Result<(), NodeError> {
        let key = require(&inputs, "key")?;
        let key = key.as_str().ok_or_else(|| NodeError::InvalidInputType {
            field: "key".to_string(),
            expected: "string".to_string(),
            actual: key.kind().to_string(),
        })?;
        let value = require(&inputs, "value")?.clone();
        adv.global_state.set(key, value.clone());
        outputs.next("saved", value);
        Ok(())
    }
}

pub fn set_global() -> Node {
    Node::Code(
        CodeNode::new("state.set-global", Arc::new(SetGlobalNode))
            .with_inputs(vec![PinSpec::required("key"), PinSpec::required("value")])
            .with_outputs(["saved"])
            .completes_on(["saved"]),
    )
}
