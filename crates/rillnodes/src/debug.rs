use async_trait::async_trait;
use rillcore::{
    require, AdvContext, CodeNode, InputValues, Node, NodeBehavior, NodeError, OutputHandles,
    PinSpec,
};
use std::sync::Arc;

/// Streaming pass-through that logs every value it sees
pub struct LogNode;

#[async_trait]
impl NodeBehavior for LogNode {
    async fn run(
        &self,
        inputs: InputValues,
        outputs: OutputHandles,
        adv: AdvContext,
    ) -> Result<(), NodeError> {
        let value = require(&inputs, "value")?.clone();
        tracing::info!(
            instance = %adv.context.ancestors_ins_ids.join("."),
            value = ?value,
            "log"
        );
        outputs.next("out", value);
        Ok(())
    }
}

pub fn log() -> Node {
    Node::Code(
        CodeNode::new("debug.log", Arc::new(LogNode))
            .with_inputs(vec![PinSpec::required("value")])
            .with_outputs(["out"])
            .reactive(["value"]),
    )
}
